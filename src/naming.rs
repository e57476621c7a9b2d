//! DNSEntry 名称派生
//!
//! 名称由 `已解析 FQDN + 挑战密钥` 的 CRC-32 校验和决定，Present 与 CleanUp
//! 必须得到完全相同的结果才能定位到同一个对象。
//!
//! 校验和使用固定的非标准多项式 `0xD5828281`（按反射形式建表，初始值全 1，
//! 结果取反），以十进制而不是十六进制渲染。任何改动都会让已发布的记录无法清理。

/// DNSEntry 名称前缀
pub const DNS_ENTRY_NAME_PREFIX: &str = "acme-challenge-";

/// 反射形式的生成多项式
pub const NAME_POLYNOMIAL: u32 = 0xD582_8281;

/// 预计算的查找表
static CRC_TABLE: [u32; 256] = make_table(NAME_POLYNOMIAL);

const fn make_table(poly: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ poly;
            } else {
                crc >>= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// 增量式校验和计算器
///
/// 分段写入与一次性写入拼接后的字节得到相同结果。
#[derive(Debug, Clone, Copy)]
pub struct NameHasher {
    crc: u32,
}

impl Default for NameHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl NameHasher {
    /// 创建新的计算器
    pub fn new() -> Self {
        Self { crc: !0 }
    }

    /// 写入字节
    pub fn update(&mut self, bytes: &[u8]) {
        let mut crc = self.crc;
        for &byte in bytes {
            crc = CRC_TABLE[((crc ^ u32::from(byte)) & 0xff) as usize] ^ (crc >> 8);
        }
        self.crc = crc;
    }

    /// 输出 32 位校验和
    pub fn finalize(&self) -> u32 {
        !self.crc
    }
}

/// 计算字节序列的校验和
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = NameHasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// 根据挑战的 FQDN 和密钥派生 DNSEntry 名称
///
/// 两者直接拼接，中间没有分隔符。
pub fn derive_name(fqdn: &str, key: &str) -> String {
    let mut hasher = NameHasher::new();
    hasher.update(fqdn.as_bytes());
    hasher.update(key.as_bytes());
    format!("{}{}", DNS_ENTRY_NAME_PREFIX, hasher.finalize())
}

/// 对象名称与命名空间的最大长度
pub const MAX_LABEL_LEN: usize = 63;

/// 是否为 RFC 1123 label
///
/// 只允许小写字母、数字和 `-`，首尾必须是字母或数字。
/// DNSEntry 的名称与命名空间都会成为 REST 路径中的一段，必须满足该规则。
pub fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= MAX_LABEL_LEN
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        }
        _ => false,
    }
}
