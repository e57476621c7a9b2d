//! DNSEntry 记录模型与存储接口
//! 求解器只操作声明式存储中的 DNSEntry 对象，由存储自身负责把它收敛为真实的 DNS 记录

use crate::error::{StoreError, StoreResult};
use crate::naming::is_dns_label;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

pub mod kubernetes;
pub mod memory;

pub use kubernetes::KubernetesDnsEntryStore;
pub use memory::{MemoryDnsEntryStore, StoreOperation};

/// DNSEntry 所属的 API 组
pub const DNS_ENTRY_GROUP: &str = "dns.gardener.cloud";

/// DNSEntry 的 API 版本号
pub const DNS_ENTRY_VERSION: &str = "v1alpha1";

/// DNSEntry 的 API 版本
pub const DNS_ENTRY_API_VERSION: &str = "dns.gardener.cloud/v1alpha1";

/// DNSEntry 资源类型
pub const DNS_ENTRY_KIND: &str = "DNSEntry";

/// DNSEntry 复数资源名（REST 路径使用）
pub const DNS_ENTRY_RESOURCE: &str = "dnsentries";

/// DNS 类别注解，供存储选择 DNS 提供商
pub const DNS_CLASS_ANNOTATION: &str = "dns.gardener.cloud/class";

/// 对象元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// 对象名称（派生名称）
    pub name: String,
    /// 命名空间
    #[serde(default)]
    pub namespace: String,
    /// 注解
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// 存储分配的版本号，仅在更新时回填
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// DNSEntry 期望状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsEntrySpec {
    /// 目标 DNS 名称（不带尾点）
    pub dns_name: String,
    /// TTL（秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    /// TXT 记录值
    #[serde(default)]
    pub text: Vec<String>,
}

/// DNSEntry 对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsEntry {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: DnsEntrySpec,
    /// 存储写回的状态，求解器从不写入
    #[serde(default, skip_serializing)]
    pub status: Option<serde_json::Value>,
}

impl DnsEntry {
    /// 创建新的 DNSEntry
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        annotations: BTreeMap<String, String>,
        ttl: i64,
        dns_name: impl Into<String>,
        text: Vec<String>,
    ) -> Self {
        Self {
            api_version: DNS_ENTRY_API_VERSION.to_string(),
            kind: DNS_ENTRY_KIND.to_string(),
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                annotations,
                resource_version: None,
            },
            spec: DnsEntrySpec {
                dns_name: dns_name.into(),
                ttl: Some(ttl),
                text,
            },
            status: None,
        }
    }

    /// 对象名称
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// 所在命名空间
    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// 配置的 DNS 类别
    pub fn dns_class(&self) -> Option<&str> {
        self.metadata
            .annotations
            .get(DNS_CLASS_ANNOTATION)
            .map(String::as_str)
    }

    /// 比较期望状态是否一致（忽略版本号与状态）
    pub fn same_desired_state(&self, other: &DnsEntry) -> bool {
        self.metadata.name == other.metadata.name
            && self.metadata.namespace == other.metadata.namespace
            && self.metadata.annotations == other.metadata.annotations
            && self.spec == other.spec
    }
}

/// 校验对象位置
///
/// 命名空间与名称都必须是 RFC 1123 label，不合法时不发起任何存储操作。
pub fn check_location(namespace: &str, name: &str) -> StoreResult<()> {
    if !is_dns_label(namespace) {
        return Err(StoreError::InvalidLocation(format!("命名空间 '{}'", namespace)));
    }
    if !is_dns_label(name) {
        return Err(StoreError::InvalidLocation(format!("名称 '{}'", name)));
    }
    Ok(())
}

/// 声明式 DNSEntry 存储特征
///
/// 实现必须是线程安全的；求解器对不同挑战并发调用。
/// 冲突与不存在必须以 [`StoreError::AlreadyExists`] / [`StoreError::NotFound`]
/// 的形式返回，求解器依赖它们实现幂等。
///
/// [`StoreError::AlreadyExists`]: crate::error::StoreError::AlreadyExists
/// [`StoreError::NotFound`]: crate::error::StoreError::NotFound
#[async_trait::async_trait]
pub trait DnsEntryStore: Send + Sync + Debug {
    /// 创建对象；已存在时返回 `AlreadyExists`
    async fn create(&self, namespace: &str, entry: &DnsEntry) -> StoreResult<()>;

    /// 整体替换已存在的对象
    async fn update(&self, namespace: &str, entry: &DnsEntry) -> StoreResult<()>;

    /// 删除对象；不存在时返回 `NotFound`
    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()>;

    /// 读取对象；不存在时返回 `None`
    async fn get(&self, namespace: &str, name: &str) -> StoreResult<Option<DnsEntry>>;

    /// 获取存储名称
    fn store_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> DnsEntry {
        let mut annotations = BTreeMap::new();
        annotations.insert(DNS_CLASS_ANNOTATION.to_string(), "garden".to_string());
        DnsEntry::new(
            "acme-challenge-2354167409",
            "certs",
            annotations,
            120,
            "_acme-challenge.example.com",
            vec!["abc".to_string()],
        )
    }

    #[test]
    fn test_check_location() {
        assert!(check_location("certs", "acme-challenge-1").is_ok());
        assert!(matches!(
            check_location("", "acme-challenge-1"),
            Err(StoreError::InvalidLocation(_))
        ));
        assert!(check_location("../kube-system", "acme-challenge-1").is_err());
        assert!(check_location("certs", "../../secrets/x").is_err());
        assert_eq!(DNS_ENTRY_API_VERSION, format!("{}/{}", DNS_ENTRY_GROUP, DNS_ENTRY_VERSION));
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(sample_entry()).unwrap();
        assert_eq!(value["apiVersion"], "dns.gardener.cloud/v1alpha1");
        assert_eq!(value["kind"], "DNSEntry");
        assert_eq!(value["metadata"]["name"], "acme-challenge-2354167409");
        assert_eq!(value["metadata"]["annotations"]["dns.gardener.cloud/class"], "garden");
        assert!(value["metadata"].get("resourceVersion").is_none());
        assert_eq!(value["spec"]["dnsName"], "_acme-challenge.example.com");
        assert_eq!(value["spec"]["ttl"], 120);
        assert_eq!(value["spec"]["text"], serde_json::json!(["abc"]));
        assert!(value.get("status").is_none());
    }

    #[test]
    fn test_empty_annotations_are_omitted() {
        let entry = DnsEntry::new("n", "ns", BTreeMap::new(), 60, "a.example.com", vec![]);
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value["metadata"].get("annotations").is_none());
        assert_eq!(entry.dns_class(), None);
    }

    #[test]
    fn test_deserialize_live_object() {
        let body = serde_json::json!({
            "apiVersion": "dns.gardener.cloud/v1alpha1",
            "kind": "DNSEntry",
            "metadata": {
                "name": "acme-challenge-2354167409",
                "namespace": "certs",
                "resourceVersion": "4711",
                "uid": "6f1c1d4e-0000-0000-0000-000000000000",
                "annotations": {"dns.gardener.cloud/class": "garden"}
            },
            "spec": {"dnsName": "_acme-challenge.example.com", "ttl": 120, "text": ["abc"]},
            "status": {"state": "Ready"}
        });
        let entry: DnsEntry = serde_json::from_value(body).unwrap();
        assert_eq!(entry.metadata.resource_version.as_deref(), Some("4711"));
        assert_eq!(entry.dns_class(), Some("garden"));
        assert!(entry.status.is_some());
        assert!(entry.same_desired_state(&sample_entry()));
    }
}
