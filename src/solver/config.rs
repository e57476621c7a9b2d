//! 颁发者级求解器配置
//! 从挑战携带的配置原文解码，并结合挑战上下文解析出命名空间、注解与 TTL

use crate::challenge::{ChallengeRequest, ConfigBlob};
use crate::dns::DNS_CLASS_ANNOTATION;
use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// 默认 TTL（秒）
pub const DEFAULT_TTL: i64 = 120;

/// 求解器配置，所有字段可选，未知字段忽略
///
/// 字段名不区分大小写；同一字段出现多次时以最后一个非 null 值为准。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverConfig {
    /// DNS 类别，写入 `dns.gardener.cloud/class` 注解
    pub dns_class: Option<String>,
    /// TTL（秒），非正值按默认处理
    pub ttl: Option<i64>,
    /// 覆盖 DNSEntry 所在命名空间
    pub namespace: Option<String>,
}

impl<'de> Deserialize<'de> for SolverConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ConfigVisitor;

        impl<'de> Visitor<'de> for ConfigVisitor {
            type Value = SolverConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("求解器配置对象")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SolverConfig, A::Error> {
                let mut config = SolverConfig::default();
                while let Some(key) = map.next_key::<String>()? {
                    if key.eq_ignore_ascii_case("dns-class") {
                        if let Some(class) = map.next_value::<Option<String>>()? {
                            config.dns_class = Some(class);
                        }
                    } else if key.eq_ignore_ascii_case("ttl") {
                        if let Some(ttl) = map.next_value::<Option<i64>>()? {
                            config.ttl = Some(ttl);
                        }
                    } else if key.eq_ignore_ascii_case("namespace") {
                        if let Some(namespace) = map.next_value::<Option<String>>()? {
                            config.namespace = Some(namespace);
                        }
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(config)
            }
        }

        deserializer.deserialize_map(ConfigVisitor)
    }
}

impl SolverConfig {
    /// 解码配置原文
    ///
    /// 缺失、空白或 `null` 得到零值配置；格式错误原样返回，不做掩盖。
    pub fn decode(blob: Option<&ConfigBlob>) -> Result<Self, serde_json::Error> {
        let raw = match blob.map(|b| b.as_str().trim()) {
            None | Some("") | Some("null") => return Ok(Self::default()),
            Some(raw) => raw,
        };
        serde_json::from_str(raw)
    }

    /// 有效的 DNS 类别（空串视为未设置）
    pub fn dns_class(&self) -> Option<&str> {
        self.dns_class.as_deref().filter(|c| !c.is_empty())
    }

    /// 有效的命名空间覆盖（空串视为未设置）
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// 有效的 TTL 覆盖（非正值视为未设置）
    pub fn ttl(&self) -> Option<i64> {
        self.ttl.filter(|ttl| *ttl > 0)
    }

    /// 结合挑战上下文解析
    pub fn resolve(&self, request: &ChallengeRequest) -> ResolvedConfig {
        let namespace = self
            .namespace()
            .unwrap_or(&request.resource_namespace)
            .to_string();

        let mut annotations = BTreeMap::new();
        if let Some(class) = self.dns_class() {
            annotations.insert(DNS_CLASS_ANNOTATION.to_string(), class.to_string());
        }

        ResolvedConfig {
            namespace,
            ttl: self.ttl().unwrap_or(DEFAULT_TTL),
            annotations,
        }
    }
}

/// 解析后的有效配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub namespace: String,
    pub ttl: i64,
    pub annotations: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::ChallengeAction;

    fn request() -> ChallengeRequest {
        ChallengeRequest::new(
            ChallengeAction::Present,
            "_acme-challenge.example.com.",
            "abc",
            "certs",
        )
    }

    fn decode(raw: &str) -> Result<SolverConfig, serde_json::Error> {
        SolverConfig::decode(Some(&ConfigBlob::from_raw(raw)))
    }

    #[test]
    fn test_empty_inputs_decode_to_default() {
        assert_eq!(SolverConfig::decode(None).unwrap(), SolverConfig::default());
        assert_eq!(decode("").unwrap(), SolverConfig::default());
        assert_eq!(decode("  ").unwrap(), SolverConfig::default());
        assert_eq!(decode("null").unwrap(), SolverConfig::default());
        assert_eq!(decode("{}").unwrap(), SolverConfig::default());
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        assert!(decode("{not json").is_err());
        assert!(decode(r#"{"ttl":"300"}"#).is_err());
        assert!(decode(r#"{"ttl":1.5}"#).is_err());
        assert!(decode(r#""garden""#).is_err());
        assert!(decode("[]").is_err());
    }

    #[test]
    fn test_field_names_ignore_case() {
        let config = decode(r#"{"TTL":300,"Namespace":"dns","DNS-Class":"garden"}"#).unwrap();
        assert_eq!(config.ttl(), Some(300));
        assert_eq!(config.namespace(), Some("dns"));
        assert_eq!(config.dns_class(), Some("garden"));
    }

    #[test]
    fn test_duplicate_fields_last_wins() {
        let config = decode(r#"{"ttl":60,"TTL":300,"namespace":"a","namespace":"b"}"#).unwrap();
        assert_eq!(config.ttl(), Some(300));
        assert_eq!(config.namespace(), Some("b"));

        // null 不覆盖已有值
        let config = decode(r#"{"ttl":60,"ttl":null}"#).unwrap();
        assert_eq!(config.ttl(), Some(60));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let config = decode(r#"{"dns-class":"garden","email":"ops@example.com"}"#).unwrap();
        assert_eq!(config.dns_class(), Some("garden"));
    }

    #[test]
    fn test_ttl_resolution() {
        assert_eq!(SolverConfig::default().resolve(&request()).ttl, 120);
        assert_eq!(decode(r#"{"ttl":0}"#).unwrap().resolve(&request()).ttl, 120);
        assert_eq!(decode(r#"{"ttl":-5}"#).unwrap().resolve(&request()).ttl, 120);
        assert_eq!(decode(r#"{"ttl":300}"#).unwrap().resolve(&request()).ttl, 300);
    }

    #[test]
    fn test_namespace_resolution() {
        assert_eq!(SolverConfig::default().resolve(&request()).namespace, "certs");
        assert_eq!(
            decode(r#"{"namespace":""}"#).unwrap().resolve(&request()).namespace,
            "certs"
        );
        assert_eq!(
            decode(r#"{"namespace":"dns"}"#).unwrap().resolve(&request()).namespace,
            "dns"
        );
    }

    #[test]
    fn test_class_annotation() {
        let resolved = decode(r#"{"dns-class":"garden"}"#).unwrap().resolve(&request());
        assert_eq!(
            resolved.annotations.get(DNS_CLASS_ANNOTATION).map(String::as_str),
            Some("garden")
        );

        let resolved = decode(r#"{"dns-class":""}"#).unwrap().resolve(&request());
        assert!(resolved.annotations.is_empty());
    }
}
