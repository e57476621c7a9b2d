//! DNS-01 挑战请求与响应
//! 与 `acme.cert-manager.io/v1alpha1` ChallengePayload 的 JSON 结构保持一致

use crate::error::{AppError, AppResult, SolverResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

/// 挑战负载的 API 版本
pub const CHALLENGE_API_VERSION: &str = "acme.cert-manager.io/v1alpha1";

/// 挑战负载的资源类型
pub const CHALLENGE_KIND: &str = "ChallengePayload";

/// 挑战动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeAction {
    Present,
    CleanUp,
}

impl std::fmt::Display for ChallengeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengeAction::Present => write!(f, "Present"),
            ChallengeAction::CleanUp => write!(f, "CleanUp"),
        }
    }
}

/// 颁发者提供的求解器配置原文
///
/// 保留原始 JSON 文本，解码推迟到求解器内部，
/// 这样格式错误可以带上派生名称报告给调用方。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBlob(String);

impl ConfigBlob {
    /// 从 JSON 值创建
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self(value.to_string())
    }

    /// 直接使用原始文本（不校验格式）
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// 原始文本
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for ConfigBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = RawValue::from_string(self.0.clone()).map_err(serde::ser::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ConfigBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        Ok(Self(raw.get().to_string()))
    }
}

/// 挑战请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// 请求标识，原样回填到响应
    #[serde(default)]
    pub uid: String,
    pub action: ChallengeAction,
    /// 挑战类型，恒为 dns-01
    #[serde(rename = "type", default)]
    pub challenge_type: String,
    /// 证书中的域名
    #[serde(default)]
    pub dns_name: String,
    /// 挑战密钥（TXT 记录值）
    pub key: String,
    /// 挑战资源所在命名空间
    #[serde(default)]
    pub resource_namespace: String,
    /// 已解析的 FQDN，通常带尾点
    #[serde(rename = "resolvedFQDN")]
    pub resolved_fqdn: String,
    #[serde(default)]
    pub resolved_zone: String,
    #[serde(default)]
    pub allow_ambient_credentials: bool,
    /// 颁发者上的求解器配置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigBlob>,
}

impl ChallengeRequest {
    /// 创建最小请求
    pub fn new(
        action: ChallengeAction,
        resolved_fqdn: impl Into<String>,
        key: impl Into<String>,
        resource_namespace: impl Into<String>,
    ) -> Self {
        Self {
            uid: String::new(),
            action,
            challenge_type: "dns-01".to_string(),
            dns_name: String::new(),
            key: key.into(),
            resource_namespace: resource_namespace.into(),
            resolved_fqdn: resolved_fqdn.into(),
            resolved_zone: String::new(),
            allow_ambient_credentials: false,
            config: None,
        }
    }

    /// 设置求解器配置
    pub fn with_config(mut self, config: ConfigBlob) -> Self {
        self.config = Some(config);
        self
    }

    /// 设置请求标识
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    /// 改为指定动作
    pub fn with_action(mut self, action: ChallengeAction) -> Self {
        self.action = action;
        self
    }

    /// 解析请求：接受 ChallengePayload 包装或裸请求
    pub fn from_json(content: &str) -> AppResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let request = match value.get("request") {
            Some(request) if value.get("kind").is_some() || value.get("apiVersion").is_some() => {
                request.clone()
            }
            _ => value,
        };

        // 重新按文本解析，保留 config 的原始 JSON
        let request: ChallengeRequest = serde_json::from_str(&request.to_string())
            .map_err(|e| AppError::InvalidChallenge(e.to_string()))?;

        if request.resolved_fqdn.is_empty() {
            return Err(AppError::InvalidChallenge("resolvedFQDN 不能为空".to_string()));
        }
        Ok(request)
    }
}

/// 响应状态
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// 挑战响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub uid: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,
}

impl ChallengeResponse {
    /// 根据求解结果构造响应
    pub fn from_result(uid: &str, result: &SolverResult<()>) -> Self {
        match result {
            Ok(()) => Self {
                uid: uid.to_string(),
                success: true,
                status: None,
            },
            Err(err) => Self {
                uid: uid.to_string(),
                success: false,
                status: Some(ResponseStatus {
                    code: Some(500),
                    reason: err.reason().to_string(),
                    message: err.to_string(),
                }),
            },
        }
    }

    /// 失败时的错误原因
    pub fn reason(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.reason.as_str())
    }
}

/// 挑战负载包装
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePayload {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ChallengeRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ChallengeResponse>,
}

impl ChallengePayload {
    /// 包装响应
    pub fn response(response: ChallengeResponse) -> Self {
        Self {
            api_version: CHALLENGE_API_VERSION.to_string(),
            kind: CHALLENGE_KIND.to_string(),
            request: None,
            response: Some(response),
        }
    }
}
