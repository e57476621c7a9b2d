//! 统一错误处理模块
//! 定义 ACME DNSEntry 求解器的所有错误类型

use serde::Deserialize;
use thiserror::Error;

/// 应用顶层错误类型（命令行与启动流程使用）
#[derive(Debug, Error)]
pub enum AppError {
    /// 求解器错误
    #[error("求解器错误: {0}")]
    Solver(#[from] SolverError),

    /// 记录存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),

    /// 认证相关错误
    #[error("认证错误: {0}")]
    Auth(#[from] AuthError),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 挑战请求格式错误
    #[error("挑战请求无效: {0}")]
    InvalidChallenge(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 日志初始化错误
    #[error("日志错误: {0}")]
    Logging(String),
}

/// 挑战求解错误类型
///
/// `ConfigDecode`、`StoreWrite`、`UpdateConflict`、`StoreDelete` 会原样返回给
/// 调用方（签发协议），是否重试由调用方决定。
#[derive(Debug, Error)]
pub enum SolverError {
    /// 颁发者配置无法解码，未执行任何存储操作
    #[error("挑战 [{name}] 求解器配置解码失败: {source}")]
    ConfigDecode {
        /// 派生的 DNSEntry 名称
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// 解析出的命名空间不能作为对象路径，未执行任何存储操作
    #[error("挑战 [{name}] 命名空间 '{namespace}' 无效，必须是 RFC 1123 label")]
    InvalidNamespace { name: String, namespace: String },

    /// 创建失败（已存在以外的原因）
    #[error("挑战 [{name}|{namespace}] DNSEntry 创建失败: {source}")]
    StoreWrite {
        name: String,
        namespace: String,
        #[source]
        source: StoreError,
    },

    /// 已存在，但回退的更新也失败了
    #[error("挑战 [{name}|{namespace}] DNSEntry 已存在但无法更新: {source}")]
    UpdateConflict {
        name: String,
        namespace: String,
        #[source]
        source: StoreError,
    },

    /// 删除失败（不存在以外的原因）
    #[error("清理 [{name}|{namespace}] DNSEntry 删除失败: {source}")]
    StoreDelete {
        name: String,
        namespace: String,
        #[source]
        source: StoreError,
    },

    /// 在 initialize 之前调用了 present/clean_up
    #[error("求解器尚未初始化，缺少记录存储")]
    NotInitialized,

    /// 已收到停止信号，拒绝新的挑战
    #[error("求解器正在停止，拒绝新的挑战")]
    ShuttingDown,

    /// 存储能力构建失败（启动期致命错误）
    #[error("求解器初始化失败: {0}")]
    Initialization(String),
}

impl SolverError {
    /// 获取错误关联的 DNSEntry 名称
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Self::ConfigDecode { name, .. }
            | Self::InvalidNamespace { name, .. }
            | Self::StoreWrite { name, .. }
            | Self::UpdateConflict { name, .. }
            | Self::StoreDelete { name, .. } => Some(name),
            Self::NotInitialized | Self::ShuttingDown | Self::Initialization(_) => None,
        }
    }

    /// 错误原因的简短标识，用于回填挑战响应
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ConfigDecode { .. } => "ConfigDecodeError",
            Self::InvalidNamespace { .. } => "InvalidNamespaceError",
            Self::StoreWrite { .. } => "StoreWriteError",
            Self::UpdateConflict { .. } => "UpdateConflictError",
            Self::StoreDelete { .. } => "StoreDeleteError",
            Self::NotInitialized => "NotInitialized",
            Self::ShuttingDown => "ShuttingDown",
            Self::Initialization(_) => "InitializationError",
        }
    }
}

/// 声明式记录存储错误类型
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// 创建时对象已存在
    #[error("DNSEntry '{namespace}/{name}' 已存在")]
    AlreadyExists { namespace: String, name: String },

    /// 对象不存在
    #[error("DNSEntry '{namespace}/{name}' 不存在")]
    NotFound { namespace: String, name: String },

    /// API 服务器返回的其他错误
    #[error("API 错误 (HTTP {code}, 原因: {reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    /// 网络或传输层错误
    #[error("HTTP 请求失败: {0}")]
    Http(String),

    /// 请求或响应体无法序列化
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// API 服务器地址无效
    #[error("无效的 API 服务器地址: {0}")]
    InvalidEndpoint(String),

    /// 命名空间或名称不是合法的路径段
    #[error("无效的 DNSEntry 位置: {0}")]
    InvalidLocation(String),
}

/// Kubernetes API 返回的 Status 对象（仅关心分类所需字段）
#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StoreError {
    /// 是否为“已存在”
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// 是否为“不存在”
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// 是否值得由调用方重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// 根据 HTTP 状态码与响应体对失败进行分类
    ///
    /// 409 只有在 reason 为 `AlreadyExists` 时才视为已存在，
    /// 乐观锁冲突（reason 为 `Conflict`）仍然作为普通 API 错误返回。
    pub fn from_response(code: u16, body: &str, namespace: &str, name: &str) -> Self {
        let status: ApiStatus = serde_json::from_str(body).unwrap_or_default();
        let reason = status.reason.unwrap_or_default();

        match (code, reason.as_str()) {
            (409, "AlreadyExists") => Self::AlreadyExists {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            (404, _) => Self::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            _ => Self::Api {
                code,
                reason: if reason.is_empty() { "Unknown".to_string() } else { reason },
                message: status
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| body.trim().to_string()),
            },
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// 集群凭证解析错误类型
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("读取凭证文件失败 '{path}': {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("kubeconfig 解析失败: {0}")]
    Kubeconfig(#[from] serde_yaml::Error),

    #[error("kubeconfig 未设置 current-context")]
    NoCurrentContext,

    #[error("kubeconfig 中未找到{kind} '{name}'")]
    MissingEntry { kind: &'static str, name: String },

    #[error("Base64 解码失败: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("不在集群内运行: {0}")]
    NotInCluster(String),
}

/// 结果类型别名
pub type AppResult<T> = std::result::Result<T, AppError>;
pub type SolverResult<T> = std::result::Result<T, SolverError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// 便捷的错误创建宏
#[macro_export]
macro_rules! app_error {
    ($variant:ident, $msg:expr) => {
        $crate::error::AppError::$variant($msg.to_string())
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::error::AppError::$variant(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! store_error {
    ($variant:ident, $msg:expr) => {
        $crate::error::StoreError::$variant($msg.to_string())
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::error::StoreError::$variant(format!($fmt, $($arg)*))
    };
}
