//! ACME DNSEntry 求解器库
//!
//! 通过声明式 DNSEntry 资源（`dns.gardener.cloud/v1alpha1`）应答 ACME DNS-01 挑战：
//! - 由挑战 FQDN 与密钥确定性派生 DNSEntry 名称
//! - 幂等的创建或更新 / 删除协议
//! - 颁发者级配置（命名空间、DNS 类别、TTL）解析
//! - Kubernetes REST 存储与用于演练和测试的内存存储

pub mod error;
pub mod logger;
pub mod naming;
pub mod auth;
pub mod config;
pub mod dns;
pub mod challenge;
pub mod solver;

// 重新导出常用类型
pub use error::{AppError, AppResult, AuthError, SolverError, SolverResult, StoreError, StoreResult};
pub use logger::{init_logger, LogConfig, LogLevel, LogOutput};
pub use naming::{derive_name, DNS_ENTRY_NAME_PREFIX};
pub use auth::{KubeClientConfig, SecureCredential};
pub use config::{init_identity, identity, AppConfig, ConfigManager, SolverIdentity};
pub use dns::{DnsEntry, DnsEntryStore, KubernetesDnsEntryStore, MemoryDnsEntryStore, StoreOperation};
pub use challenge::{ChallengeAction, ChallengePayload, ChallengeRequest, ChallengeResponse, ConfigBlob};
pub use solver::{handle_challenge, DnsEntrySolver, Solver, SolverConfig};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
