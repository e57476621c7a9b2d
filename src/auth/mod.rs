//! 集群凭证模块
//! 解析访问 DNSEntry 存储（Kubernetes API 服务器）所需的地址、CA 与令牌

pub mod kubeconfig;

use crate::config::KubernetesConfig;
use crate::error::{AuthError, AuthResult};
use secrecy::{ExposeSecret, Secret};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use kubeconfig::Kubeconfig;

/// 集群内服务账户挂载目录
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// 默认请求超时（秒）
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// 安全凭证包装器
#[derive(Debug, Clone)]
pub struct SecureCredential {
    /// 加密的凭证
    credential: Secret<String>,
}

impl SecureCredential {
    /// 创建新的安全凭证
    pub fn new(credential: String) -> Self {
        Self {
            credential: Secret::new(credential),
        }
    }

    /// 暴露凭证（仅在需要时使用）
    pub fn expose(&self) -> &str {
        self.credential.expose_secret()
    }
}

/// 存储客户端配置
///
/// 由启动流程构建一次，之后交给求解器的 `initialize`。
#[derive(Debug, Clone)]
pub struct KubeClientConfig {
    /// API 服务器地址
    pub server: String,
    /// CA 证书（PEM）
    pub ca_cert: Option<Vec<u8>>,
    /// Bearer 令牌
    pub token: Option<SecureCredential>,
    /// 跳过 TLS 校验（仅用于测试环境）
    pub insecure_skip_tls_verify: bool,
    /// 请求超时
    pub timeout: Duration,
    /// 凭证来源的默认命名空间
    pub namespace: Option<String>,
}

impl KubeClientConfig {
    /// 使用 API 服务器地址创建配置
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ca_cert: None,
            token: None,
            insecure_skip_tls_verify: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            namespace: None,
        }
    }

    /// 设置 Bearer 令牌
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecureCredential::new(token.into()));
        self
    }

    /// 设置 CA 证书
    pub fn with_ca_cert(mut self, pem: Vec<u8>) -> Self {
        self.ca_cert = Some(pem);
        self
    }

    /// 设置请求超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 集群内配置（服务账户）
    pub fn in_cluster() -> AuthResult<Self> {
        Self::in_cluster_from(
            std::env::var("KUBERNETES_SERVICE_HOST").ok(),
            std::env::var("KUBERNETES_SERVICE_PORT").ok(),
            Path::new(SERVICE_ACCOUNT_DIR),
        )
    }

    fn in_cluster_from(
        host: Option<String>,
        port: Option<String>,
        account_dir: &Path,
    ) -> AuthResult<Self> {
        let host = host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AuthError::NotInCluster("未设置 KUBERNETES_SERVICE_HOST".to_string()))?;
        let port = port.filter(|p| !p.is_empty()).unwrap_or_else(|| "443".to_string());

        let server = if host.contains(':') {
            format!("https://[{}]:{}", host, port)
        } else {
            format!("https://{}:{}", host, port)
        };

        let token = read_file(&account_dir.join("token"))?;
        let token = String::from_utf8_lossy(&token).trim().to_string();

        let ca_path = account_dir.join("ca.crt");
        let ca_cert = if ca_path.exists() {
            Some(read_file(&ca_path)?)
        } else {
            None
        };

        let namespace = std::fs::read_to_string(account_dir.join("namespace"))
            .ok()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty());

        Ok(Self {
            ca_cert,
            namespace,
            ..Self::new(server).with_token(token)
        })
    }

    /// 从 kubeconfig 文件加载
    pub fn from_kubeconfig(path: &Path, context: Option<&str>) -> AuthResult<Self> {
        let kubeconfig = Kubeconfig::from_file(path)?;
        kubeconfig.resolve(context, path.parent())
    }

    /// 按优先级解析客户端配置
    ///
    /// 显式地址 > kubeconfig 文件 > 集群内服务账户 > `~/.kube/config`
    pub fn resolve(settings: &KubernetesConfig) -> AuthResult<Self> {
        let mut config = if let Some(server) = settings.api_server.as_deref().filter(|s| !s.is_empty()) {
            let mut config = Self::new(server);
            if let Some(token_file) = &settings.token_file {
                let token = read_file(token_file)?;
                config = config.with_token(String::from_utf8_lossy(&token).trim().to_string());
            }
            config
        } else if let Some(path) = &settings.kubeconfig {
            Self::from_kubeconfig(path, settings.context.as_deref())?
        } else {
            match Self::in_cluster() {
                Ok(config) => config,
                Err(AuthError::NotInCluster(reason)) => {
                    let default_path = default_kubeconfig_path()
                        .filter(|p| p.exists())
                        .ok_or(AuthError::NotInCluster(reason))?;
                    Self::from_kubeconfig(&default_path, settings.context.as_deref())?
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(ca_file) = &settings.ca_file {
            config = config.with_ca_cert(read_file(ca_file)?);
        }
        config.insecure_skip_tls_verify |= settings.insecure_skip_tls_verify;

        Ok(config.with_timeout(Duration::from_secs(settings.timeout_seconds)))
    }
}

/// 默认 kubeconfig 路径
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("config"))
}

pub(crate) fn read_file(path: &Path) -> AuthResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| AuthError::ReadFile {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_credential_debug_is_redacted() {
        let credential = SecureCredential::new("super-secret-token".to_string());
        assert_eq!(credential.expose(), "super-secret-token");
        assert!(!format!("{:?}", credential).contains("super-secret-token"));
    }

    #[test]
    fn test_in_cluster_from_service_account() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("token"), "sa-token\n").unwrap();
        std::fs::write(dir.path().join("ca.crt"), "-----BEGIN CERTIFICATE-----\n").unwrap();
        std::fs::write(dir.path().join("namespace"), "cert-manager").unwrap();

        let config = KubeClientConfig::in_cluster_from(
            Some("10.96.0.1".to_string()),
            Some("443".to_string()),
            dir.path(),
        )
        .unwrap();

        assert_eq!(config.server, "https://10.96.0.1:443");
        assert_eq!(config.token.as_ref().map(|t| t.expose()), Some("sa-token"));
        assert!(config.ca_cert.is_some());
        assert_eq!(config.namespace.as_deref(), Some("cert-manager"));
        assert!(!config.insecure_skip_tls_verify);
    }

    #[test]
    fn test_in_cluster_ipv6_host() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("token"), "t").unwrap();

        let config =
            KubeClientConfig::in_cluster_from(Some("fd00::1".to_string()), None, dir.path()).unwrap();
        assert_eq!(config.server, "https://[fd00::1]:443");
        assert!(config.ca_cert.is_none());
    }

    #[test]
    fn test_not_in_cluster() {
        let dir = tempfile::tempdir().unwrap();
        let err = KubeClientConfig::in_cluster_from(None, None, dir.path()).unwrap_err();
        assert!(matches!(err, AuthError::NotInCluster(_)));
    }

    #[test]
    fn test_missing_token_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = KubeClientConfig::in_cluster_from(Some("10.0.0.1".to_string()), None, dir.path())
            .unwrap_err();
        assert!(matches!(err, AuthError::ReadFile { .. }));
    }

    #[test]
    fn test_resolve_explicit_server() {
        let dir = tempfile::tempdir().unwrap();
        let token_file = dir.path().join("token");
        std::fs::write(&token_file, "explicit-token").unwrap();

        let settings = KubernetesConfig {
            api_server: Some("https://api.example.internal:6443".to_string()),
            token_file: Some(token_file),
            insecure_skip_tls_verify: true,
            timeout_seconds: 5,
            ..Default::default()
        };

        let config = KubeClientConfig::resolve(&settings).unwrap();
        assert_eq!(config.server, "https://api.example.internal:6443");
        assert_eq!(config.token.as_ref().map(|t| t.expose()), Some("explicit-token"));
        assert!(config.insecure_skip_tls_verify);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
