//! kubeconfig 文件解析
//! 只读取访问 API 服务器所需的字段：集群地址、CA、Bearer 令牌

use super::{read_file, KubeClientConfig};
use crate::error::{AuthError, AuthResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// kubeconfig 文件结构
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    /// 当前上下文
    pub current_context: Option<String>,
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterConfig,
}

/// 集群配置
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterConfig {
    /// API 服务器地址
    pub server: String,
    /// CA 证书（base64）
    pub certificate_authority_data: Option<String>,
    /// CA 证书文件路径
    pub certificate_authority: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextConfig,
}

/// 上下文配置
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    pub cluster: String,
    pub user: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: UserConfig,
}

/// 用户认证配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    /// Bearer 令牌
    pub token: Option<String>,
    /// 令牌文件路径
    pub token_file: Option<String>,
}

impl Kubeconfig {
    /// 从文件加载
    pub fn from_file(path: &Path) -> AuthResult<Self> {
        let content = read_file(path)?;
        Self::from_yaml(&String::from_utf8_lossy(&content))
    }

    /// 从 YAML 文本解析
    pub fn from_yaml(content: &str) -> AuthResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// 选定上下文名称
    pub fn context_name<'a>(&'a self, requested: Option<&'a str>) -> AuthResult<&'a str> {
        requested
            .or(self.current_context.as_deref())
            .filter(|name| !name.is_empty())
            .ok_or(AuthError::NoCurrentContext)
    }

    /// 解析为客户端配置
    ///
    /// `base_dir` 用于解析相对的证书与令牌文件路径，通常是 kubeconfig 所在目录。
    pub fn resolve(&self, context: Option<&str>, base_dir: Option<&Path>) -> AuthResult<KubeClientConfig> {
        let context_name = self.context_name(context)?;
        let context = self
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .map(|c| &c.context)
            .ok_or_else(|| AuthError::MissingEntry {
                kind: "上下文",
                name: context_name.to_string(),
            })?;

        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == context.cluster)
            .map(|c| &c.cluster)
            .ok_or_else(|| AuthError::MissingEntry {
                kind: "集群",
                name: context.cluster.clone(),
            })?;

        // 用户条目缺失时按匿名访问处理
        let user = self
            .users
            .iter()
            .find(|u| u.name == context.user)
            .map(|u| u.user.clone())
            .unwrap_or_default();

        let mut config = KubeClientConfig::new(cluster.server.clone());
        config.insecure_skip_tls_verify = cluster.insecure_skip_tls_verify;
        config.namespace = context.namespace.clone();

        if let Some(data) = &cluster.certificate_authority_data {
            config.ca_cert = Some(BASE64.decode(data.trim())?);
        } else if let Some(path) = &cluster.certificate_authority {
            config.ca_cert = Some(read_file(&resolve_path(path, base_dir))?);
        }

        if let Some(token) = user.token.filter(|t| !t.is_empty()) {
            config = config.with_token(token);
        } else if let Some(path) = &user.token_file {
            let token = read_file(&resolve_path(path, base_dir))?;
            config = config.with_token(String::from_utf8_lossy(&token).trim().to_string());
        }

        Ok(config)
    }
}

fn resolve_path(path: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(path);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}
