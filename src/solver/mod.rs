//! DNS-01 挑战求解器
//!
//! 每个挑战对应一个 DNSEntry 对象，名称由 [`derive_name`] 确定。
//! Present 先创建，已存在时整体替换；CleanUp 删除，不存在视为成功。
//! 求解器本身不持有任何挑战状态，并发调用之间的仲裁完全交给存储。

pub mod config;

use crate::auth::KubeClientConfig;
use crate::challenge::{ChallengeAction, ChallengeRequest, ChallengeResponse};
use crate::config::SolverIdentity;
use crate::dns::{DnsEntry, DnsEntryStore, KubernetesDnsEntryStore};
use crate::error::{SolverError, SolverResult};
use crate::naming::{derive_name, is_dns_label};
use crate::{solver_debug, solver_error, solver_info, solver_warn};
use std::sync::Arc;
use tokio::sync::watch;

pub use config::{ResolvedConfig, SolverConfig, DEFAULT_TTL};

/// 挑战求解器特征
#[async_trait::async_trait]
pub trait Solver: Send + Sync {
    /// 求解器名称，在同一 API 组内唯一
    fn name(&self) -> &str;

    /// 发布挑战记录，可重复调用
    async fn present(&self, request: &ChallengeRequest) -> SolverResult<()>;

    /// 删除挑战记录，记录不存在也视为成功
    async fn clean_up(&self, request: &ChallengeRequest) -> SolverResult<()>;

    /// 启动时调用一次，构建存储能力
    ///
    /// `shutdown` 置位后 present / clean_up 直接返回 `ShuttingDown`，不再访问存储。
    fn initialize(
        &mut self,
        config: &KubeClientConfig,
        shutdown: watch::Receiver<bool>,
    ) -> SolverResult<()>;
}

/// 基于 DNSEntry 的求解器
#[derive(Debug, Clone)]
pub struct DnsEntrySolver {
    identity: &'static SolverIdentity,
    store: Option<Arc<dyn DnsEntryStore>>,
    /// 停止信号，置位后不再接受新的挑战
    shutdown: Option<watch::Receiver<bool>>,
}

impl DnsEntrySolver {
    /// 创建尚未初始化的求解器
    pub fn new(identity: &'static SolverIdentity) -> Self {
        Self {
            identity,
            store: None,
            shutdown: None,
        }
    }

    /// 使用已有存储创建求解器
    pub fn with_store(identity: &'static SolverIdentity, store: Arc<dyn DnsEntryStore>) -> Self {
        Self {
            identity,
            store: Some(store),
            shutdown: None,
        }
    }

    /// 求解器身份
    pub fn identity(&self) -> &SolverIdentity {
        self.identity
    }

    /// 当前存储
    pub fn store(&self) -> SolverResult<&Arc<dyn DnsEntryStore>> {
        self.store.as_ref().ok_or(SolverError::NotInitialized)
    }

    /// 是否已收到停止信号
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// 可以处理新挑战时返回存储
    fn active_store(&self) -> SolverResult<&Arc<dyn DnsEntryStore>> {
        let store = self.active_store()?;
        if self.is_shutting_down() {
            return Err(SolverError::ShuttingDown);
        }
        Ok(store)
    }

    /// 解码配置并定位对象，返回 (名称, 解析后的配置)
    fn resolve(&self, request: &ChallengeRequest, stage: &str) -> SolverResult<(String, ResolvedConfig)> {
        let name = derive_name(&request.resolved_fqdn, &request.key);

        let config = SolverConfig::decode(request.config.as_ref()).map_err(|source| {
            solver_error!("{} [{}|-] - 求解器配置解码失败: {}", stage, name, source);
            SolverError::ConfigDecode {
                name: name.clone(),
                source,
            }
        })?;

        let resolved = config.resolve(request);
        if !is_dns_label(&resolved.namespace) {
            solver_error!("{} [{}|-] - 命名空间 '{}' 无效", stage, name, resolved.namespace);
            return Err(SolverError::InvalidNamespace {
                name,
                namespace: resolved.namespace,
            });
        }

        solver_debug!(
            "{} [{}|{}] - 颁发者配置: namespace={:?} dns-class={:?} ttl={:?}",
            stage,
            name,
            resolved.namespace,
            config.namespace(),
            config.dns_class(),
            config.ttl()
        );

        Ok((name, resolved))
    }

    /// 计算挑战对应的期望 DNSEntry
    pub fn desired_entry(&self, request: &ChallengeRequest) -> SolverResult<DnsEntry> {
        let (name, resolved) = self.resolve(request, "挑战")?;
        let dns_name = request
            .resolved_fqdn
            .strip_suffix('.')
            .unwrap_or(&request.resolved_fqdn);

        Ok(DnsEntry::new(
            name,
            resolved.namespace,
            resolved.annotations,
            resolved.ttl,
            dns_name,
            vec![request.key.clone()],
        ))
    }

    /// 计算挑战对应对象的 (名称, 命名空间)
    pub fn entry_location(&self, request: &ChallengeRequest) -> SolverResult<(String, String)> {
        let (name, resolved) = self.resolve(request, "清理")?;
        Ok((name, resolved.namespace))
    }
}

#[async_trait::async_trait]
impl Solver for DnsEntrySolver {
    fn name(&self) -> &str {
        &self.identity.solver_name
    }

    async fn present(&self, request: &ChallengeRequest) -> SolverResult<()> {
        let store = self.active_store()?;
        let entry = self.desired_entry(request)?;
        let name = entry.name().to_string();
        let namespace = entry.namespace().to_string();
        let dns_name = &entry.spec.dns_name;

        solver_info!("挑战已接收 - {}", name);
        solver_debug!("挑战 [{}|{}] - 创建 {} 的 TXT 记录", name, namespace, dns_name);

        match store.create(&namespace, &entry).await {
            Ok(()) => {
                solver_info!("挑战 [{}|{}] - 已创建 '{}' 的 DNSEntry", name, namespace, dns_name);
                Ok(())
            }
            Err(err) if err.is_already_exists() => {
                solver_debug!("挑战 [{}|{}] - '{}' 的 DNSEntry 已存在，执行更新", name, namespace, dns_name);
                match store.update(&namespace, &entry).await {
                    Ok(()) => {
                        solver_info!("挑战 [{}|{}] - 已更新 '{}' 的 DNSEntry", name, namespace, dns_name);
                        Ok(())
                    }
                    Err(source) => {
                        solver_error!("挑战 [{}|{}] - DNSEntry 已存在但无法更新: {}", name, namespace, source);
                        Err(SolverError::UpdateConflict {
                            name,
                            namespace,
                            source,
                        })
                    }
                }
            }
            Err(source) => {
                solver_error!("挑战 [{}|{}] - DNSEntry 无法创建: {}", name, namespace, source);
                Err(SolverError::StoreWrite {
                    name,
                    namespace,
                    source,
                })
            }
        }
    }

    async fn clean_up(&self, request: &ChallengeRequest) -> SolverResult<()> {
        let store = self.active_store()?;
        let (name, namespace) = self.entry_location(request)?;

        solver_info!("清理已接收 - {}", name);
        solver_debug!("清理 [{}|{}] - 删除 DNSEntry", name, namespace);

        match store.delete(&namespace, &name).await {
            Ok(()) => {
                solver_info!("清理 [{}|{}] - 已删除 DNSEntry", name, namespace);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                solver_warn!("清理 [{}|{}] - 要删除的 DNSEntry 不存在", name, namespace);
                Ok(())
            }
            Err(source) => {
                solver_error!("清理 [{}|{}] - 无法删除 DNSEntry: {}", name, namespace, source);
                Err(SolverError::StoreDelete {
                    name,
                    namespace,
                    source,
                })
            }
        }
    }

    fn initialize(
        &mut self,
        config: &KubeClientConfig,
        shutdown: watch::Receiver<bool>,
    ) -> SolverResult<()> {
        let store = KubernetesDnsEntryStore::new(config)
            .map_err(|e| SolverError::Initialization(format!("无法构建 DNSEntry 客户端: {}", e)))?;
        self.store = Some(Arc::new(store));

        if *shutdown.borrow() {
            solver_warn!("求解器 {} 初始化时已收到停止信号", self.identity.solver_name);
        }
        self.shutdown = Some(shutdown);

        solver_info!(
            "求解器 {}/{} 初始化成功，API 服务器: {}",
            self.identity.group_name,
            self.identity.solver_name,
            config.server
        );
        Ok(())
    }
}

/// 按动作分发挑战并生成响应
pub async fn handle_challenge(solver: &dyn Solver, request: &ChallengeRequest) -> ChallengeResponse {
    let result = match request.action {
        ChallengeAction::Present => solver.present(request).await,
        ChallengeAction::CleanUp => solver.clean_up(request).await,
    };
    ChallengeResponse::from_result(&request.uid, &result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::ConfigBlob;
    use crate::config::init_identity;

    fn identity() -> &'static SolverIdentity {
        init_identity(SolverIdentity::new("acme.example.com", "dnsentry")).unwrap()
    }

    fn request(fqdn: &str) -> ChallengeRequest {
        ChallengeRequest::new(ChallengeAction::Present, fqdn, "abc", "certs")
    }

    #[test]
    fn test_desired_entry_strips_one_trailing_dot() {
        let solver = DnsEntrySolver::new(identity());

        let entry = solver.desired_entry(&request("_acme-challenge.example.com.")).unwrap();
        assert_eq!(entry.spec.dns_name, "_acme-challenge.example.com");
        assert_eq!(entry.name(), "acme-challenge-2354167409");
        assert_eq!(entry.namespace(), "certs");
        assert_eq!(entry.spec.ttl, Some(120));
        assert_eq!(entry.spec.text, vec!["abc".to_string()]);

        let entry = solver.desired_entry(&request("_acme-challenge.example.com")).unwrap();
        assert_eq!(entry.spec.dns_name, "_acme-challenge.example.com");

        let entry = solver.desired_entry(&request("_acme-challenge.example.com..")).unwrap();
        assert_eq!(entry.spec.dns_name, "_acme-challenge.example.com.");
    }

    #[test]
    fn test_desired_entry_applies_overrides() {
        let solver = DnsEntrySolver::new(identity());
        let request = request("_acme-challenge.example.com.").with_config(ConfigBlob::from_value(
            &serde_json::json!({"dns-class": "garden", "ttl": 300, "namespace": "dns"}),
        ));

        let entry = solver.desired_entry(&request).unwrap();
        assert_eq!(entry.namespace(), "dns");
        assert_eq!(entry.dns_class(), Some("garden"));
        assert_eq!(entry.spec.ttl, Some(300));
    }

    #[test]
    fn test_config_error_carries_name() {
        let solver = DnsEntrySolver::new(identity());
        let request = request("_acme-challenge.example.com.").with_config(ConfigBlob::from_raw("{"));

        let err = solver.entry_location(&request).unwrap_err();
        assert_eq!(err.reason(), "ConfigDecodeError");
        assert_eq!(err.entry_name(), Some("acme-challenge-2354167409"));
    }

    #[test]
    fn test_invalid_namespace_is_rejected() {
        let solver = DnsEntrySolver::new(identity());

        let traversal = request("_acme-challenge.example.com.").with_config(ConfigBlob::from_value(
            &serde_json::json!({"namespace": "../../../../api/v1/namespaces/kube-system/secrets/victim#"}),
        ));
        let err = solver.desired_entry(&traversal).unwrap_err();
        assert!(matches!(err, SolverError::InvalidNamespace { .. }));
        assert_eq!(err.entry_name(), Some("acme-challenge-2354167409"));

        let empty = ChallengeRequest::new(ChallengeAction::CleanUp, "_acme-challenge.example.com.", "abc", "");
        let err = solver.entry_location(&empty).unwrap_err();
        assert_eq!(err.reason(), "InvalidNamespaceError");
    }

    #[tokio::test]
    async fn test_uninitialized_solver() {
        let solver = DnsEntrySolver::new(identity());
        assert_eq!(solver.name(), "dnsentry");

        let err = solver.present(&request("_acme-challenge.example.com.")).await.unwrap_err();
        assert!(matches!(err, SolverError::NotInitialized));
    }

    #[tokio::test]
    async fn test_initialize_builds_store() {
        let mut solver = DnsEntrySolver::new(identity());
        let (tx, rx) = watch::channel(false);

        let config = KubeClientConfig::new("https://api.example.internal:6443").with_token("t");
        solver.initialize(&config, rx).unwrap();
        assert_eq!(solver.store().unwrap().store_name(), "Kubernetes");
        assert!(!solver.is_shutting_down());

        tx.send(true).unwrap();
        assert!(solver.is_shutting_down());
        let err = solver.present(&request("_acme-challenge.example.com.")).await.unwrap_err();
        assert!(matches!(err, SolverError::ShuttingDown));
        let err = solver
            .clean_up(&request("_acme-challenge.example.com.").with_action(ChallengeAction::CleanUp))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "ShuttingDown");

        let mut broken = DnsEntrySolver::new(identity());
        let (_tx, rx) = watch::channel(false);
        let err = broken.initialize(&KubeClientConfig::new("::"), rx).unwrap_err();
        assert!(matches!(err, SolverError::Initialization(_)));
    }
}
