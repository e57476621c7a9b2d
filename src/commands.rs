//! 命令处理模块
//!
//! 包含所有子命令的具体实现逻辑

use crate::cli::ChallengeArgs;
use crate::utils::{mask_token, read_challenge};
use acme_dnsentry::auth::KubeClientConfig;
use acme_dnsentry::challenge::{ChallengeAction, ChallengePayload};
use acme_dnsentry::config::{AppConfig, SolverIdentity};
use acme_dnsentry::app_error;
use acme_dnsentry::dns::MemoryDnsEntryStore;
use acme_dnsentry::error::AppResult;
use acme_dnsentry::naming::derive_name;
use acme_dnsentry::solver::{handle_challenge, DnsEntrySolver, Solver};
use rat_logger::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;

/// 构建求解器
///
/// 演练模式使用内存存储；否则解析集群凭证并初始化 Kubernetes 存储。
/// 返回的内存存储句柄用于演练结束后展示结果。
fn build_solver(
    config: &AppConfig,
    identity: &'static SolverIdentity,
    dry_run: bool,
) -> AppResult<(DnsEntrySolver, Option<Arc<MemoryDnsEntryStore>>)> {
    if dry_run {
        info!("🔍 演练模式 - 使用内存存储，不会访问集群");
        let store = Arc::new(MemoryDnsEntryStore::new());
        let solver = DnsEntrySolver::with_store(identity, store.clone());
        return Ok((solver, Some(store)));
    }

    let kube = KubeClientConfig::resolve(&config.kubernetes)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let mut solver = DnsEntrySolver::new(identity);
    solver.initialize(&kube, shutdown_rx)?;
    Ok((solver, None))
}

/// 演练结束后输出内存存储内容
async fn print_dry_run_state(store: Option<Arc<MemoryDnsEntryStore>>) -> AppResult<()> {
    if let Some(store) = store {
        let entries = store.entries().await;
        info!("🔍 演练完成 - 存储中共有 {} 个 DNSEntry", entries.len());
        for entry in entries {
            println!("---\n{}", serde_yaml::to_string(&entry)?);
        }
    }
    Ok(())
}

/// 处理 present 命令
pub async fn cmd_present(
    config: &AppConfig,
    identity: &'static SolverIdentity,
    args: ChallengeArgs,
) -> AppResult<()> {
    let request = read_challenge(&args.challenge)?.with_action(ChallengeAction::Present);
    let (solver, memory) = build_solver(config, identity, args.dry_run)?;

    solver.present(&request).await?;
    info!("✅ 挑战记录已发布: {}", derive_name(&request.resolved_fqdn, &request.key));

    print_dry_run_state(memory).await
}

/// 处理 cleanup 命令
pub async fn cmd_cleanup(
    config: &AppConfig,
    identity: &'static SolverIdentity,
    args: ChallengeArgs,
) -> AppResult<()> {
    let request = read_challenge(&args.challenge)?.with_action(ChallengeAction::CleanUp);
    let (solver, memory) = build_solver(config, identity, args.dry_run)?;

    solver.clean_up(&request).await?;
    info!("✅ 挑战记录已清理: {}", derive_name(&request.resolved_fqdn, &request.key));

    print_dry_run_state(memory).await
}

/// 处理 solve 命令：按 action 分发并输出 ChallengePayload 响应
pub async fn cmd_solve(
    config: &AppConfig,
    identity: &'static SolverIdentity,
    args: ChallengeArgs,
) -> AppResult<()> {
    let request = read_challenge(&args.challenge)?;
    let (solver, memory) = build_solver(config, identity, args.dry_run)?;

    info!("📋 求解挑战 {} ({})", request.uid, request.action);
    let response = handle_challenge(&solver, &request).await;
    if !response.success {
        warn!("挑战 {} 求解失败: {:?}", request.uid, response.reason());
    }

    println!("{}", serde_json::to_string_pretty(&ChallengePayload::response(response))?);
    print_dry_run_state(memory).await
}

/// 处理 name 命令
pub fn cmd_name(fqdn: &str, key: &str) {
    println!("{}", derive_name(fqdn, key));
}

/// 处理 render 命令
pub fn cmd_render(identity: &'static SolverIdentity, challenge: &std::path::Path) -> AppResult<()> {
    let request = read_challenge(challenge)?;
    let entry = DnsEntrySolver::new(identity).desired_entry(&request)?;
    print!("{}", serde_yaml::to_string(&entry)?);
    Ok(())
}

/// 处理 show 命令
pub async fn cmd_show(
    config: &AppConfig,
    identity: &'static SolverIdentity,
    challenge: &std::path::Path,
) -> AppResult<()> {
    let request = read_challenge(challenge)?;
    let (solver, _) = build_solver(config, identity, false)?;
    let desired = solver.desired_entry(&request)?;
    let (name, namespace) = (desired.name(), desired.namespace());

    match solver.store()?.get(namespace, name).await? {
        Some(entry) => {
            info!("📋 DNSEntry {}/{}", namespace, name);
            print!("{}", serde_yaml::to_string(&entry)?);
            if let Some(status) = &entry.status {
                println!("status: {}", status);
            }
            if entry.same_desired_state(&desired) {
                info!("✅ 与期望状态一致");
            } else {
                warn!("⚠️ 与期望状态不一致，下次 present 会覆盖");
            }
        }
        None => {
            warn!("DNSEntry {}/{} 不存在", namespace, name);
        }
    }
    Ok(())
}

/// 处理 check-config 命令
pub fn cmd_check_config(config: &AppConfig, identity: &'static SolverIdentity) -> AppResult<()> {
    info!("✅ 配置有效");
    info!("API 组: {}", identity.group_name);
    info!("求解器: {}", identity.solver_name);

    let kube = KubeClientConfig::resolve(&config.kubernetes)
        .map_err(|e| app_error!(Config, "无法解析集群凭证: {}", e))?;
    info!("API 服务器: {}", kube.server);
    info!(
        "令牌: {}",
        kube.token
            .as_ref()
            .map(|t| mask_token(t.expose()))
            .unwrap_or_else(|| "未配置".to_string())
    );
    info!("CA 证书: {}", if kube.ca_cert.is_some() { "已配置" } else { "系统默认" });
    if kube.insecure_skip_tls_verify {
        warn!("⚠️ 已跳过 TLS 证书校验");
    }
    if let Some(namespace) = &kube.namespace {
        info!("凭证默认命名空间: {}", namespace);
    }
    Ok(())
}
