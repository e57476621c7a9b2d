//! 测试辅助函数和通用配置
//!
//! 提供测试中常用的初始化、挑战构造和求解器构造方法，减少重复代码

#![allow(dead_code)]

use acme_dnsentry::challenge::{ChallengeAction, ChallengeRequest, ConfigBlob};
use acme_dnsentry::config::{init_identity, SolverIdentity};
use acme_dnsentry::dns::MemoryDnsEntryStore;
use acme_dnsentry::logger::{init_logger, LogConfig, LogLevel, LogOutput};
use acme_dnsentry::solver::DnsEntrySolver;
use std::sync::Arc;

/// 常用测试 FQDN
pub const TEST_FQDN: &str = "_acme-challenge.example.com.";

/// 常用测试命名空间
pub const TEST_NAMESPACE: &str = "certs";

/// 测试用 API 组名
pub const TEST_GROUP_NAME: &str = "acme.example.com";

/// 测试用求解器名称
pub const TEST_SOLVER_NAME: &str = "dnsentry";

/// 初始化测试日志系统
pub fn init_test_logger() {
    let _ = init_logger(LogConfig {
        level: LogLevel::Debug,
        output: LogOutput::Terminal,
        ..Default::default()
    });
}

/// 进程级测试身份
pub fn test_identity() -> &'static SolverIdentity {
    init_identity(SolverIdentity::new(TEST_GROUP_NAME, TEST_SOLVER_NAME)).expect("无法初始化求解器身份")
}

/// 创建 Present 请求
pub fn present_request(fqdn: &str, key: &str) -> ChallengeRequest {
    ChallengeRequest::new(ChallengeAction::Present, fqdn, key, TEST_NAMESPACE)
}

/// 创建 CleanUp 请求
pub fn cleanup_request(fqdn: &str, key: &str) -> ChallengeRequest {
    ChallengeRequest::new(ChallengeAction::CleanUp, fqdn, key, TEST_NAMESPACE)
}

/// 为请求附加 JSON 配置
pub fn with_config(request: ChallengeRequest, config: serde_json::Value) -> ChallengeRequest {
    request.with_config(ConfigBlob::from_value(&config))
}

/// 创建使用内存存储的求解器
pub fn memory_solver() -> (DnsEntrySolver, Arc<MemoryDnsEntryStore>) {
    let store = Arc::new(MemoryDnsEntryStore::new());
    let solver = DnsEntrySolver::with_store(test_identity(), store.clone());
    (solver, store)
}
