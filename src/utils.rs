//! 辅助工具函数
//!
//! 包含日志初始化、配置加载、挑战读取、版本信息显示等辅助功能

use crate::cli::Cli;
use acme_dnsentry::challenge::ChallengeRequest;
use acme_dnsentry::config::{load_config, AppConfig, CliArgs, LoggingConfig};
use acme_dnsentry::error::AppResult;
use acme_dnsentry::logger::init_logger;
use rat_logger::info;
use std::io::Read;
use std::path::Path;

/// 由命令行参数构造配置覆盖项
pub fn cli_args(cli: &Cli) -> CliArgs {
    CliArgs {
        group_name: cli.group_name.clone(),
        solver_name: cli.solver_name.clone(),
        kubeconfig: cli.kubeconfig.clone(),
        context: cli.context.clone(),
        log_level: cli.verbose.then(|| "debug".to_string()),
        log_output: cli.log_output.map(|output| output.as_str().to_string()),
        log_dir: cli.log_dir.clone(),
    }
}

/// 加载配置：配置文件 < 环境变量 < 命令行
pub fn load_app_config(cli: &Cli) -> AppResult<AppConfig> {
    load_config(cli.config.clone(), Some(&cli_args(cli)))
}

/// 初始化日志系统
pub fn init_logging(logging: &LoggingConfig) -> AppResult<()> {
    init_logger(logging.to_log_config()?)
}

/// 读取挑战请求，`-` 表示标准输入
pub fn read_challenge(path: &Path) -> AppResult<ChallengeRequest> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };
    ChallengeRequest::from_json(&content)
}

/// 显示版本信息
pub fn show_version_info() {
    info!("acme-dnsentry v{}", env!("CARGO_PKG_VERSION"));
    if let Some(git_hash) = option_env!("GIT_HASH") {
        info!("Git 提交: {}", git_hash);
    }
    info!("目标平台: {}", std::env::consts::ARCH);
}

/// 格式化错误信息（包含错误链）
pub fn format_error(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(err) = source {
        message.push_str(&format!("\n  原因: {}", err));
        source = err.source();
    }

    message
}

/// 安全地显示令牌（隐藏敏感部分）
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 8 {
        return "***".to_string();
    }
    let head: String = token.chars().take(4).collect();
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{}***{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("short"), "***");
        assert_eq!(mask_token("verylongtoken123456"), "very***3456");
        assert_eq!(mask_token("12345678"), "***");
        assert_eq!(mask_token("123456789"), "1234***6789");
        // 按字符截取，多字节字符不会落在切片边界上
        assert_eq!(mask_token("令牌令牌令牌令牌令牌"), "令牌令牌***令牌令牌");
        assert_eq!(mask_token("令牌令牌令牌令牌"), "***");
        assert_eq!(mask_token("ab令牌cdef令牌gh"), "ab令牌***令牌gh");
    }

    #[test]
    fn test_format_error_includes_sources() {
        let store = acme_dnsentry::error::StoreError::Http("连接被拒绝".to_string());
        let err = acme_dnsentry::error::SolverError::StoreDelete {
            name: "acme-challenge-1".to_string(),
            namespace: "certs".to_string(),
            source: store,
        };
        let formatted = format_error(&err);
        assert!(formatted.contains("acme-challenge-1"));
        assert!(formatted.contains("原因: HTTP 请求失败: 连接被拒绝"));
    }

    #[test]
    fn test_cli_args_mapping() {
        let cli = Cli::parse_from([
            "acme-dnsentry",
            "-v",
            "--group-name",
            "acme.example.com",
            "--log-output",
            "file",
            "check-config",
        ]);
        let args = cli_args(&cli);
        assert_eq!(args.group_name.as_deref(), Some("acme.example.com"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.log_output.as_deref(), Some("file"));
        assert!(args.solver_name.is_none());
    }

    #[test]
    fn test_read_challenge_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("challenge.json");
        std::fs::write(
            &path,
            r#"{"action":"Present","key":"abc","resolvedFQDN":"_acme-challenge.example.com.","resourceNamespace":"certs"}"#,
        )
        .unwrap();

        let request = read_challenge(&path).unwrap();
        assert_eq!(request.key, "abc");
        assert!(read_challenge(&dir.path().join("missing.json")).is_err());
    }
}
