//! 配置管理模块
//! 处理求解器的配置文件、环境变量和命令行参数，以及进程级求解器身份

use crate::app_error;
use crate::error::{AppError, AppResult, SolverError, SolverResult};
use crate::logger::{LogConfig, LogLevel, LogOutput};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// 求解器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 求解器身份
    pub solver: SolverSettings,
    /// 集群访问
    pub kubernetes: KubernetesConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 求解器身份设置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// webhook 注册的 API 组名
    pub group_name: String,
    /// 颁发者引用的求解器名称
    pub solver_name: String,
}

/// 集群访问配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// 显式指定的 API 服务器地址，优先于其他来源
    pub api_server: Option<String>,
    /// 显式指定的令牌文件
    pub token_file: Option<PathBuf>,
    /// 显式指定的 CA 证书文件
    pub ca_file: Option<PathBuf>,
    /// kubeconfig 文件路径
    pub kubeconfig: Option<PathBuf>,
    /// kubeconfig 上下文
    pub context: Option<String>,
    /// 跳过 TLS 校验
    pub insecure_skip_tls_verify: bool,
    /// 请求超时时间（秒）
    pub timeout_seconds: u64,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            api_server: None,
            token_file: None,
            ca_file: None,
            kubeconfig: None,
            context: None,
            insecure_skip_tls_verify: false,
            timeout_seconds: crate::auth::DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 输出类型: terminal, file
    pub output: String,
    /// 文件输出目录
    pub log_dir: Option<PathBuf>,
    /// 终端彩色输出
    pub colored: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "terminal".to_string(),
            log_dir: None,
            colored: true,
        }
    }
}

impl LoggingConfig {
    /// 转换为日志系统配置
    pub fn to_log_config(&self) -> AppResult<LogConfig> {
        let level: LogLevel = self.level.parse()?;
        let config = match self.output.as_str() {
            "terminal" | "console" => LogConfig {
                use_colors: self.colored,
                ..LogConfig::default()
            },
            "file" => {
                let log_dir = self
                    .log_dir
                    .clone()
                    .ok_or_else(|| AppError::Config("文件日志需要指定 log_dir".to_string()))?;
                LogConfig::file(log_dir)
            }
            other => {
                return Err(app_error!(Config, "不支持的日志输出类型: {}，可选: terminal, file", other))
            }
        };
        Ok(config.with_level(level))
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config_file: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new(config_file: PathBuf) -> Self {
        Self {
            config_file,
            config: AppConfig::default(),
        }
    }

    /// 从文件加载配置
    pub fn load_from_file(&mut self) -> AppResult<()> {
        if !self.config_file.exists() {
            return Err(app_error!(Config, "配置文件不存在: {}", self.config_file.display()));
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| app_error!(Config, "读取配置文件失败: {}", e))?;

        self.config = self.parse_config(&content)?;
        Ok(())
    }

    /// 按扩展名解析配置内容
    fn parse_config(&self, content: &str) -> AppResult<AppConfig> {
        let extension = self
            .config_file
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("toml");

        match extension {
            "toml" => toml::from_str(content)
                .map_err(|e| app_error!(Config, "TOML 配置解析失败: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(content)
                .map_err(|e| app_error!(Config, "YAML 配置解析失败: {}", e)),
            "json" => serde_json::from_str(content)
                .map_err(|e| app_error!(Config, "JSON 配置解析失败: {}", e)),
            _ => Err(app_error!(Config, "不支持的配置文件格式: {}", extension)),
        }
    }

    /// 从进程环境变量加载配置
    pub fn load_from_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// 使用给定的查找函数覆盖配置
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(group_name) = lookup("GROUP_NAME") {
            self.config.solver.group_name = group_name;
        }
        if let Some(solver_name) = lookup("SOLVER_NAME") {
            self.config.solver.solver_name = solver_name;
        }
        if let Some(kubeconfig) = lookup("KUBECONFIG") {
            self.config.kubernetes.kubeconfig = Some(PathBuf::from(kubeconfig));
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.config.logging.level = log_level;
        }
    }

    /// 合并命令行参数
    pub fn merge_cli_args(&mut self, args: &CliArgs) {
        if let Some(group_name) = &args.group_name {
            self.config.solver.group_name = group_name.clone();
        }
        if let Some(solver_name) = &args.solver_name {
            self.config.solver.solver_name = solver_name.clone();
        }
        if let Some(kubeconfig) = &args.kubeconfig {
            self.config.kubernetes.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(context) = &args.context {
            self.config.kubernetes.context = Some(context.clone());
        }
        if let Some(level) = &args.log_level {
            self.config.logging.level = level.clone();
        }
        if let Some(output) = &args.log_output {
            self.config.logging.output = output.clone();
        }
        if let Some(log_dir) = &args.log_dir {
            self.config.logging.log_dir = Some(log_dir.clone());
        }
    }

    /// 验证配置
    pub fn validate(&self) -> AppResult<()> {
        if self.config.solver.group_name.trim().is_empty() {
            return Err(AppError::Config(
                "必须指定 GROUP_NAME（配置 [solver] group_name、环境变量或 --group-name）"
                    .to_string(),
            ));
        }
        if self.config.solver.solver_name.trim().is_empty() {
            return Err(AppError::Config(
                "必须指定 SOLVER_NAME（配置 [solver] solver_name、环境变量或 --solver-name）"
                    .to_string(),
            ));
        }
        if self.config.kubernetes.timeout_seconds == 0 {
            return Err(AppError::Config("超时时间必须大于0".to_string()));
        }
        Ok(())
    }

    /// 获取配置
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取配置文件路径
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }
}

/// 命令行参数（用于配置合并）
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub group_name: Option<String>,
    pub solver_name: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub log_level: Option<String>,
    pub log_output: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// 默认配置文件路径
pub fn default_config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("acme-dnsentry")
        .join("config.toml")
}

/// 加载配置：文件 < 环境变量 < 命令行
///
/// 显式指定的配置文件必须存在；默认路径不存在时使用空配置。
pub fn load_config(config_file: Option<PathBuf>, cli_args: Option<&CliArgs>) -> AppResult<AppConfig> {
    let explicit = config_file.is_some();
    let mut manager = ConfigManager::new(config_file.unwrap_or_else(default_config_file));

    if explicit || manager.config_file().exists() {
        manager.load_from_file()?;
    }

    manager.load_from_env();

    if let Some(args) = cli_args {
        manager.merge_cli_args(args);
    }

    manager.validate()?;
    Ok(manager.config().clone())
}

// ============================================================================
// 进程级求解器身份
// ============================================================================

/// 求解器身份：API 组名与求解器名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverIdentity {
    pub group_name: String,
    pub solver_name: String,
}

impl SolverIdentity {
    pub fn new(group_name: impl Into<String>, solver_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            solver_name: solver_name.into(),
        }
    }
}

impl From<&SolverSettings> for SolverIdentity {
    fn from(settings: &SolverSettings) -> Self {
        Self::new(settings.group_name.trim(), settings.solver_name.trim())
    }
}

static IDENTITY: OnceLock<SolverIdentity> = OnceLock::new();

/// 发布进程级求解器身份
///
/// 只能设置一次；以相同的值重复调用返回已发布的身份，值不同则报错。
pub fn init_identity(identity: SolverIdentity) -> SolverResult<&'static SolverIdentity> {
    if identity.group_name.is_empty() || identity.solver_name.is_empty() {
        return Err(SolverError::Initialization(
            "GROUP_NAME 与 SOLVER_NAME 不能为空".to_string(),
        ));
    }

    let published = IDENTITY.get_or_init(|| identity.clone());
    if *published != identity {
        return Err(SolverError::Initialization(format!(
            "求解器身份已初始化为 {}/{}，不能改为 {}/{}",
            published.group_name, published.solver_name, identity.group_name, identity.solver_name
        )));
    }
    Ok(published)
}

/// 获取已发布的求解器身份
pub fn identity() -> Option<&'static SolverIdentity> {
    IDENTITY.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn manager_with(file: &str, content: &str) -> (tempfile::TempDir, ConfigManager) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(file);
        fs::write(&path, content).unwrap();
        let mut manager = ConfigManager::new(path);
        manager.load_from_file().unwrap();
        (dir, manager)
    }

    #[test]
    fn test_load_toml() {
        let (_dir, manager) = manager_with(
            "config.toml",
            r#"
[solver]
group_name = "acme.example.com"
solver_name = "dnsentry"

[kubernetes]
kubeconfig = "/etc/acme/kubeconfig"
timeout_seconds = 10
"#,
        );
        let config = manager.config();
        assert_eq!(config.solver.group_name, "acme.example.com");
        assert_eq!(config.kubernetes.timeout_seconds, 10);
        assert_eq!(config.logging.level, "info");
        assert!(manager.validate().is_ok());
    }

    #[test]
    fn test_load_yaml() {
        let (_dir, manager) = manager_with(
            "config.yaml",
            "solver:\n  group_name: acme.example.com\n  solver_name: dnsentry\nlogging:\n  level: debug\n",
        );
        assert_eq!(manager.config().solver.solver_name, "dnsentry");
        assert_eq!(manager.config().logging.level, "debug");
        assert_eq!(manager.config().kubernetes.timeout_seconds, 30);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "x=1").unwrap();
        let mut manager = ConfigManager::new(path);
        assert!(matches!(manager.load_from_file(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_precedence_file_env_cli() {
        let (_dir, mut manager) = manager_with(
            "config.toml",
            "[solver]\ngroup_name = \"from-file\"\nsolver_name = \"file-solver\"\n",
        );

        let env: HashMap<&str, &str> = [("GROUP_NAME", "from-env"), ("SOLVER_NAME", "")]
            .into_iter()
            .collect();
        manager.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(manager.config().solver.group_name, "from-env");
        assert_eq!(manager.config().solver.solver_name, "file-solver");

        manager.merge_cli_args(&CliArgs {
            group_name: Some("from-cli".to_string()),
            context: Some("lab".to_string()),
            ..Default::default()
        });
        assert_eq!(manager.config().solver.group_name, "from-cli");
        assert_eq!(manager.config().kubernetes.context.as_deref(), Some("lab"));
    }

    #[test]
    fn test_missing_identity_is_rejected() {
        let manager = ConfigManager::new(PathBuf::from("unused.toml"));
        let err = manager.validate().unwrap_err();
        assert!(err.to_string().contains("GROUP_NAME"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(dir.path().join("absent.toml")), None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_logging_conversion() {
        let logging = LoggingConfig {
            level: "warn".to_string(),
            output: "file".to_string(),
            log_dir: Some(PathBuf::from("/tmp/logs")),
            colored: true,
        };
        let config = logging.to_log_config().unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert!(matches!(config.output, LogOutput::File { .. }));

        let missing_dir = LoggingConfig {
            output: "file".to_string(),
            ..Default::default()
        };
        assert!(missing_dir.to_log_config().is_err());
    }

    #[test]
    fn test_identity_is_set_once() {
        let first = init_identity(SolverIdentity::new("acme.example.com", "dnsentry")).unwrap();
        assert_eq!(first.solver_name, "dnsentry");

        let again = init_identity(SolverIdentity::new("acme.example.com", "dnsentry")).unwrap();
        assert!(std::ptr::eq(first, again));
        assert_eq!(identity(), Some(first));

        let err = init_identity(SolverIdentity::new("other.example.com", "dnsentry")).unwrap_err();
        assert!(matches!(err, SolverError::Initialization(_)));

        assert!(init_identity(SolverIdentity::new("", "dnsentry")).is_err());
    }
}
