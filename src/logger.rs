//! ACME DNSEntry 求解器日志系统
//! 基于 rat_logger 的日志系统，提供统一的日志接口和配置
//!
//! 作为库使用时不主动初始化日志系统，由调用者负责；
//! 作为独立应用使用时由 main 函数根据配置初始化。

use crate::app_error;
use crate::error::{AppError, AppResult};
use rat_logger::config::FileConfig;
use rat_logger::handler::term::TermConfig;
use rat_logger::{ColorConfig, FormatConfig, LevelFilter, LevelStyle, LoggerBuilder};
use std::path::PathBuf;
use std::str::FromStr;

/// 日志级别映射
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(app_error!(Config, "无效的日志级别: {}", other)),
        }
    }
}

/// 日志输出类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// 终端输出
    Terminal,
    /// 文件输出（同时保留终端输出）
    File {
        log_dir: PathBuf,
        max_file_size: u64,
        max_compressed_files: u32,
    },
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub enabled: bool,
    pub level: LogLevel,
    pub output: LogOutput,
    pub use_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            enabled: true,
            level: LogLevel::Info,
            output: LogOutput::Terminal,
            use_colors: true,
        }
    }
}

impl LogConfig {
    /// 创建禁用日志的配置
    pub fn disabled() -> Self {
        LogConfig {
            enabled: false,
            ..Default::default()
        }
    }

    /// 创建文件日志配置
    pub fn file<P: Into<PathBuf>>(log_dir: P) -> Self {
        LogConfig {
            enabled: true,
            level: LogLevel::Info,
            output: LogOutput::File {
                log_dir: log_dir.into(),
                max_file_size: 10 * 1024 * 1024, // 10MB
                max_compressed_files: 5,
            },
            use_colors: false,
        }
    }

    /// 设置日志级别
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}

fn level_style() -> LevelStyle {
    LevelStyle {
        error: "ERROR".to_string(),
        warn: "WARN ".to_string(),
        info: "INFO ".to_string(),
        debug: "DEBUG".to_string(),
        trace: "TRACE".to_string(),
    }
}

/// 日志管理器
pub struct LogManager {
    config: LogConfig,
}

impl LogManager {
    /// 创建新的日志管理器
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }

    /// 初始化日志系统
    pub fn initialize(&self) -> AppResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let format_config = FormatConfig {
            timestamp_format: "%H:%M:%S%.3f".to_string(),
            level_style: level_style(),
            format_template: "{timestamp} [{level}] [DNSENTRY] {message}".to_string(),
        };

        let color_config = if self.config.use_colors {
            Some(ColorConfig {
                error: "\x1b[91m".to_string(),
                warn: "\x1b[93m".to_string(),
                info: "\x1b[92m".to_string(),
                debug: "\x1b[96m".to_string(),
                trace: "\x1b[95m".to_string(),
                timestamp: "\x1b[90m".to_string(),
                target: "\x1b[94m".to_string(),
                file: "\x1b[95m".to_string(),
                message: "\x1b[97m".to_string(),
            })
        } else {
            None
        };

        let term_config = TermConfig {
            enable_color: self.config.use_colors,
            format: Some(format_config),
            color: color_config,
        };

        let mut builder = LoggerBuilder::new()
            .with_level(LevelFilter::from(self.config.level))
            .add_terminal_with_config(term_config);

        if let LogOutput::File {
            log_dir,
            max_file_size,
            max_compressed_files,
        } = &self.config.output
        {
            let file_config = FileConfig {
                log_dir: log_dir.clone(),
                max_file_size: *max_file_size,
                max_compressed_files: *max_compressed_files as usize,
                compression_level: 4,
                min_compress_threads: 2,
                skip_server_logs: false,
                is_raw: false,
                compress_on_drop: false,
                force_sync: true,
                format: Some(FormatConfig {
                    timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                    level_style: level_style(),
                    format_template: "[{timestamp}] [{level}] [DNSENTRY] {message}".to_string(),
                }),
            };
            builder = builder.add_file(file_config);
        }

        builder
            .init()
            .map_err(|e| app_error!(Logging, "日志初始化失败: {}", e))?;

        Ok(())
    }

    /// 获取配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }
}

/// 便捷的初始化函数
pub fn init_logger(config: LogConfig) -> AppResult<()> {
    LogManager::new(config).initialize()
}

// ============================================================================
// 求解器日志宏
// 调用方传入 `[名称|命名空间]` 前缀，便于按挑战检索
// ============================================================================

#[macro_export]
macro_rules! solver_info {
    ($($arg:tt)*) => {
        rat_logger::info!($($arg)*);
    };
}

#[macro_export]
macro_rules! solver_warn {
    ($($arg:tt)*) => {
        rat_logger::warn!($($arg)*);
    };
}

#[macro_export]
macro_rules! solver_error {
    ($($arg:tt)*) => {
        rat_logger::error!($($arg)*);
    };
}

/// 调试日志，仅在 debug 构建中输出
///
/// release 构建中参数仍参与类型检查，但不会被格式化。
#[macro_export]
macro_rules! solver_debug {
    ($($arg:tt)*) => {
        #[cfg(debug_assertions)]
        rat_logger::debug!($($arg)*);
        #[cfg(not(debug_assertions))]
        {
            let _ = format_args!($($arg)*);
        }
    };
}
