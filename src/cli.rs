//! 命令行接口定义模块
//!
//! 包含所有的 CLI 参数定义、子命令和相关的枚举类型

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ACME DNSEntry 求解器
#[derive(Parser, Debug)]
#[command(name = "acme-dnsentry")]
#[command(version = acme_dnsentry::VERSION)]
#[command(about = "通过 DNSEntry 资源应答 ACME DNS-01 挑战")]
#[command(long_about = "acme-dnsentry 为每个 DNS-01 挑战创建、更新和删除一个 dns.gardener.cloud/v1alpha1 DNSEntry 对象，由 DNS 控制器把它发布为真实的 TXT 记录。")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// 启用详细日志（调试级别）
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 日志输出类型
    #[arg(long, global = true, value_enum)]
    pub log_output: Option<LogOutputType>,

    /// 日志目录（使用文件输出时）
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// webhook 的 API 组名（覆盖 GROUP_NAME）
    #[arg(long, global = true)]
    pub group_name: Option<String>,

    /// 求解器名称（覆盖 SOLVER_NAME）
    #[arg(long, global = true)]
    pub solver_name: Option<String>,

    /// kubeconfig 文件路径（覆盖 KUBECONFIG）
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// kubeconfig 上下文
    #[arg(long, global = true)]
    pub context: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogOutputType {
    Terminal,
    File,
}

impl LogOutputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogOutputType::Terminal => "terminal",
            LogOutputType::File => "file",
        }
    }
}

/// 挑战输入参数
#[derive(Args, Debug, Clone)]
pub struct ChallengeArgs {
    /// 挑战请求文件（JSON，`-` 表示标准输入）
    #[arg(long, required = true)]
    pub challenge: PathBuf,

    /// 使用内存存储演练，不访问集群
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 发布挑战记录
    Present(ChallengeArgs),

    /// 清理挑战记录
    Cleanup(ChallengeArgs),

    /// 按请求中的 action 求解并输出 ChallengeResponse
    Solve(ChallengeArgs),

    /// 打印挑战对应的 DNSEntry 名称
    Name {
        /// 已解析的 FQDN（通常带尾点）
        #[arg(long, required = true)]
        fqdn: String,

        /// 挑战密钥
        #[arg(long, required = true)]
        key: String,
    },

    /// 以 YAML 输出挑战对应的期望 DNSEntry
    Render {
        /// 挑战请求文件（JSON，`-` 表示标准输入）
        #[arg(long, required = true)]
        challenge: PathBuf,
    },

    /// 读取挑战对应的 DNSEntry 当前状态
    Show {
        /// 挑战请求文件（JSON，`-` 表示标准输入）
        #[arg(long, required = true)]
        challenge: PathBuf,
    },

    /// 校验配置并显示求解器身份与集群地址
    CheckConfig,
}
