//! acme-dnsentry 命令行工具
//!
//! 在命令行上驱动 DNSEntry 求解器：发布、清理、按请求分发挑战，
//! 以及查看派生名称、期望对象和集群中的当前对象。

mod cli;
mod commands;
mod utils;

use clap::{CommandFactory, Parser};

use acme_dnsentry::config::{init_identity, SolverIdentity};
use cli::{Cli, Commands};
use rat_logger::error;
use utils::{format_error, init_logging, load_app_config, show_version_info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 如果没有提供子命令，显示帮助信息并正常退出
    let command = match cli.command.clone() {
        Some(cmd) => cmd,
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            return Ok(());
        }
    };

    // 名称派生不依赖任何配置
    if let Commands::Name { fqdn, key } = &command {
        commands::cmd_name(fqdn, key);
        return Ok(());
    }

    let config = match load_app_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ 配置加载失败: {}", format_error(&e));
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("❌ 日志初始化失败: {}", e);
        std::process::exit(1);
    }

    if cli.verbose {
        show_version_info();
    }

    let identity = match init_identity(SolverIdentity::from(&config.solver)) {
        Ok(identity) => identity,
        Err(e) => {
            error!("求解器身份初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    let result = match command {
        Commands::Present(args) => commands::cmd_present(&config, identity, args).await,
        Commands::Cleanup(args) => commands::cmd_cleanup(&config, identity, args).await,
        Commands::Solve(args) => commands::cmd_solve(&config, identity, args).await,
        Commands::Render { challenge } => commands::cmd_render(identity, &challenge),
        Commands::Show { challenge } => commands::cmd_show(&config, identity, &challenge).await,
        Commands::CheckConfig => commands::cmd_check_config(&config, identity),
        Commands::Name { .. } => Ok(()),
    };

    // 处理执行结果
    if let Err(e) = result {
        let formatted_error = format_error(&e);
        error!("命令执行失败: {}", formatted_error);
        eprintln!("❌ 错误: {}", formatted_error);
        std::process::exit(1);
    }

    Ok(())
}
