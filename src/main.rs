//! Probe Scheduler 主程序入口
//!
//! 数据库驱动的端点探测调度器

use anyhow::{Context, Result};
use clap::Parser;
use probe_scheduler::cli::args::{Args, Commands};
use probe_scheduler::cli::commands::{
    Command, InitCommand, MigrateCommand, ProbeCommand, RunCommand, ValidateCommand,
    VersionCommand,
};
use probe_scheduler::config::{ConfigLoader, LoggingConfig, TomlConfigLoader};
use probe_scheduler::logging::{LogConfig, LoggingSystem};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统，命令行级别优先于配置文件
    let logging = load_logging_config(&args).await;
    let log_config = LogConfig::from_config(&logging, args.log_level.map(Into::into));
    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    debug!("{} v{} 启动", probe_scheduler::APP_NAME, probe_scheduler::VERSION);

    if let Err(e) = execute_command(&args).await {
        error!("命令执行失败: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 读取配置文件中的日志配置
///
/// 只有需要配置文件的命令才读取；文件不存在或无效时使用默认日志配置，
/// 具体错误由命令本身报告
async fn load_logging_config(args: &Args) -> LoggingConfig {
    if !matches!(args.command, Commands::Run { .. } | Commands::Migrate) {
        return LoggingConfig::default();
    }

    let config_path = args.get_config_path();
    if !config_path.exists() {
        return LoggingConfig::default();
    }

    TomlConfigLoader::new(true)
        .load_from_file(&config_path)
        .await
        .map(|config| config.logging)
        .unwrap_or_default()
}

/// 执行CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    let command: Box<dyn Command> = match &args.command {
        Commands::Run { .. } => {
            info!("配置文件: {}", args.get_config_path().display());
            Box::new(RunCommand)
        }
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::Migrate => Box::new(MigrateCommand),
        Commands::Probe { .. } => Box::new(ProbeCommand),
        Commands::Init { .. } => Box::new(InitCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    };

    let result = command.execute(args).await;
    match &args.command {
        Commands::Run { .. } | Commands::Migrate => result.with_context(|| {
            format!(
                "配置文件: {}，可运行 '{} init' 创建默认配置文件",
                args.get_config_path().display(),
                probe_scheduler::APP_NAME
            )
        }),
        _ => Ok(result?),
    }
}
