//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat, ProbeKind};
use crate::config::{validate_config, Config, ConfigLoader, TomlConfigLoader};
use crate::error::{ConfigError, Result};
use crate::model::Service;
use crate::notification::{LogSender, NotificationQueue};
use crate::probe::{HttpProber, ProbeReport, Prober, RawIcmpProber, SystemPingProber};
use crate::scheduler::{build_prober_registry, CheckScheduler};
use crate::storage::PgJobStore;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// 配置文件模板
const CONFIG_TEMPLATE: &str = include_str!("../../templates/config.toml");

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 加载并验证配置文件
async fn load_config(path: &Path) -> Result<Config> {
    let loader = TomlConfigLoader::new(true);
    loader.load_from_file(path).await
}

/// 运行命令
pub struct RunCommand;

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Run { workers } = &args.command else {
            return Ok(());
        };

        let config_path = args.get_config_path();
        let mut config = load_config(&config_path).await?;
        if let Some(workers) = workers {
            config.scheduler.workers = *workers;
            validate_config(&config).map_err(ConfigError::ValidationError)?;
        }

        info!("正在连接数据库...");
        let store = PgJobStore::connect(&config.database).await?;
        if config.database.run_migrations {
            store.migrate().await?;
        }

        let (queue, dispatcher) = NotificationQueue::channel();
        let notifier = tokio::spawn(dispatcher.with_default_sender(Arc::new(LogSender)).run());

        let probers = build_prober_registry(config.scheduler.icmp_mode);
        let mut scheduler = CheckScheduler::new(
            config.scheduler.clone(),
            Arc::new(store),
            probers,
            Arc::new(queue),
        );
        scheduler.start()?;

        info!("服务已在前台运行，按 Ctrl+C 停止");
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("监听退出信号失败: {}", e);
        }
        info!("收到退出信号");

        scheduler.shutdown().await;
        // 调度器持有的队列发送端释放后，通知分发器会处理完剩余通知再退出
        drop(scheduler);
        if let Err(e) = notifier.await {
            warn!("通知分发器异常退出: {}", e);
        }

        info!("服务已停止");
        Ok(())
    }
}

/// 数据库迁移命令
pub struct MigrateCommand;

#[async_trait]
impl Command for MigrateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config = load_config(&args.get_config_path()).await?;
        let store = PgJobStore::connect(&config.database).await?;
        store.migrate().await?;
        println!("✓ 数据库迁移完成");
        Ok(())
    }
}

/// 单次探测命令
pub struct ProbeCommand;

#[async_trait]
impl Command for ProbeCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Probe {
            kind,
            endpoint,
            method,
            timeout,
            headers,
            body,
            expected_status,
            expected_body,
            no_follow_redirects,
            insecure,
            raw_icmp,
        } = &args.command
        else {
            return Ok(());
        };

        let mut service = match kind {
            ProbeKind::Http => Service::http("cli-probe", endpoint.as_str()),
            ProbeKind::Icmp => Service::icmp("cli-probe", endpoint.as_str()),
        };
        service.http_method = method.to_uppercase();
        service.request_timeout_seconds = *timeout;
        service.http_headers = headers.clone();
        service.http_body = body.clone();
        service.expected_status_code = *expected_status;
        service.expected_response_body = expected_body.clone();
        service.follow_redirects = !no_follow_redirects;
        service.verify_ssl = !insecure;
        service.validate().map_err(ConfigError::ValidationError)?;

        let prober: Box<dyn Prober> = match (kind, raw_icmp) {
            (ProbeKind::Http, _) => Box::new(HttpProber::new()),
            (ProbeKind::Icmp, true) => Box::new(RawIcmpProber::new()),
            (ProbeKind::Icmp, false) => Box::new(SystemPingProber::new()),
        };

        let report = prober.probe(&service).await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&report_json(&service, &report))?
        );
        Ok(())
    }
}

/// 把探测结果转换为 JSON 输出
fn report_json(service: &Service, report: &ProbeReport) -> serde_json::Value {
    serde_json::json!({
        "type": service.service_type.as_str(),
        "endpoint": service.endpoint,
        "failed": report.is_failure(),
        "latency_ms": report.check.latency_ms,
        "reason": report.reason(),
        "checked_at": report.check.created_at.to_rfc3339(),
    })
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 创建配置文件
    ///
    /// # 参数
    /// * `config_path` - 目标路径
    /// * `force` - 是否覆盖现有文件
    pub async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(config_path, CONFIG_TEMPLATE).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请编辑配置文件中的数据库连接信息");

        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        else {
            return Ok(());
        };

        let path = config_path
            .clone()
            .unwrap_or_else(|| args.get_config_path());
        println!("正在验证配置文件: {}", path.display());

        let config = load_config(&path).await?;
        println!("✓ 配置文件验证通过");

        if *verbose {
            let scheduler = &config.scheduler;
            println!();
            println!("调度器:");
            println!("  启用: {}", scheduler.enabled);
            println!("  工作者数量: {}", scheduler.workers);
            println!("  队列容量: {}", scheduler.queue_capacity);
            println!("  查询超时: {}s", scheduler.due_query_timeout_seconds);
            println!("  任务超时: {}s", scheduler.job_timeout_seconds);
            println!("  ICMP 模式: {:?}", scheduler.icmp_mode);
            println!("数据库:");
            println!("  最大连接数: {}", config.database.max_connections);
            println!("  自动迁移: {}", config.database.run_migrations);
            println!("日志:");
            println!("  级别: {}", config.logging.level);
            println!("  JSON: {}", config.logging.json);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceType;
    use clap::Parser;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_writes_loadable_template() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");

        InitCommand.create_config_file(&path, false).await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, CONFIG_TEMPLATE);

        // 模板里的 ${DATABASE_URL} 不做替换时也必须是合法配置
        let config = TomlConfigLoader::new(false)
            .load_from_string(&content)
            .await
            .unwrap();
        assert!(config.scheduler.enabled);
        assert_eq!(config.scheduler.workers, 5);
    }

    #[tokio::test]
    async fn test_init_does_not_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "keep me").unwrap();

        InitCommand.create_config_file(&path, false).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");

        InitCommand.create_config_file(&path, true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), CONFIG_TEMPLATE);
    }

    #[tokio::test]
    async fn test_validate_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let args = Args::try_parse_from([
            "probe-scheduler",
            "validate",
            missing.to_str().unwrap(),
        ])
        .unwrap();

        assert!(ValidateCommand.execute(&args).await.is_err());
    }

    #[tokio::test]
    async fn test_probe_rejects_invalid_timeout() {
        let args = Args::try_parse_from([
            "probe-scheduler",
            "probe",
            "http",
            "https://example.com",
            "--timeout",
            "0",
        ])
        .unwrap();

        assert!(ProbeCommand.execute(&args).await.is_err());
    }

    #[tokio::test]
    async fn test_probe_http_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let url = format!("{}/health", server.url());
        let args = Args::try_parse_from(["probe-scheduler", "probe", "http", url.as_str()]).unwrap();

        ProbeCommand.execute(&args).await.unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn test_report_json_shape() {
        let service = Service::icmp("cli-probe", "10.0.0.1");
        let report = ProbeReport::failure(service.id, "Host unreachable");
        let value = report_json(&service, &report);

        assert_eq!(value["type"], ServiceType::IcmpPing.as_str());
        assert_eq!(value["failed"], true);
        assert_eq!(value["latency_ms"], 0);
        assert_eq!(value["reason"], "Host unreachable");
    }
}
