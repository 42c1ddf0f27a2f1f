//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 支持的日志级别
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 调度器配置
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// ICMP 探测方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcmpMode {
    /// 调用系统 ping 命令
    #[default]
    System,
    /// 原始 ICMP 套接字
    Raw,
}

/// 调度器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// 是否启用调度器
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 工作者数量
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// 任务队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// 到期任务查询超时（秒）
    #[serde(default = "default_due_query_timeout")]
    pub due_query_timeout_seconds: u64,
    /// 单个任务的执行超时（秒）
    #[serde(default = "default_job_timeout")]
    pub job_timeout_seconds: u64,
    /// ICMP 探测方式
    #[serde(default)]
    pub icmp_mode: IcmpMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            due_query_timeout_seconds: default_due_query_timeout(),
            job_timeout_seconds: default_job_timeout(),
            icmp_mode: IcmpMode::default(),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// 连接地址
    pub url: String,
    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// 获取连接的超时（秒）
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
    /// 启动时是否执行迁移
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
            run_migrations: default_run_migrations(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 是否使用JSON格式
    #[serde(default)]
    pub json: bool,
    /// 日志文件路径，未设置时输出到控制台
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

// 默认值函数
fn default_enabled() -> bool {
    true
}
fn default_workers() -> usize {
    5
}
fn default_queue_capacity() -> usize {
    1024
}
fn default_due_query_timeout() -> u64 {
    10
}
fn default_job_timeout() -> u64 {
    60
}
fn default_max_connections() -> u32 {
    10
}
fn default_acquire_timeout() -> u64 {
    10
}
fn default_run_migrations() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

/// 验证配置
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    let scheduler = &config.scheduler;

    if scheduler.workers == 0 {
        return Err("工作者数量必须大于0".to_string());
    }

    if scheduler.queue_capacity == 0 {
        return Err("任务队列容量必须大于0".to_string());
    }

    if scheduler.due_query_timeout_seconds == 0 {
        return Err("到期任务查询超时必须大于0".to_string());
    }

    if scheduler.job_timeout_seconds == 0 {
        return Err("任务执行超时必须大于0".to_string());
    }

    if config.database.url.trim().is_empty() {
        return Err("数据库连接地址不能为空".to_string());
    }

    if config.database.max_connections == 0 {
        return Err("数据库最大连接数必须大于0".to_string());
    }

    let level = config.logging.level.to_lowercase();
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.logging.level, VALID_LOG_LEVELS
        ));
    }

    Ok(())
}
