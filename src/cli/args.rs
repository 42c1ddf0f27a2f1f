//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Probe Scheduler - 端点探测调度引擎
#[derive(Parser, Debug, Clone)]
#[command(
    name = "probe-scheduler",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "PROBE_SCHEDULER_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，优先于配置文件
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "PROBE_SCHEDULER_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 在前台运行调度引擎，Ctrl+C 优雅退出
    Run {
        /// 工作者数量
        #[arg(
            short,
            long,
            value_name = "COUNT",
            help = "工作者数量",
            env = "PROBE_SCHEDULER_WORKERS"
        )]
        workers: Option<usize>,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 执行数据库迁移
    Migrate,

    /// 对单个端点执行一次探测
    Probe {
        /// 探测类型
        #[arg(value_enum, help = "探测类型")]
        kind: ProbeKind,

        /// 端点（HTTP 为 URL，ICMP 为主机名或 IP）
        #[arg(value_name = "ENDPOINT", help = "探测端点")]
        endpoint: String,

        /// HTTP方法
        #[arg(short, long, default_value = "GET", help = "HTTP方法")]
        method: String,

        /// 请求超时（秒）
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            default_value = "10",
            help = "请求超时（秒）"
        )]
        timeout: i32,

        /// 请求头，格式为 key:value;key:value
        #[arg(long, default_value = "", help = "请求头")]
        headers: String,

        /// 请求体
        #[arg(long, default_value = "", help = "请求体")]
        body: String,

        /// 期望的状态码
        #[arg(long, default_value = "200", help = "期望的状态码")]
        expected_status: u16,

        /// 期望的响应体正则表达式
        #[arg(long, default_value = "", help = "期望的响应体正则表达式")]
        expected_body: String,

        /// 不跟随重定向
        #[arg(long, help = "不跟随重定向")]
        no_follow_redirects: bool,

        /// 不校验 TLS 证书
        #[arg(short = 'k', long, help = "不校验 TLS 证书")]
        insecure: bool,

        /// 使用原始 ICMP 套接字代替系统 ping
        #[arg(long, help = "使用原始 ICMP 套接字")]
        raw_icmp: bool,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = "config.toml"
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 探测类型
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum ProbeKind {
    /// HTTP/HTTPS
    Http,
    /// ICMP ping
    Icmp,
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::get_default_config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let args = Args::try_parse_from([
            "probe-scheduler",
            "--config",
            "/etc/probe.toml",
            "--log-level",
            "debug",
            "run",
            "--workers",
            "3",
        ])
        .unwrap();

        assert_eq!(args.get_config_path(), PathBuf::from("/etc/probe.toml"));
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert!(matches!(args.command, Commands::Run { workers: Some(3) }));
    }

    #[test]
    fn test_parse_probe() {
        let args = Args::try_parse_from([
            "probe-scheduler",
            "probe",
            "http",
            "https://example.com/health",
            "--headers",
            "X-Foo:bar;Y:2",
            "--expected-status",
            "204",
            "-k",
        ])
        .unwrap();

        match args.command {
            Commands::Probe {
                kind,
                endpoint,
                headers,
                expected_status,
                insecure,
                no_follow_redirects,
                ..
            } => {
                assert_eq!(kind, ProbeKind::Http);
                assert_eq!(endpoint, "https://example.com/health");
                assert_eq!(headers, "X-Foo:bar;Y:2");
                assert_eq!(expected_status, 204);
                assert!(insecure);
                assert!(!no_follow_redirects);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(log::LevelFilter::from(LogLevel::Warn), log::LevelFilter::Warn);
    }
}
