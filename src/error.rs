//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;
use uuid::Uuid;

/// Probe Scheduler 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 存储相关错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    /// 探测器执行错误
    #[error("探测执行错误: {0}")]
    Probe(#[from] ProbeError),

    /// 操作超时
    #[error("{operation} 超时 ({seconds}s)")]
    Timeout { operation: &'static str, seconds: u64 },

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// 数据库错误（连接、锁冲突、SQL 执行失败等）
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    /// 数据库迁移失败
    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// 任务不存在
    #[error("任务不存在: {0}")]
    JobNotFound(Uuid),

    /// 服务不存在
    #[error("服务不存在: {0}")]
    ServiceNotFound(Uuid),

    /// 存储中的数据不合法
    #[error("数据不合法: {0}")]
    Malformed(String),

    /// 存储暂时不可用
    #[error("存储不可用: {0}")]
    Unavailable(String),
}

/// 探测器执行错误类型
///
/// 只用于无法发起探测的情况；目标不可达等探测结果用失败的 Check 表示。
#[derive(Error, Debug)]
pub enum ProbeError {
    /// 无效的HTTP方法
    #[error("无效的HTTP方法: {0}")]
    InvalidMethod(String),

    /// 无效的端点地址
    #[error("无效的端点地址 {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// HTTP客户端构建失败
    #[error("HTTP客户端构建失败: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// ping 命令不可用
    #[error("ping 命令不可用: {0}")]
    PingUnavailable(String),

    /// 原始 ICMP 套接字不可用（通常是权限不足）
    #[error("ICMP 套接字不可用: {0}")]
    IcmpUnavailable(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, SchedulerError>;
