//! Probe Scheduler - 端点探测调度引擎
//!
//! 定期探测已注册的网络端点（HTTP 或 ICMP），记录检测结果，并根据检测历史
//! 决定何时发出故障/恢复通知：
//! - 到期任务分发器与有界工作池
//! - 基于数据库行锁的任务事务（同一任务同一时刻只会被一个工作者执行）
//! - 可插拔的 HTTP / ICMP 探测器
//! - 基于检测历史的通知防抖逻辑
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notification;
pub mod probe;
pub mod scheduler;
pub mod storage;

// 重新导出主要类型
pub use config::{Config, SchedulerConfig};
pub use error::SchedulerError;
pub use model::{Check, Failure, Job, Notification, Service, ServiceType};
pub use scheduler::{CheckScheduler, JobOrchestrator, JobOutcome};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
