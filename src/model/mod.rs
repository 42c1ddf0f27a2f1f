//! 数据模型模块
//!
//! 定义服务定义、调度任务、检测记录、失败记录和通知消息

pub mod record;
pub mod service;

// 重新导出主要类型
pub use record::{Check, Failure, Job, Notification};
pub use service::{Service, ServiceType};
