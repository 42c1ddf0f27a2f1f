//! 通知模块
//!
//! 提供通知防抖判断、通知队列和发送器

pub mod debounce;
pub mod queue;
pub mod sender;

// 重新导出主要类型
pub use debounce::{should_notify_down, should_notify_up};
pub use queue::{NotificationDispatcher, NotificationQueue, NotificationSink};
pub use sender::{LogSender, NoOpSender, NotificationSender};
