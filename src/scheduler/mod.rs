//! 调度模块
//!
//! 到期任务分发器、有界工作池、任务事务编排器和调度引擎

pub mod dispatcher;
pub mod engine;
pub mod orchestrator;
pub mod stats;
pub mod worker;

// 重新导出主要类型
pub use dispatcher::{dispatch_due_jobs, Dispatcher, DISPATCH_INTERVAL};
pub use engine::{build_prober_registry, CheckScheduler};
pub use orchestrator::{JobOrchestrator, JobOutcome};
pub use stats::{SchedulerStats, StatsSnapshot};
pub use worker::WorkerPool;
