//! 调度统计

use crate::scheduler::orchestrator::JobOutcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// 调度统计计数器
#[derive(Debug, Default)]
pub struct SchedulerStats {
    dispatched: AtomicU64,
    checked: AtomicU64,
    failed_checks: AtomicU64,
    notifications: AtomicU64,
    skipped: AtomicU64,
    not_due: AtomicU64,
    errored: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// 分发到队列的任务数
    pub dispatched: u64,
    /// 完成探测的任务数
    pub checked: u64,
    /// 其中检测失败的数量
    pub failed_checks: u64,
    /// 投递的通知数
    pub notifications: u64,
    /// 因服务类型未知跳过的任务数
    pub skipped: u64,
    /// 锁定时已不再到期的任务数
    pub not_due: u64,
    /// 出错回滚的任务数
    pub errored: u64,
}

impl SchedulerStats {
    /// 记录分发数量
    pub fn record_dispatched(&self, count: usize) {
        self.dispatched
            .fetch_add(u64::try_from(count).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// 记录单个任务的处理结果，`None` 表示出错回滚
    pub fn record_outcome(&self, outcome: Option<JobOutcome>) {
        let counter = match outcome {
            Some(JobOutcome::Checked { failed, notified }) => {
                if failed {
                    self.failed_checks.fetch_add(1, Ordering::Relaxed);
                }
                if notified {
                    self.notifications.fetch_add(1, Ordering::Relaxed);
                }
                &self.checked
            }
            Some(JobOutcome::Skipped) => &self.skipped,
            Some(JobOutcome::NotDue) => &self.not_due,
            None => &self.errored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 读取当前统计
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            checked: self.checked.load(Ordering::Relaxed),
            failed_checks: self.failed_checks.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            not_due: self.not_due.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
        }
    }
}
