//! 任务事务编排器
//!
//! 对单个任务在一个存储事务内完成：锁定任务、加载服务、重新调度、
//! 探测、防抖判断、写入结果并提交。任何一步出错都整体回滚

use crate::error::{Result, SchedulerError};
use crate::model::{Check, Notification, Service};
use crate::notification::debounce::effective_threshold;
use crate::notification::{should_notify_down, should_notify_up, NotificationSink};
use crate::probe::{ProbeReport, ProberRegistry};
use crate::storage::{JobStore, JobTransaction};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 单个任务的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// 已执行探测并写入检测记录
    Checked {
        /// 本次检测是否失败
        failed: bool,
        /// 是否投递了通知
        notified: bool,
    },
    /// 服务类型没有对应的探测器，仅重新调度
    Skipped,
    /// 锁定时任务已被其他工作者处理过，尚未到期
    NotDue,
}

/// 任务事务编排器
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    probers: Arc<ProberRegistry>,
    notifications: Arc<dyn NotificationSink>,
    unit_timeout: Duration,
}

impl JobOrchestrator {
    /// 创建编排器
    ///
    /// # 参数
    /// * `store` - 任务存储
    /// * `probers` - 探测器注册表
    /// * `notifications` - 通知接收端
    /// * `unit_timeout` - 单个任务的执行超时
    pub fn new(
        store: Arc<dyn JobStore>,
        probers: Arc<ProberRegistry>,
        notifications: Arc<dyn NotificationSink>,
        unit_timeout: Duration,
    ) -> Self {
        Self {
            store,
            probers,
            notifications,
            unit_timeout,
        }
    }

    /// 处理单个任务并记录日志，不向调用方传播错误
    ///
    /// # 参数
    /// * `worker_id` - 工作者编号
    /// * `job_id` - 任务ID
    ///
    /// # 返回
    /// * `Option<JobOutcome>` - 处理结果，出错回滚时为 `None`
    pub async fn run_job(&self, worker_id: usize, job_id: Uuid) -> Option<JobOutcome> {
        match self.process(job_id).await {
            Ok(outcome) => {
                debug!(%job_id, worker_id, ?outcome, "任务处理完成");
                Some(outcome)
            }
            Err(e) => {
                error!(%job_id, worker_id, "任务处理失败，事务已回滚: {}", e);
                None
            }
        }
    }

    /// 在执行超时内处理单个任务
    ///
    /// 超时会丢弃进行中的事务，等同于回滚
    pub async fn process(&self, job_id: Uuid) -> Result<JobOutcome> {
        timeout(self.unit_timeout, self.execute(job_id))
            .await
            .map_err(|_| SchedulerError::Timeout {
                operation: "任务执行",
                seconds: self.unit_timeout.as_secs(),
            })?
    }

    async fn execute(&self, job_id: Uuid) -> Result<JobOutcome> {
        let mut tx = self.store.begin().await?;

        let job = tx.lock_job(job_id).await?;
        let now = Utc::now();
        if !job.is_due(now) {
            debug!(%job_id, "任务已被重新调度，跳过");
            tx.rollback().await?;
            return Ok(JobOutcome::NotDue);
        }

        let service = tx.load_service(job.service_id).await?;

        // 先推进执行时间再探测，探测挂起也不会导致任务被立即重新分发
        let next_execute_at = next_execute_at(now, &service);
        tx.update_execute_at(job.id, next_execute_at).await?;

        let Some(prober) = self.probers.get(&service.service_type) else {
            warn!(
                %job_id,
                service = %service.name,
                "不支持的服务类型 {}，跳过探测",
                service.service_type
            );
            tx.commit().await?;
            return Ok(JobOutcome::Skipped);
        };

        let report = prober.probe(&service).await?;
        let failed = report.is_failure();
        let notified = self.record(&mut *tx, &service, report).await?;

        tx.commit().await?;

        if failed {
            info!(%job_id, service = %service.name, "服务检测失败");
        } else {
            debug!(%job_id, service = %service.name, "服务检测正常");
        }

        Ok(JobOutcome::Checked { failed, notified })
    }

    /// 防抖判断并写入检测结果
    ///
    /// 历史记录在写入本次检测之前读取
    ///
    /// # 返回
    /// * `Result<bool>` - 是否投递了通知
    async fn record(
        &self,
        tx: &mut dyn JobTransaction,
        service: &Service,
        report: ProbeReport,
    ) -> Result<bool> {
        let ProbeReport { check, failure } = report;
        let mut notified = false;

        match failure {
            Some(failure) => {
                if service.enable_notifications {
                    let history = self.history(tx, service).await?;
                    if should_notify_down(
                        &history,
                        service.notify_after_failures,
                        service.continuously_send_notifications,
                    ) {
                        info!(service = %service.name, "发送故障通知: {}", failure.reason);
                        self.notifications
                            .enqueue(Notification::down(service.clone(), failure.clone()));
                        notified = true;
                    }
                }
                tx.insert_failure(&failure).await?;
            }
            None => {
                if service.enable_notifications {
                    let history = self.history(tx, service).await?;
                    if should_notify_up(&history, service.notify_after_failures) {
                        info!(service = %service.name, "发送恢复通知");
                        self.notifications.enqueue(Notification::up(service.clone()));
                        notified = true;
                    }
                }
            }
        }

        tx.insert_check(&check).await?;
        Ok(notified)
    }

    async fn history(
        &self,
        tx: &mut dyn JobTransaction,
        service: &Service,
    ) -> Result<Vec<Check>> {
        let window = effective_threshold(service.notify_after_failures);
        Ok(tx.last_checks(service.id, window).await?)
    }
}

/// 下一次执行时间
fn next_execute_at(now: DateTime<Utc>, service: &Service) -> DateTime<Utc> {
    now + chrono::Duration::seconds(i64::from(service.interval_seconds))
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("probers", &self.probers)
            .field("unit_timeout", &self.unit_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::probe::Prober;
    use crate::storage::MemoryJobStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        notifications: Mutex<Vec<Notification>>,
    }

    impl NotificationSink for CollectingSink {
        fn enqueue(&self, notification: Notification) {
            self.notifications.lock().unwrap().push(notification);
        }
    }

    struct FixedProber {
        fail: bool,
    }

    #[async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, service: &Service) -> std::result::Result<ProbeReport, ProbeError> {
            Ok(if self.fail {
                ProbeReport::failure(service.id, "connection refused")
            } else {
                ProbeReport::success(service.id, 12)
            })
        }
    }

    fn orchestrator(
        store: &MemoryJobStore,
        fail: bool,
    ) -> (JobOrchestrator, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let probers = ProberRegistry::new().register(
            crate::model::ServiceType::Http,
            Arc::new(FixedProber { fail }),
        );
        let orchestrator = JobOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(probers),
            sink.clone(),
            Duration::from_secs(5),
        );
        (orchestrator, sink)
    }

    #[test]
    fn test_next_execute_at() {
        let now = Utc::now();
        let service = Service::http("api", "https://example.com");
        assert_eq!(
            next_execute_at(now, &service),
            now + chrono::Duration::seconds(60)
        );
    }

    #[tokio::test]
    async fn test_failed_check_writes_failure_and_notifies() {
        let store = MemoryJobStore::new();
        let service = Service::http("api", "https://example.com").with_notifications(1, false);
        let job = store.insert_service(service.clone(), Utc::now()).await;
        let (orchestrator, sink) = orchestrator(&store, true);

        let outcome = orchestrator.process(job.id).await.unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Checked {
                failed: true,
                notified: true
            }
        );

        let checks = store.checks_for(service.id).await;
        let failures = store.failures_for(service.id).await;
        assert_eq!(checks.len(), 1);
        assert!(checks[0].is_failure);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reason, "connection refused");

        let notifications = sink.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(!notifications[0].is_up);
    }

    #[tokio::test]
    async fn test_notifications_disabled() {
        let store = MemoryJobStore::new();
        let service = Service::http("api", "https://example.com");
        let job = store.insert_service(service.clone(), Utc::now()).await;
        let (orchestrator, sink) = orchestrator(&store, true);

        let outcome = orchestrator.process(job.id).await.unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Checked {
                failed: true,
                notified: false
            }
        );
        assert!(sink.notifications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recovery_notification() {
        let store = MemoryJobStore::new();
        let service = Service::http("api", "https://example.com").with_notifications(2, false);
        let job = store.insert_service(service.clone(), Utc::now()).await;
        for _ in 0..2 {
            store.seed_check(Check::new(service.id, 0, true)).await;
        }
        let (orchestrator, sink) = orchestrator(&store, false);

        let outcome = orchestrator.process(job.id).await.unwrap();
        assert_eq!(
            outcome,
            JobOutcome::Checked {
                failed: false,
                notified: true
            }
        );
        let notifications = sink.notifications.lock().unwrap();
        assert!(notifications[0].is_up);
        assert!(notifications[0].failure.is_none());
    }

    #[tokio::test]
    async fn test_job_not_due_is_left_alone() {
        let store = MemoryJobStore::new();
        let service = Service::http("api", "https://example.com");
        let execute_at = Utc::now() + chrono::Duration::seconds(30);
        let job = store.insert_service(service.clone(), execute_at).await;
        let (orchestrator, _) = orchestrator(&store, false);

        assert_eq!(
            orchestrator.process(job.id).await.unwrap(),
            JobOutcome::NotDue
        );
        assert_eq!(store.job(job.id).await.unwrap().execute_at, execute_at);
        assert!(store.checks_for(service.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_job_is_error() {
        let store = MemoryJobStore::new();
        let (orchestrator, _) = orchestrator(&store, false);

        assert!(orchestrator.process(Uuid::new_v4()).await.is_err());
        assert!(orchestrator.run_job(0, Uuid::new_v4()).await.is_none());
    }
}
