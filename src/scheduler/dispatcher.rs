//! 到期任务分发器
//!
//! 按固定周期查询到期任务并写入有界任务队列。每次分发在独立任务中执行，
//! 慢查询不会拖慢定时器；队列满时写入阻塞，形成背压

use crate::error::{Result, SchedulerError};
use crate::scheduler::stats::SchedulerStats;
use crate::storage::JobStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 分发周期
pub const DISPATCH_INTERVAL: Duration = Duration::from_secs(5);

/// 到期任务分发器
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    queue: mpsc::Sender<Uuid>,
    period: Duration,
    query_timeout: Duration,
    stats: Arc<SchedulerStats>,
}

impl Dispatcher {
    /// 创建分发器
    ///
    /// # 参数
    /// * `store` - 任务存储
    /// * `queue` - 任务队列发送端
    /// * `query_timeout` - 到期任务查询超时
    /// * `stats` - 调度统计
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: mpsc::Sender<Uuid>,
        query_timeout: Duration,
        stats: Arc<SchedulerStats>,
    ) -> Self {
        Self {
            store,
            queue,
            period: DISPATCH_INTERVAL,
            query_timeout,
            stats,
        }
    }

    /// 修改分发周期
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// 运行分发循环直到收到关闭信号
    ///
    /// 返回时释放队列发送端，进行中的分发结束后工作者即可退出
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("任务分发器启动，周期: {:?}", self.period);

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let store = Arc::clone(&self.store);
                    let queue = self.queue.clone();
                    let stats = Arc::clone(&self.stats);
                    let query_timeout = self.query_timeout;

                    tokio::spawn(async move {
                        match dispatch_due_jobs(store.as_ref(), &queue, query_timeout).await {
                            Ok(count) => {
                                stats.record_dispatched(count);
                                if count > 0 {
                                    debug!("本轮分发 {} 个到期任务", count);
                                }
                            }
                            Err(e) => error!("分发到期任务失败: {}", e),
                        }
                    });
                }
                _ = shutdown.recv() => {
                    info!("任务分发器收到关闭信号");
                    break;
                }
            }
        }
    }
}

/// 查询到期任务并写入队列
///
/// # 参数
/// * `store` - 任务存储
/// * `queue` - 任务队列发送端
/// * `query_timeout` - 查询超时
///
/// # 返回
/// * `Result<usize>` - 写入队列的任务数量
pub async fn dispatch_due_jobs(
    store: &dyn JobStore,
    queue: &mpsc::Sender<Uuid>,
    query_timeout: Duration,
) -> Result<usize> {
    let job_ids = timeout(query_timeout, store.due_job_ids())
        .await
        .map_err(|_| SchedulerError::Timeout {
            operation: "到期任务查询",
            seconds: query_timeout.as_secs(),
        })??;

    let mut sent = 0;
    for job_id in job_ids {
        if queue.send(job_id).await.is_err() {
            warn!("任务队列已关闭，停止分发");
            break;
        }
        sent += 1;
    }

    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Service;
    use crate::storage::MemoryJobStore;
    use chrono::Utc;

    #[tokio::test]
    async fn test_dispatch_due_jobs() {
        let store = MemoryJobStore::new();
        let due = store
            .insert_service(Service::http("due", "https://example.com"), Utc::now())
            .await;
        store
            .insert_service(
                Service::http("later", "https://example.org"),
                Utc::now() + chrono::Duration::seconds(60),
            )
            .await;

        let (tx, mut rx) = mpsc::channel(8);
        let sent = dispatch_due_jobs(&store, &tx, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(sent, 1);
        assert_eq!(rx.recv().await, Some(due.id));
    }

    #[tokio::test]
    async fn test_full_queue_blocks_dispatch() {
        let store = MemoryJobStore::new();
        for i in 0..3 {
            store
                .insert_service(
                    Service::http(format!("svc-{i}"), "https://example.com"),
                    Utc::now(),
                )
                .await;
        }

        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            dispatch_due_jobs(&store, &tx, Duration::from_secs(1)).await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        for _ in 0..3 {
            assert!(rx.recv().await.is_some());
        }
        assert_eq!(handle.await.unwrap().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let (tx, mut rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let dispatcher = Dispatcher::new(
            store,
            tx,
            Duration::from_secs(1),
            Arc::new(SchedulerStats::default()),
        )
        .with_period(Duration::from_millis(10));

        let handle = tokio::spawn(dispatcher.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        // 所有发送端释放后队列关闭
        assert_eq!(rx.recv().await, None);
    }
}
