//! 工作池
//!
//! 固定数量的长期任务共享同一个队列接收端，每个工作者处理完一个任务后才取下一个

use crate::scheduler::orchestrator::JobOrchestrator;
use crate::scheduler::stats::SchedulerStats;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 工作池
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// 启动工作池
    ///
    /// # 参数
    /// * `workers` - 工作者数量
    /// * `queue` - 任务队列接收端
    /// * `orchestrator` - 任务编排器
    /// * `stats` - 调度统计
    pub fn spawn(
        workers: usize,
        queue: mpsc::Receiver<Uuid>,
        orchestrator: Arc<JobOrchestrator>,
        stats: Arc<SchedulerStats>,
    ) -> Self {
        let queue = Arc::new(Mutex::new(queue));

        let handles = (0..workers)
            .map(|worker_id| {
                let queue = Arc::clone(&queue);
                let orchestrator = Arc::clone(&orchestrator);
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    debug!(worker_id, "工作者启动");
                    loop {
                        // 只在等待任务时持有接收端锁
                        let next = queue.lock().await.recv().await;
                        let Some(job_id) = next else {
                            break;
                        };
                        let outcome = orchestrator.run_job(worker_id, job_id).await;
                        stats.record_outcome(outcome);
                    }
                    debug!(worker_id, "工作者退出");
                })
            })
            .collect();

        info!("工作池已启动，工作者数量: {}", workers);
        Self { handles }
    }

    /// 工作者数量
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// 等待所有工作者退出
    ///
    /// 队列的所有发送端被释放且队列排空后工作者才会退出
    pub async fn join(self) {
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                warn!("工作者异常退出: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Service;
    use crate::notification::NotificationQueue;
    use crate::probe::ProberRegistry;
    use crate::storage::MemoryJobStore;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pool_drains_queue_then_exits() {
        let store = MemoryJobStore::new();
        let mut job_ids = Vec::new();
        for i in 0..4 {
            let service = Service::http(format!("svc-{i}"), "https://example.com");
            job_ids.push(store.insert_service(service, Utc::now()).await.id);
        }

        // 空注册表：所有任务都按未知类型处理
        let (notifications, _dispatcher) = NotificationQueue::channel();
        let orchestrator = Arc::new(JobOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(ProberRegistry::new()),
            Arc::new(notifications),
            Duration::from_secs(5),
        ));
        let stats = Arc::new(SchedulerStats::default());

        let (tx, rx) = mpsc::channel(8);
        let pool = WorkerPool::spawn(2, rx, orchestrator, Arc::clone(&stats));
        assert_eq!(pool.size(), 2);

        for job_id in &job_ids {
            tx.send(*job_id).await.unwrap();
        }
        drop(tx);
        pool.join().await;

        assert_eq!(stats.snapshot().skipped, 4);
        for job_id in job_ids {
            assert!(store.job(job_id).await.unwrap().execute_at > Utc::now());
        }
    }
}
