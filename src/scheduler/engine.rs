//! 调度引擎
//!
//! 组装分发器、任务队列和工作池，负责启动与优雅关闭

use crate::config::{IcmpMode, SchedulerConfig};
use crate::error::{Result, SchedulerError};
use crate::model::ServiceType;
use crate::notification::NotificationSink;
use crate::probe::{HttpProber, ProberRegistry, RawIcmpProber, SystemPingProber};
use crate::scheduler::dispatcher::{Dispatcher, DISPATCH_INTERVAL};
use crate::scheduler::orchestrator::JobOrchestrator;
use crate::scheduler::stats::{SchedulerStats, StatsSnapshot};
use crate::scheduler::worker::WorkerPool;
use crate::storage::JobStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 按 ICMP 模式构建默认的探测器注册表
///
/// # 参数
/// * `icmp_mode` - ICMP 探测方式
///
/// # 返回
/// * `ProberRegistry` - 包含 HTTP 与 ICMP 探测器的注册表
pub fn build_prober_registry(icmp_mode: IcmpMode) -> ProberRegistry {
    let registry = ProberRegistry::new().register(ServiceType::Http, Arc::new(HttpProber::new()));
    match icmp_mode {
        IcmpMode::System => {
            registry.register(ServiceType::IcmpPing, Arc::new(SystemPingProber::new()))
        }
        IcmpMode::Raw => registry.register(ServiceType::IcmpPing, Arc::new(RawIcmpProber::new())),
    }
}

struct Running {
    dispatcher: JoinHandle<()>,
    pool: WorkerPool,
}

/// 检测调度引擎
pub struct CheckScheduler {
    config: SchedulerConfig,
    store: Arc<dyn JobStore>,
    orchestrator: Arc<JobOrchestrator>,
    stats: Arc<SchedulerStats>,
    dispatch_period: Duration,
    shutdown_tx: broadcast::Sender<()>,
    running: Option<Running>,
}

impl CheckScheduler {
    /// 创建调度引擎
    ///
    /// # 参数
    /// * `config` - 调度器配置
    /// * `store` - 任务存储
    /// * `probers` - 探测器注册表
    /// * `notifications` - 通知接收端
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn JobStore>,
        probers: ProberRegistry,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let orchestrator = Arc::new(JobOrchestrator::new(
            Arc::clone(&store),
            Arc::new(probers),
            notifications,
            Duration::from_secs(config.job_timeout_seconds),
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            store,
            orchestrator,
            stats: Arc::new(SchedulerStats::default()),
            dispatch_period: DISPATCH_INTERVAL,
            shutdown_tx,
            running: None,
        }
    }

    /// 修改分发周期
    pub fn with_dispatch_period(mut self, period: Duration) -> Self {
        self.dispatch_period = period;
        self
    }

    /// 启动分发器和工作池
    ///
    /// 调度器被配置为禁用时只记录日志
    pub fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            warn!("调度器已在配置中禁用，不会执行任何检测");
            return Ok(());
        }

        if self.running.is_some() {
            return Err(SchedulerError::Other(anyhow::anyhow!("调度器已在运行")));
        }

        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity);

        let pool = WorkerPool::spawn(
            self.config.workers,
            queue_rx,
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.stats),
        );

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.store),
            queue_tx,
            Duration::from_secs(self.config.due_query_timeout_seconds),
            Arc::clone(&self.stats),
        )
        .with_period(self.dispatch_period);
        let dispatcher = tokio::spawn(dispatcher.run(self.shutdown_tx.subscribe()));

        self.running = Some(Running { dispatcher, pool });
        info!(
            "调度器已启动，工作者: {}，队列容量: {}",
            self.config.workers, self.config.queue_capacity
        );
        Ok(())
    }

    /// 是否正在运行
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// 当前统计
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 任务编排器
    pub fn orchestrator(&self) -> Arc<JobOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// 停止分发并等待队列中的任务处理完毕
    pub async fn shutdown(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        info!("正在关闭调度器...");
        let _ = self.shutdown_tx.send(());

        if let Err(e) = running.dispatcher.await {
            warn!("分发器异常退出: {}", e);
        }
        running.pool.join().await;

        let stats = self.stats.snapshot();
        info!(
            "调度器已关闭，共完成 {} 次检测，{} 次出错",
            stats.checked, stats.errored
        );
    }
}
