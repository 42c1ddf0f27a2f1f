//! 内存任务存储
//!
//! 与 Postgres 实现保持相同的事务语义：任务锁在事务结束前一直持有，
//! 写操作在提交时才对其他事务可见，丢弃事务即回滚。用于测试和本地运行

use crate::error::StorageError;
use crate::model::{Check, Failure, Job, Service};
use crate::storage::{JobStore, JobTransaction, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    services: HashMap<Uuid, Service>,
    jobs: HashMap<Uuid, Job>,
    checks: Vec<Check>,
    failures: Vec<Failure>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    job_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    reject_writes: AtomicBool,
}

/// 事务内暂存的写操作
#[derive(Debug)]
enum PendingWrite {
    ExecuteAt { job_id: Uuid, execute_at: DateTime<Utc> },
    Check(Check),
    Failure(Failure),
}

/// 内存任务存储
#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    inner: Arc<Inner>,
}

impl MemoryJobStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入服务并为其创建调度任务
    ///
    /// # 参数
    /// * `service` - 服务定义
    /// * `execute_at` - 首次执行时间
    ///
    /// # 返回
    /// * `Job` - 新建的任务
    pub async fn insert_service(&self, service: Service, execute_at: DateTime<Utc>) -> Job {
        let job = Job::new(service.id, execute_at);
        let mut state = self.inner.state.lock().await;
        state.services.insert(service.id, service);
        state.jobs.insert(job.id, job.clone());
        job
    }

    /// 替换服务定义，模拟外部管理层的修改
    pub async fn update_service(&self, service: Service) {
        self.inner
            .state
            .lock()
            .await
            .services
            .insert(service.id, service);
    }

    /// 读取已提交的任务
    pub async fn job(&self, job_id: Uuid) -> Option<Job> {
        self.inner.state.lock().await.jobs.get(&job_id).cloned()
    }

    /// 服务已提交的检测记录，按写入顺序
    pub async fn checks_for(&self, service_id: Uuid) -> Vec<Check> {
        self.inner
            .state
            .lock()
            .await
            .checks
            .iter()
            .filter(|c| c.service_id == service_id)
            .cloned()
            .collect()
    }

    /// 服务已提交的失败记录，按写入顺序
    pub async fn failures_for(&self, service_id: Uuid) -> Vec<Failure> {
        self.inner
            .state
            .lock()
            .await
            .failures
            .iter()
            .filter(|f| f.service_id == service_id)
            .cloned()
            .collect()
    }

    /// 直接追加一条已提交的检测记录，用于构造历史
    pub async fn seed_check(&self, check: Check) {
        self.inner.state.lock().await.checks.push(check);
    }

    /// 开启后所有检测写入都会失败
    pub fn reject_writes(&self, reject: bool) {
        self.inner.reject_writes.store(reject, Ordering::SeqCst);
    }

    async fn job_lock(&self, job_id: Uuid) -> Arc<Mutex<()>> {
        self.inner
            .job_locks
            .lock()
            .await
            .entry(job_id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn due_job_ids(&self) -> StorageResult<Vec<Uuid>> {
        let now = Utc::now();
        let state = self.inner.state.lock().await;
        let mut due: Vec<&Job> = state.jobs.values().filter(|job| job.is_due(now)).collect();
        due.sort_by_key(|job| job.execute_at);
        Ok(due.into_iter().map(|job| job.id).collect())
    }

    async fn begin(&self) -> StorageResult<Box<dyn JobTransaction>> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            guards: Vec::new(),
            pending: Vec::new(),
        }))
    }
}

/// 内存事务
struct MemoryTransaction {
    store: MemoryJobStore,
    guards: Vec<OwnedMutexGuard<()>>,
    pending: Vec<PendingWrite>,
}

impl MemoryTransaction {
    fn check_writable(&self) -> StorageResult<()> {
        if self.store.inner.reject_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("写入被拒绝".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobTransaction for MemoryTransaction {
    async fn lock_job(&mut self, job_id: Uuid) -> StorageResult<Job> {
        let lock = self.store.job_lock(job_id).await;
        let guard = lock.lock_owned().await;
        self.guards.push(guard);

        let state = self.store.inner.state.lock().await;
        let mut job = state
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(StorageError::JobNotFound(job_id))?;

        for write in &self.pending {
            if let PendingWrite::ExecuteAt { job_id: id, execute_at } = write {
                if *id == job_id {
                    job.execute_at = *execute_at;
                }
            }
        }

        Ok(job)
    }

    async fn load_service(&mut self, service_id: Uuid) -> StorageResult<Service> {
        self.store
            .inner
            .state
            .lock()
            .await
            .services
            .get(&service_id)
            .cloned()
            .ok_or(StorageError::ServiceNotFound(service_id))
    }

    async fn update_execute_at(
        &mut self,
        job_id: Uuid,
        execute_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        if !self.store.inner.state.lock().await.jobs.contains_key(&job_id) {
            return Err(StorageError::JobNotFound(job_id));
        }
        self.pending
            .push(PendingWrite::ExecuteAt { job_id, execute_at });
        Ok(())
    }

    async fn last_checks(&mut self, service_id: Uuid, limit: u32) -> StorageResult<Vec<Check>> {
        let state = self.store.inner.state.lock().await;
        let staged = self.pending.iter().filter_map(|write| match write {
            PendingWrite::Check(check) => Some(check),
            _ => None,
        });

        let mut checks: Vec<Check> = state
            .checks
            .iter()
            .chain(staged)
            .filter(|c| c.service_id == service_id)
            .cloned()
            .collect();

        // 同一时间戳时后写入的排在前面
        checks.reverse();
        checks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        checks.truncate(limit as usize);
        Ok(checks)
    }

    async fn insert_check(&mut self, check: &Check) -> StorageResult<()> {
        self.check_writable()?;
        self.pending.push(PendingWrite::Check(check.clone()));
        Ok(())
    }

    async fn insert_failure(&mut self, failure: &Failure) -> StorageResult<()> {
        self.check_writable()?;
        self.pending.push(PendingWrite::Failure(failure.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        let mut state = this.store.inner.state.lock().await;
        for write in this.pending {
            match write {
                PendingWrite::ExecuteAt { job_id, execute_at } => {
                    if let Some(job) = state.jobs.get_mut(&job_id) {
                        job.execute_at = execute_at;
                    }
                }
                PendingWrite::Check(check) => state.checks.push(check),
                PendingWrite::Failure(failure) => state.failures.push(failure),
            }
        }
        drop(state);
        drop(this.guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    async fn store_with_job(offset_seconds: i64) -> (MemoryJobStore, Service, Job) {
        let store = MemoryJobStore::new();
        let service = Service::http("api", "https://example.com");
        let job = store
            .insert_service(service.clone(), Utc::now() + Duration::seconds(offset_seconds))
            .await;
        (store, service, job)
    }

    #[tokio::test]
    async fn test_due_job_ids_only_returns_due_jobs() {
        let (store, _, due_job) = store_with_job(-10).await;
        store
            .insert_service(
                Service::http("later", "https://example.org"),
                Utc::now() + Duration::seconds(60),
            )
            .await;

        assert_eq!(store.due_job_ids().await.unwrap(), vec![due_job.id]);
    }

    #[tokio::test]
    async fn test_commit_applies_writes() {
        let (store, service, job) = store_with_job(-1).await;
        let next = Utc::now() + Duration::seconds(60);

        let mut tx = store.begin().await.unwrap();
        tx.lock_job(job.id).await.unwrap();
        tx.update_execute_at(job.id, next).await.unwrap();
        tx.insert_check(&Check::new(service.id, 5, false)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.job(job.id).await.unwrap().execute_at, next);
        assert_eq!(store.checks_for(service.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let (store, service, job) = store_with_job(-1).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_job(job.id).await.unwrap();
            tx.update_execute_at(job.id, Utc::now() + Duration::seconds(60))
                .await
                .unwrap();
            tx.insert_failure(&Failure::new(service.id, "boom"))
                .await
                .unwrap();
        }

        assert_eq!(store.job(job.id).await.unwrap().execute_at, job.execute_at);
        assert!(store.failures_for(service.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_lock_blocks_until_transaction_ends() {
        let (store, _, job) = store_with_job(-1).await;

        let mut first = store.begin().await.unwrap();
        first.lock_job(job.id).await.unwrap();

        let contender = store.clone();
        let handle = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            second.lock_job(job.id).await.unwrap()
        });

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert!(!handle.is_finished());

        let next = Utc::now() + Duration::seconds(60);
        first.update_execute_at(job.id, next).await.unwrap();
        first.commit().await.unwrap();

        let seen = handle.await.unwrap();
        assert_eq!(seen.execute_at, next);
    }

    #[tokio::test]
    async fn test_last_checks_newest_first_and_sees_own_writes() {
        let (store, service, _) = store_with_job(-1).await;
        let mut older = Check::new(service.id, 1, true);
        older.created_at = Utc::now() - Duration::seconds(120);
        let mut newer = Check::new(service.id, 2, false);
        newer.created_at = Utc::now() - Duration::seconds(60);
        store.seed_check(older.clone()).await;
        store.seed_check(newer.clone()).await;

        let mut tx = store.begin().await.unwrap();
        let staged = Check::new(service.id, 3, true);
        tx.insert_check(&staged).await.unwrap();

        let history = tx.last_checks(service.id, 2).await.unwrap();
        assert_eq!(history, vec![staged, newer]);

        let other = tx.last_checks(Uuid::new_v4(), 5).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_missing_records() {
        let store = MemoryJobStore::new();
        let mut tx = store.begin().await.unwrap();

        let missing = Uuid::new_v4();
        assert!(matches!(
            tx.lock_job(missing).await,
            Err(StorageError::JobNotFound(id)) if id == missing
        ));
        assert!(matches!(
            tx.load_service(missing).await,
            Err(StorageError::ServiceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_writes() {
        let (store, service, _) = store_with_job(-1).await;
        store.reject_writes(true);

        let mut tx = store.begin().await.unwrap();
        let result = tx.insert_check(&Check::new(service.id, 0, true)).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }
}
