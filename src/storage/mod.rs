//! 存储模块
//!
//! 定义调度引擎所需的存储接口：查询到期任务，以及在单个事务内
//! 锁定任务、重新调度、读取检测历史和写入检测结果

pub mod memory;
pub mod postgres;

use crate::error::StorageError;
use crate::model::{Check, Failure, Job, Service};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

// 重新导出主要类型
pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

/// 存储操作结果
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// 任务存储trait
#[async_trait]
pub trait JobStore: Send + Sync {
    /// 查询所有已到期任务的ID
    async fn due_job_ids(&self) -> StorageResult<Vec<Uuid>>;

    /// 开启事务
    async fn begin(&self) -> StorageResult<Box<dyn JobTransaction>>;
}

/// 任务事务trait
///
/// 未提交就被丢弃的事务等同于回滚
#[async_trait]
pub trait JobTransaction: Send {
    /// 锁定并读取任务，同一任务的其他事务会阻塞直到本事务结束
    async fn lock_job(&mut self, job_id: Uuid) -> StorageResult<Job>;

    /// 读取服务定义
    async fn load_service(&mut self, service_id: Uuid) -> StorageResult<Service>;

    /// 更新任务的下一次执行时间
    async fn update_execute_at(
        &mut self,
        job_id: Uuid,
        execute_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// 读取服务最近的 `limit` 条检测记录，按时间从新到旧排列
    async fn last_checks(&mut self, service_id: Uuid, limit: u32) -> StorageResult<Vec<Check>>;

    /// 写入检测记录
    async fn insert_check(&mut self, check: &Check) -> StorageResult<()>;

    /// 写入失败记录
    async fn insert_failure(&mut self, failure: &Failure) -> StorageResult<()>;

    /// 提交事务
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// 回滚事务
    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}
