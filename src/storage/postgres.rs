//! Postgres 任务存储
//!
//! 任务互斥依赖 `SELECT ... FOR UPDATE` 行锁，锁随事务提交或回滚释放

use crate::config::DatabaseConfig;
use crate::error::StorageError;
use crate::model::{Check, Failure, Job, Service, ServiceType};
use crate::storage::{JobStore, JobTransaction, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    service_id: Uuid,
    execute_at: DateTime<Utc>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            id: row.id,
            service_id: row.service_id,
            execute_at: row.execute_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ServiceRow {
    id: Uuid,
    name: String,
    #[sqlx(rename = "type")]
    service_type: String,
    interval_in_seconds: i32,
    endpoint: String,
    http_method: String,
    request_timeout_in_seconds: i32,
    http_headers: String,
    http_body: String,
    expected_http_response_body: String,
    expected_http_status_code: i32,
    follow_redirects: bool,
    verify_ssl: bool,
    enable_notifications: bool,
    notify_after_number_of_failures: i32,
    continuously_send_notifications: bool,
    notifiers: Vec<String>,
}

impl TryFrom<ServiceRow> for Service {
    type Error = StorageError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        let expected_status_code = u16::try_from(row.expected_http_status_code).map_err(|_| {
            StorageError::Malformed(format!(
                "服务 {} 的期望状态码 {} 超出范围",
                row.id, row.expected_http_status_code
            ))
        })?;

        Ok(Service {
            id: row.id,
            name: row.name,
            service_type: ServiceType::from(row.service_type),
            interval_seconds: row.interval_in_seconds,
            endpoint: row.endpoint,
            http_method: row.http_method,
            request_timeout_seconds: row.request_timeout_in_seconds,
            http_headers: row.http_headers,
            http_body: row.http_body,
            expected_status_code,
            expected_response_body: row.expected_http_response_body,
            follow_redirects: row.follow_redirects,
            verify_ssl: row.verify_ssl,
            enable_notifications: row.enable_notifications,
            notify_after_failures: u32::try_from(row.notify_after_number_of_failures)
                .unwrap_or(0),
            continuously_send_notifications: row.continuously_send_notifications,
            notifiers: row.notifiers,
        })
    }
}

#[derive(Debug, FromRow)]
struct CheckRow {
    id: Uuid,
    service_id: Uuid,
    latency_in_ms: i64,
    is_failure: bool,
    created_at: DateTime<Utc>,
}

impl From<CheckRow> for Check {
    fn from(row: CheckRow) -> Self {
        Check {
            id: row.id,
            service_id: row.service_id,
            latency_ms: row.latency_in_ms,
            is_failure: row.is_failure,
            created_at: row.created_at,
        }
    }
}

/// Postgres 任务存储
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    /// 按配置建立连接池
    ///
    /// # 参数
    /// * `config` - 数据库配置
    ///
    /// # 返回
    /// * `StorageResult<Self>` - 存储实例
    pub async fn connect(config: &DatabaseConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!("数据库连接池已建立，最大连接数: {}", config.max_connections);
        Ok(Self { pool })
    }

    /// 使用已有连接池
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 连接池
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 执行内置的数据库迁移
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("数据库迁移完成");
        Ok(())
    }

    /// 写入服务并为其创建调度任务
    pub async fn insert_service(
        &self,
        service: &Service,
        execute_at: DateTime<Utc>,
    ) -> StorageResult<Job> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO services (
                id, name, type, interval_in_seconds, endpoint, http_method,
                request_timeout_in_seconds, http_headers, http_body,
                expected_http_response_body, expected_http_status_code,
                follow_redirects, verify_ssl, enable_notifications,
                notify_after_number_of_failures, continuously_send_notifications, notifiers
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(service.id)
        .bind(&service.name)
        .bind(service.service_type.as_str())
        .bind(service.interval_seconds)
        .bind(&service.endpoint)
        .bind(&service.http_method)
        .bind(service.request_timeout_seconds)
        .bind(&service.http_headers)
        .bind(&service.http_body)
        .bind(&service.expected_response_body)
        .bind(i32::from(service.expected_status_code))
        .bind(service.follow_redirects)
        .bind(service.verify_ssl)
        .bind(service.enable_notifications)
        .bind(i32::try_from(service.notify_after_failures).unwrap_or(i32::MAX))
        .bind(service.continuously_send_notifications)
        .bind(&service.notifiers)
        .execute(&mut *tx)
        .await?;

        let job = Job::new(service.id, execute_at);
        sqlx::query("INSERT INTO jobs (id, service_id, execute_at) VALUES ($1, $2, $3)")
            .bind(job.id)
            .bind(job.service_id)
            .bind(job.execute_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(job)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn due_job_ids(&self) -> StorageResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM jobs WHERE execute_at <= now() ORDER BY execute_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn begin(&self) -> StorageResult<Box<dyn JobTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgJobTransaction { tx }))
    }
}

/// Postgres 事务，丢弃时由 sqlx 自动回滚
struct PgJobTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl JobTransaction for PgJobTransaction {
    async fn lock_job(&mut self, job_id: Uuid) -> StorageResult<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT id, service_id, execute_at FROM jobs WHERE id = $1 FOR UPDATE",
        )
        .bind(job_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Job::from).ok_or(StorageError::JobNotFound(job_id))
    }

    async fn load_service(&mut self, service_id: Uuid) -> StorageResult<Service> {
        let row = sqlx::query_as::<_, ServiceRow>(
            r#"
            SELECT id, name, type, interval_in_seconds, endpoint, http_method,
                   request_timeout_in_seconds, http_headers, http_body,
                   expected_http_response_body, expected_http_status_code,
                   follow_redirects, verify_ssl, enable_notifications,
                   notify_after_number_of_failures, continuously_send_notifications, notifiers
            FROM services
            WHERE id = $1
            "#,
        )
        .bind(service_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.ok_or(StorageError::ServiceNotFound(service_id))?
            .try_into()
    }

    async fn update_execute_at(
        &mut self,
        job_id: Uuid,
        execute_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let result = sqlx::query("UPDATE jobs SET execute_at = $2 WHERE id = $1")
            .bind(job_id)
            .bind(execute_at)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    async fn last_checks(&mut self, service_id: Uuid, limit: u32) -> StorageResult<Vec<Check>> {
        let rows = sqlx::query_as::<_, CheckRow>(
            r#"
            SELECT id, service_id, latency_in_ms, is_failure, created_at
            FROM checks
            WHERE service_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(service_id)
        .bind(i64::from(limit))
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Check::from).collect())
    }

    async fn insert_check(&mut self, check: &Check) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO checks (id, service_id, latency_in_ms, is_failure, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(check.id)
        .bind(check.service_id)
        .bind(check.latency_ms)
        .bind(check.is_failure)
        .bind(check.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_failure(&mut self, failure: &Failure) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO failures (id, service_id, reason, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(failure.id)
        .bind(failure.service_id)
        .bind(&failure.reason)
        .bind(failure.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
