//! 调度任务与检测记录
//!
//! Job 记录服务下一次检测时间；Check/Failure 只追加不修改

use crate::model::service::Service;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 服务的调度记录，每个活跃服务恰好对应一个
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// 任务ID
    pub id: Uuid,
    /// 所属服务ID
    pub service_id: Uuid,
    /// 下一次执行时间
    pub execute_at: DateTime<Utc>,
}

impl Job {
    /// 创建新的调度记录
    pub fn new(service_id: Uuid, execute_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id,
            execute_at,
        }
    }

    /// 任务是否到期
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.execute_at <= now
    }
}

/// 单次探测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    /// 检测ID
    pub id: Uuid,
    /// 服务ID
    pub service_id: Uuid,
    /// 延迟（毫秒），无意义时为0
    pub latency_ms: i64,
    /// 是否失败
    pub is_failure: bool,
    /// 检测时间
    pub created_at: DateTime<Utc>,
}

impl Check {
    /// 创建新的检测记录
    pub fn new(service_id: Uuid, latency_ms: i64, is_failure: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id,
            latency_ms,
            is_failure,
            created_at: Utc::now(),
        }
    }
}

/// 失败详情，与失败的 Check 一一对应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    /// 失败记录ID
    pub id: Uuid,
    /// 服务ID
    pub service_id: Uuid,
    /// 失败原因
    pub reason: String,
    /// 记录时间
    pub created_at: DateTime<Utc>,
}

impl Failure {
    /// 创建新的失败记录
    pub fn new(service_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id,
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }
}

/// 状态变化通知，不持久化，交给通知分发组件后即结束生命周期
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// 相关服务
    pub service: Service,
    /// 服务当前是否恢复正常
    pub is_up: bool,
    /// 故障通知对应的失败详情
    pub failure: Option<Failure>,
    /// 通知产生时间
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// 创建故障通知
    pub fn down(service: Service, failure: Failure) -> Self {
        Self {
            service,
            is_up: false,
            failure: Some(failure),
            created_at: Utc::now(),
        }
    }

    /// 创建恢复通知
    pub fn up(service: Service) -> Self {
        Self {
            service,
            is_up: true,
            failure: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_job_is_due_at_boundary() {
        let now = Utc::now();
        let job = Job::new(Uuid::new_v4(), now);
        assert!(job.is_due(now));
        assert!(job.is_due(now + Duration::seconds(1)));
        assert!(!job.is_due(now - Duration::seconds(1)));
    }

    #[test]
    fn test_notification_constructors() {
        let service = Service::http("api", "https://example.com");
        let failure = Failure::new(service.id, "boom");

        let down = Notification::down(service.clone(), failure.clone());
        assert!(!down.is_up);
        assert_eq!(down.failure, Some(failure));

        let up = Notification::up(service);
        assert!(up.is_up);
        assert!(up.failure.is_none());
    }
}
