//! 探测器trait与注册表

use crate::error::ProbeError;
use crate::model::{Check, Failure, Service, ServiceType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// 单次探测的结果：一条检测记录，失败时附带失败详情
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// 检测记录
    pub check: Check,
    /// 失败详情（仅在检测失败时存在）
    pub failure: Option<Failure>,
}

impl ProbeReport {
    /// 成功的探测结果
    pub fn success(service_id: Uuid, latency_ms: i64) -> Self {
        Self {
            check: Check::new(service_id, latency_ms, false),
            failure: None,
        }
    }

    /// 失败的探测结果，延迟记为0
    pub fn failure(service_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            check: Check::new(service_id, 0, true),
            failure: Some(Failure::new(service_id, reason)),
        }
    }

    /// 是否失败
    pub fn is_failure(&self) -> bool {
        self.check.is_failure
    }

    /// 失败原因
    pub fn reason(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.reason.as_str())
    }
}

/// 探测器trait，定义单次可达性检测接口
///
/// 目标不可达、状态码不符等都是正常的探测结果，以失败的 [`ProbeReport`] 返回；
/// 只有探测本身无法发起时才返回 [`ProbeError`]
#[async_trait]
pub trait Prober: Send + Sync {
    /// 执行一次探测
    ///
    /// # 参数
    /// * `service` - 服务定义
    ///
    /// # 返回
    /// * `Result<ProbeReport, ProbeError>` - 探测结果
    async fn probe(&self, service: &Service) -> Result<ProbeReport, ProbeError>;
}

/// 按服务类型选择探测器
#[derive(Clone, Default)]
pub struct ProberRegistry {
    probers: HashMap<ServiceType, Arc<dyn Prober>>,
}

impl ProberRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册探测器，同类型的旧探测器会被替换
    pub fn register(mut self, service_type: ServiceType, prober: Arc<dyn Prober>) -> Self {
        self.probers.insert(service_type, prober);
        self
    }

    /// 查找服务类型对应的探测器
    pub fn get(&self, service_type: &ServiceType) -> Option<Arc<dyn Prober>> {
        self.probers.get(service_type).cloned()
    }
}

impl std::fmt::Debug for ProberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProberRegistry")
            .field("types", &self.probers.keys().collect::<Vec<_>>())
            .finish()
    }
}
