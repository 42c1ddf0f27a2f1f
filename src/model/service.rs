//! 服务定义数据结构
//!
//! 服务由外部 CRUD 层创建和修改，调度引擎每次执行检测前重新加载，执行期间不可变

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 检测间隔的取值范围（秒）
pub const INTERVAL_RANGE: std::ops::RangeInclusive<i32> = 30..=1800;

/// 请求超时的取值范围（秒）
pub const REQUEST_TIMEOUT_RANGE: std::ops::RangeInclusive<i32> = 1..=180;

/// 支持的HTTP方法
pub const VALID_HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// 服务类型
///
/// 存储中的未知类型保留为 `Unknown`，由调度引擎记录日志后跳过
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceType {
    /// HTTP/HTTPS 检测
    Http,
    /// ICMP ping 检测
    IcmpPing,
    /// 未知类型
    Unknown(String),
}

impl ServiceType {
    /// 存储中使用的类型名称
    pub fn as_str(&self) -> &str {
        match self {
            ServiceType::Http => "HTTP",
            ServiceType::IcmpPing => "ICMP_PING",
            ServiceType::Unknown(raw) => raw,
        }
    }
}

impl From<&str> for ServiceType {
    fn from(value: &str) -> Self {
        match value {
            "HTTP" => ServiceType::Http,
            "ICMP_PING" => ServiceType::IcmpPing,
            other => ServiceType::Unknown(other.to_string()),
        }
    }
}

impl From<String> for ServiceType {
    fn from(value: String) -> Self {
        ServiceType::from(value.as_str())
    }
}

impl From<ServiceType> for String {
    fn from(value: ServiceType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 被监控的服务定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// 服务ID
    pub id: Uuid,
    /// 服务名称
    pub name: String,
    /// 服务类型
    pub service_type: ServiceType,
    /// 检测间隔（秒）
    pub interval_seconds: i32,
    /// 探测端点（URL 或主机名）
    pub endpoint: String,
    /// HTTP方法
    pub http_method: String,
    /// 单次请求超时（秒）
    pub request_timeout_seconds: i32,
    /// 请求头字符串，格式为 `key:value;key:value`
    pub http_headers: String,
    /// 请求体
    pub http_body: String,
    /// 期望的HTTP状态码
    pub expected_status_code: u16,
    /// 期望的响应体正则表达式，空字符串表示不检查
    pub expected_response_body: String,
    /// 是否跟随重定向
    pub follow_redirects: bool,
    /// 是否校验 TLS 证书
    pub verify_ssl: bool,
    /// 是否启用通知
    pub enable_notifications: bool,
    /// 连续失败多少次后通知
    pub notify_after_failures: u32,
    /// 是否在故障期间持续发送通知
    pub continuously_send_notifications: bool,
    /// 通知渠道标识列表
    pub notifiers: Vec<String>,
}

impl Service {
    /// 创建一个 HTTP 服务定义，其余字段取默认值
    pub fn http(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            service_type: ServiceType::Http,
            interval_seconds: 60,
            endpoint: endpoint.into(),
            http_method: "GET".to_string(),
            request_timeout_seconds: 10,
            http_headers: String::new(),
            http_body: String::new(),
            expected_status_code: 200,
            expected_response_body: String::new(),
            follow_redirects: true,
            verify_ssl: true,
            enable_notifications: false,
            notify_after_failures: 1,
            continuously_send_notifications: false,
            notifiers: Vec::new(),
        }
    }

    /// 创建一个 ICMP ping 服务定义，其余字段取默认值
    pub fn icmp(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            service_type: ServiceType::IcmpPing,
            ..Self::http(name, host)
        }
    }

    /// 设置通知策略
    pub fn with_notifications(mut self, after_failures: u32, continuously: bool) -> Self {
        self.enable_notifications = true;
        self.notify_after_failures = after_failures;
        self.continuously_send_notifications = continuously;
        self
    }

    /// 校验服务定义
    ///
    /// 与服务定义管理层使用相同的约束；调度引擎不会对已存储的服务重新校验
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("服务名称不能为空".to_string());
        }

        if let ServiceType::Unknown(raw) = &self.service_type {
            return Err(format!(
                "无效的服务类型: {raw}，必须是 [HTTP, ICMP_PING] 之一"
            ));
        }

        if !INTERVAL_RANGE.contains(&self.interval_seconds) {
            return Err(format!(
                "服务 {} 的检测间隔必须在 30 到 1800 秒之间",
                self.name
            ));
        }

        if !REQUEST_TIMEOUT_RANGE.contains(&self.request_timeout_seconds) {
            return Err(format!(
                "服务 {} 的请求超时必须在 1 到 180 秒之间",
                self.name
            ));
        }

        if self.endpoint.trim().is_empty() {
            return Err(format!("服务 {} 的端点不能为空", self.name));
        }

        if self.service_type == ServiceType::Http {
            if !VALID_HTTP_METHODS.contains(&self.http_method.as_str()) {
                return Err(format!(
                    "服务 {} 的HTTP方法 {} 无效，支持的方法: {:?}",
                    self.name, self.http_method, VALID_HTTP_METHODS
                ));
            }

            if !(100..=599).contains(&self.expected_status_code) {
                return Err(format!(
                    "服务 {} 的状态码 {} 无效",
                    self.name, self.expected_status_code
                ));
            }
        }

        if self.enable_notifications && self.notify_after_failures == 0 {
            return Err(format!("服务 {} 的通知失败阈值不能为0", self.name));
        }

        Ok(())
    }
}
