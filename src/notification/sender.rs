//! 通知发送器模块
//!
//! 定义通知发送的trait和基础实现

use crate::model::Notification;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

/// 通知发送器trait
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 发送一条状态变化通知
    ///
    /// # 参数
    /// * `notification` - 通知内容
    ///
    /// # 返回
    /// * `Result<()>` - 发送结果
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// 把通知写入日志的发送器
///
/// 未配置其他通知渠道时作为默认发送器
#[derive(Debug, Clone, Default)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let service = &notification.service;
        if notification.is_up {
            info!(
                service = %service.name,
                endpoint = %service.endpoint,
                "服务已恢复"
            );
        } else {
            let reason = notification
                .failure
                .as_ref()
                .map(|f| f.reason.as_str())
                .unwrap_or_default();
            warn!(
                service = %service.name,
                endpoint = %service.endpoint,
                reason = %reason,
                "服务故障"
            );
        }
        Ok(())
    }
}

/// 空的通知发送器实现（用于测试或禁用通知）
#[derive(Debug, Clone, Default)]
pub struct NoOpSender;

#[async_trait]
impl NotificationSender for NoOpSender {
    async fn send(&self, _notification: &Notification) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Failure, Service};

    #[tokio::test]
    async fn test_log_sender_accepts_both_directions() {
        let service = Service::http("api", "https://example.com");
        let failure = Failure::new(service.id, "connection refused");

        let sender = LogSender;
        assert!(sender
            .send(&Notification::down(service.clone(), failure))
            .await
            .is_ok());
        assert!(sender.send(&Notification::up(service)).await.is_ok());
    }

    #[tokio::test]
    async fn test_noop_sender() {
        let service = Service::icmp("gateway", "10.0.0.1");
        assert!(NoOpSender.send(&Notification::up(service)).await.is_ok());
    }
}
