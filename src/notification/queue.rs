//! 通知队列与分发器
//!
//! 编排器通过 `NotificationSink` 投递通知，不等待发送结果；
//! `NotificationDispatcher` 独占接收端，按服务配置的通知渠道转交给发送器

use crate::model::Notification;
use crate::notification::sender::NotificationSender;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 通知接收端trait
pub trait NotificationSink: Send + Sync {
    /// 投递一条通知，立即返回
    fn enqueue(&self, notification: Notification);
}

/// 基于无界通道的通知队列
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationQueue {
    /// 创建通知队列及其分发器
    ///
    /// # 返回
    /// * `(NotificationQueue, NotificationDispatcher)` - 发送端与分发器
    pub fn channel() -> (Self, NotificationDispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, NotificationDispatcher::new(rx))
    }
}

impl NotificationSink for NotificationQueue {
    fn enqueue(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            warn!(
                "通知分发器已停止，丢弃服务 {} 的通知",
                e.0.service.name
            );
        }
    }
}

/// 通知分发器
pub struct NotificationDispatcher {
    rx: mpsc::UnboundedReceiver<Notification>,
    senders: HashMap<String, Arc<dyn NotificationSender>>,
    default_senders: Vec<Arc<dyn NotificationSender>>,
}

impl NotificationDispatcher {
    fn new(rx: mpsc::UnboundedReceiver<Notification>) -> Self {
        Self {
            rx,
            senders: HashMap::new(),
            default_senders: Vec::new(),
        }
    }

    /// 注册通知渠道
    pub fn with_sender(mut self, id: impl Into<String>, sender: Arc<dyn NotificationSender>) -> Self {
        self.senders.insert(id.into(), sender);
        self
    }

    /// 添加默认发送器，所有通知都会经过默认发送器
    pub fn with_default_sender(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.default_senders.push(sender);
        self
    }

    /// 选出通知应送达的发送器
    fn route(&self, notification: &Notification) -> Vec<Arc<dyn NotificationSender>> {
        let routed = notification.service.notifiers.iter().filter_map(|id| {
            let sender = self.senders.get(id).cloned();
            if sender.is_none() {
                warn!("服务 {} 引用了未注册的通知渠道: {}", notification.service.name, id);
            }
            sender
        });

        self.default_senders.iter().cloned().chain(routed).collect()
    }

    /// 发送单条通知，发送失败只记录日志
    async fn deliver(&self, notification: &Notification) {
        let senders = self.route(notification);
        if senders.is_empty() {
            debug!("服务 {} 的通知没有可用的发送器", notification.service.name);
            return;
        }

        for sender in senders {
            if let Err(e) = sender.send(notification).await {
                error!(
                    "发送服务 {} 的通知失败: {:#}",
                    notification.service.name, e
                );
            }
        }
    }

    /// 持续分发通知，直到所有队列发送端都被丢弃
    pub async fn run(mut self) {
        info!("通知分发器启动");
        while let Some(notification) = self.rx.recv().await {
            self.deliver(&notification).await;
        }
        info!("通知分发器已停止");
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("senders", &self.senders.keys().collect::<Vec<_>>())
            .field("default_senders", &self.default_senders.len())
            .finish()
    }
}
