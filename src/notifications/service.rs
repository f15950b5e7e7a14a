//! Notification fan-out

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use super::channels::{Channel, DeliveryStatus};
use super::{LogChannel, Notification};

const DEFAULT_HISTORY: usize = 200;

/// Sends each notification to every registered channel and keeps a history
pub struct NotificationService {
    channels: Vec<Arc<dyn Channel>>,
    history: RwLock<VecDeque<Notification>>,
    capacity: usize,
}

impl NotificationService {
    /// Service without any channel
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            history: RwLock::new(VecDeque::new()),
            capacity: DEFAULT_HISTORY,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_history(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Record `notification` and deliver it through every channel
    pub async fn notify(&self, notification: Notification) -> Vec<DeliveryStatus> {
        let mut statuses = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            match channel.send(&notification).await {
                Ok(status) => {
                    if !status.delivered {
                        warn!(channel = channel.name(), id = %notification.id, %status, "Notification not delivered");
                    }
                    statuses.push(status);
                }
                Err(e) => {
                    warn!(channel = channel.name(), id = %notification.id, error = %e, "Notification channel failed");
                    statuses.push(DeliveryStatus::failed(channel.name(), e.to_string()));
                }
            }
        }

        let mut history = self.history.write().await;
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(notification);

        statuses
    }

    /// Past notifications, oldest first
    pub async fn history(&self) -> Vec<Notification> {
        self.history.read().await.iter().cloned().collect()
    }
}

impl Default for NotificationService {
    /// Log channel only
    fn default() -> Self {
        Self::new().with_channel(Arc::new(LogChannel))
    }
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("channels", &self.channel_names())
            .field("capacity", &self.capacity)
            .finish()
    }
}
