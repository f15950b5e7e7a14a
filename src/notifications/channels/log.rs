//! Channel that writes notifications to the tracing log

use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{Channel, ChannelResult, DeliveryStatus};
use crate::notifications::{Notification, Severity};

/// Logs every notification under the `notification` target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> ChannelResult<DeliveryStatus> {
        let n = notification;
        match n.severity {
            Severity::Critical => {
                error!(target: "notification", code = n.code(), id = %n.id, metadata = ?n.metadata, "{}", n.message)
            }
            Severity::Warning => {
                warn!(target: "notification", code = n.code(), id = %n.id, metadata = ?n.metadata, "{}", n.message)
            }
            Severity::Info => {
                info!(target: "notification", code = n.code(), id = %n.id, metadata = ?n.metadata, "{}", n.message)
            }
        }
        Ok(DeliveryStatus::delivered("log", n.severity.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationKind;

    #[tokio::test]
    async fn test_log_channel_always_delivers() {
        let n = Notification::new(NotificationKind::IndexingFailed, Severity::Critical, "boom");
        let status = LogChannel.send(&n).await.unwrap();

        assert!(status.delivered);
        assert_eq!(status.channel, "log");
        assert!(LogChannel.health_check().await.unwrap());
    }
}
