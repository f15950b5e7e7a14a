//! Notification channels
//!
//! A channel delivers one [`Notification`] somewhere: the log, or an HTTP
//! endpoint. Delivery problems are reported in the returned
//! [`DeliveryStatus`]; `Err` is reserved for a channel that cannot work at all.

pub mod log;
pub mod webhook;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notifications::Notification;

pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryStatus {
    pub delivered: bool,
    pub channel: String,
    pub detail: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl DeliveryStatus {
    pub fn delivered(channel: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            delivered: true,
            channel: channel.into(),
            detail: Some(detail.into()),
            attempted_at: Utc::now(),
        }
    }

    pub fn failed(channel: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            delivered: false,
            channel: channel.into(),
            detail: Some(detail.into()),
            attempted_at: Utc::now(),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.delivered { "DELIVERED" } else { "FAILED" };
        write!(f, "[{outcome}] {}", self.channel)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

/// Destination for notifications
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, notification: &Notification) -> ChannelResult<DeliveryStatus>;

    /// Check if the channel is reachable
    async fn health_check(&self) -> ChannelResult<bool> {
        Ok(true)
    }

    /// Channel configuration as JSON, without secrets
    fn config(&self) -> serde_json::Value {
        serde_json::json!({ "name": self.name() })
    }
}
