//! Operator notifications
//!
//! Raised on failure paths that an operator should hear about, such as an
//! indexing run that could not be dispatched to its index node.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │      NotificationService                   │
//! │  - Bounded history                         │
//! │  - Fan-out to every channel                │
//! └────────────────────────────────────────────┘
//!                     │
//!              ┌──────┴──────┐
//!              ▼             ▼
//!        ┌─────────┐   ┌─────────┐
//!        │   Log   │   │ Webhook │
//!        │ Channel │   │ Channel │
//!        └─────────┘   └─────────┘
//! ```

pub mod channels;
mod service;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::processlog::IndexingType;

pub use channels::log::LogChannel;
pub use channels::webhook::{WebhookChannel, WebhookConfig};
pub use channels::{Channel, ChannelError, DeliveryStatus};
pub use service::NotificationService;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    IndexingFailed,
}

impl NotificationKind {
    /// Stable message code
    pub fn code(&self) -> &'static str {
        match self {
            Self::IndexingFailed => "MSG-01001",
        }
    }
}

/// One notification with its context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub severity: Severity,
    pub message: String,
    pub metadata: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            severity,
            message: message.into(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// An indexing run could not be started on its index node
    pub fn indexing_failed(
        collection_id: &str,
        indexing_type: IndexingType,
        started_at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            NotificationKind::IndexingFailed,
            Severity::Critical,
            format!("{indexing_type} indexing of collection [{collection_id}] failed"),
        )
        .with_metadata("collection", collection_id)
        .with_metadata("indexing_type", indexing_type.to_string())
        .with_metadata("started_at", started_at.to_rfc3339())
        .with_metadata("reason", reason)
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Format for display
    pub fn format_message(&self) -> String {
        format!(
            "[{severity}] {code} {message}\nCreated: {created}",
            severity = self.severity.as_str().to_uppercase(),
            code = self.code(),
            message = self.message,
            created = self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}
