//! Process log for indexing runs
//!
//! Entries are kept in a bounded in-memory book and mirrored to `tracing`
//! under the `processlog` target.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingType {
    Full,
    Add,
}

impl std::fmt::Display for IndexingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Add => write!(f, "add"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Fail,
}

/// One process log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProcessLog {
    IndexingStart {
        collection_id: String,
        indexing_type: IndexingType,
        scheduled: bool,
        started_at: DateTime<Utc>,
    },
    IndexingFinish {
        collection_id: String,
        indexing_type: IndexingType,
        status: ResultStatus,
        scheduled: bool,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        message: Option<String>,
    },
}

impl ProcessLog {
    pub fn collection_id(&self) -> &str {
        match self {
            Self::IndexingStart { collection_id, .. } | Self::IndexingFinish { collection_id, .. } => {
                collection_id
            }
        }
    }
}

/// Bounded history of process log entries
#[derive(Debug)]
pub struct ProcessLogBook {
    entries: RwLock<VecDeque<ProcessLog>>,
    capacity: usize,
}

impl ProcessLogBook {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub async fn record(&self, entry: ProcessLog) {
        match &entry {
            ProcessLog::IndexingStart {
                collection_id,
                indexing_type,
                scheduled,
                ..
            } => {
                info!(target: "processlog", collection = %collection_id, %indexing_type, scheduled, "Indexing started");
            }
            ProcessLog::IndexingFinish {
                collection_id,
                indexing_type,
                status: ResultStatus::Success,
                ..
            } => {
                info!(target: "processlog", collection = %collection_id, %indexing_type, "Indexing finished");
            }
            ProcessLog::IndexingFinish {
                collection_id,
                indexing_type,
                status: ResultStatus::Fail,
                message,
                ..
            } => {
                warn!(target: "processlog", collection = %collection_id, %indexing_type, reason = ?message, "Indexing failed");
            }
        }

        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries oldest first
    pub async fn entries(&self) -> Vec<ProcessLog> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn for_collection(&self, collection_id: &str) -> Vec<ProcessLog> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.collection_id() == collection_id)
            .cloned()
            .collect()
    }
}

impl Default for ProcessLogBook {
    fn default() -> Self {
        Self::new(1000)
    }
}
