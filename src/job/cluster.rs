//! Membership housekeeping jobs
//!
//! - [`NodeHandshakeJob`] - identity announcement sent right after connecting
//! - [`NodeDirectoryCleanJob`] - removes a directory (and its numbered
//!   successors) under the receiving node's home
//! - [`ClusterStatusJob`] - local-only report of the membership view

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{
    CodecError, DataInput, DataOutput, Job, JobFailure, JobKind, JobOutcome, JobValue,
    StreamableJob,
};
use crate::cluster::ClusterContext;

// ============================================================================
// Handshake
// ============================================================================

/// Announces the sending node to the receiver, which marks it active
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandshakeJob {
    pub node_id: String,
}

impl NodeHandshakeJob {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

#[async_trait]
impl Job for NodeHandshakeJob {
    fn name(&self) -> &'static str {
        "node_handshake"
    }

    async fn run(&self, ctx: &ClusterContext) -> JobOutcome {
        match ctx.registry.node_by_id(&self.node_id).await {
            Some(node) => {
                node.set_active();
                ctx.metrics.set_active_nodes(ctx.registry.active_count().await);
                info!(node = %node, "Handshake received");
                Ok(Some(JobValue::Bool(true)))
            }
            None => {
                warn!(node_id = %self.node_id, "Handshake from unknown node");
                Err(JobFailure::new(format!(
                    "node [{}] is not a cluster member",
                    self.node_id
                )))
            }
        }
    }

    fn as_streamable(&self) -> Option<&dyn StreamableJob> {
        Some(self)
    }
}

impl StreamableJob for NodeHandshakeJob {
    fn kind(&self) -> JobKind {
        JobKind::NodeHandshake
    }

    fn write_to(&self, output: &mut DataOutput) {
        output.write_string(&self.node_id);
    }

    fn read_from(input: &mut DataInput) -> Result<Self, CodecError> {
        Ok(Self {
            node_id: input.read_string()?,
        })
    }
}

// ============================================================================
// Directory clean
// ============================================================================

/// Deletes a directory relative to the node home
///
/// When the last path segment is a number, directories with the following
/// numbers are removed too while they exist (`3` also removes `4`, `5`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDirectoryCleanJob {
    pub directory: PathBuf,
}

impl NodeDirectoryCleanJob {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl Job for NodeDirectoryCleanJob {
    fn name(&self) -> &'static str {
        "node_directory_clean"
    }

    async fn run(&self, ctx: &ClusterContext) -> JobOutcome {
        if !is_contained(&self.directory) {
            return Err(JobFailure::new(format!(
                "directory {} is outside the node home",
                self.directory.display()
            )));
        }

        let target = ctx.environment.file_path(&self.directory);
        info!(directory = %target.display(), "Deleting directory");

        remove_directory_cascade(&target)
            .await
            .map_err(|e| JobFailure::new(format!("failed to delete {}: {e}", target.display())))?;

        Ok(Some(JobValue::Bool(true)))
    }

    fn as_streamable(&self) -> Option<&dyn StreamableJob> {
        Some(self)
    }
}

impl StreamableJob for NodeDirectoryCleanJob {
    fn kind(&self) -> JobKind {
        JobKind::NodeDirectoryClean
    }

    fn write_to(&self, output: &mut DataOutput) {
        output.write_string(&self.directory.to_string_lossy());
    }

    fn read_from(input: &mut DataInput) -> Result<Self, CodecError> {
        Ok(Self {
            directory: PathBuf::from(input.read_string()?),
        })
    }
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

async fn remove_directory_cascade(directory: &Path) -> std::io::Result<()> {
    remove_if_exists(directory).await?;

    let numbered = directory
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.parse::<u64>().ok());
    let Some(mut sequence) = numbered else {
        return Ok(());
    };

    loop {
        sequence += 1;
        let sibling = directory.with_file_name(sequence.to_string());
        if !tokio::fs::try_exists(&sibling).await? {
            return Ok(());
        }
        debug!(directory = %sibling.display(), "Deleting consecutive directory");
        tokio::fs::remove_dir_all(&sibling).await?;
    }
}

async fn remove_if_exists(directory: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(directory).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

// ============================================================================
// Status
// ============================================================================

/// Reports the local membership view as JSON; never leaves the node
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterStatusJob;

#[async_trait]
impl Job for ClusterStatusJob {
    fn name(&self) -> &'static str {
        "cluster_status"
    }

    async fn run(&self, ctx: &ClusterContext) -> JobOutcome {
        let snapshot = ctx.registry.snapshot().await;
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| JobFailure::new(format!("failed to encode status: {e}")))?;
        Ok(Some(JobValue::Text(json)))
    }
}
