//! Units of work dispatched across the cluster
//!
//! Every job implements [`Job`]. Jobs that may cross the network additionally
//! implement [`StreamableJob`], which gives them a tag and an ordered binary
//! body (see [`codec`]). Jobs that only ever run in-process simply leave
//! [`Job::as_streamable`] at its default and are rejected by the transport.
//!
//! # Modules
//!
//! - [`future`] - single-slot completion handle returned by every dispatch
//! - [`codec`] - binary envelope for streamable jobs and their outcomes
//! - [`service`] - local executor that runs jobs on this node
//! - [`master`] - jobs that always execute on the master node
//! - [`cluster`] - membership housekeeping jobs
//! - [`indexing`] - collection indexing jobs

pub mod cluster;
pub mod codec;
pub mod future;
pub mod indexing;
pub mod master;
pub mod service;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::cluster::ClusterContext;

pub use cluster::{ClusterStatusJob, NodeDirectoryCleanJob, NodeHandshakeJob};
pub use codec::{CodecError, DataInput, DataOutput, JobEnvelope, JobKind};
pub use future::{Completer, ResultFuture, WaitError};
pub use indexing::{CollectionAddIndexingJob, MasterCollectionAddIndexingJob};
pub use master::{run_on_master, MasterNodeJob};
pub use service::{JobService, LocalExecutor};

/// Value carried by a successful job result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Bytes),
}

/// Application-level failure reported inside a delivered job result
///
/// This is distinct from a dispatch failure, where no result exists at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct JobFailure {
    pub message: String,
}

impl JobFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// What a job run produces; `Ok(None)` is a valid, empty success
pub type JobOutcome = Result<Option<JobValue>, JobFailure>;

/// How the registry resolves where a submitted job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobTarget {
    /// Runs on the node it is handed to
    #[default]
    Direct,
    /// Always runs on the current master node
    Master,
}

/// A unit of work that can be executed by a node
#[async_trait]
pub trait Job: Send + Sync + fmt::Debug {
    /// Short, stable name used in logs
    fn name(&self) -> &'static str;

    /// Whether this run was triggered by a timer rather than on demand
    fn is_scheduled(&self) -> bool {
        false
    }

    fn target(&self) -> JobTarget {
        JobTarget::Direct
    }

    /// Execute the job on the current node
    async fn run(&self, ctx: &ClusterContext) -> JobOutcome;

    /// Binary view of the job, if it may be sent to another node
    fn as_streamable(&self) -> Option<&dyn StreamableJob> {
        None
    }
}

/// A job with a stable binary encoding
///
/// Fields are written and read back in the same order; the envelope around
/// the body carries the [`JobKind`] tag and a version byte.
pub trait StreamableJob: Job {
    fn kind(&self) -> JobKind;

    fn write_to(&self, output: &mut DataOutput);

    fn read_from(input: &mut DataInput) -> Result<Self, CodecError>
    where
        Self: Sized;
}
