//! searchmesh - cluster coordination for a distributed search engine
//!
//! Tracks which nodes form the cluster, dispatches jobs to them (running
//! them in-process when the target is the local node) and load-balances
//! shard reads across the nodes holding each shard.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`cluster`] - membership registry, per-node context and shard balancer
//! - [`job`] - job model, wire codec, result futures and the local executor
//! - [`transport`] - pluggable node-to-node transport
//! - [`settings`] - persisted node list
//! - [`collections`] - collection and shard layout
//! - [`processlog`] - indexing process log
//! - [`notifications`] - operator notifications and delivery channels
//! - [`metrics`] - Prometheus metrics
//! - [`admin`] - HTTP status endpoints
//! - [`config`] - configuration management
//! - [`error`] - unified error type
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use searchmesh::config::ClusterConfig;
//! use searchmesh::job::MasterCollectionAddIndexingJob;
//! use searchmesh::transport::LoopbackHub;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClusterConfig::from_file(Path::new("config/cluster.toml"))?;
//!     let context = config.context_builder(Arc::new(LoopbackHub::new()))?.start().await?;
//!
//!     let job = Arc::new(MasterCollectionAddIndexingJob::new("news"));
//!     if let Some(result) = context.registry.submit(job).await {
//!         println!("{:?}", result.take().await?);
//!     }
//!     context.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod cluster;
pub mod collections;
pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod notifications;
pub mod processlog;
pub mod settings;
pub mod transport;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cluster::{ClusterContext, Environment, Node, NodeRegistry, NodeStatus};
    pub use crate::config::ClusterConfig;
    pub use crate::error::{Error, ErrorCategory, Result, SearchmeshErrorTrait};
    pub use crate::job::{Job, JobFailure, JobOutcome, JobTarget, JobValue, ResultFuture};
    pub use crate::settings::{NodeListSettings, NodeSettings};
    pub use crate::transport::{LoopbackHub, Transport};
}

pub use error::{Error, Result};
