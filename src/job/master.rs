//! Jobs whose work always runs on the master node
//!
//! A [`MasterNodeJob`] can be submitted anywhere. When it runs on a node that
//! is not the master, [`run_on_master`] forwards a copy of the job to the
//! current master and waits for that node's result. On the master itself the
//! job's real work, [`MasterNodeJob::run_as_master`], executes directly.
//!
//! ```text
//!   node B (not master)                   node A (master)
//!   ───────────────────                   ───────────────
//!   job.run(ctx)
//!     └─ run_on_master ── send_request ──▶ job.run(ctx)
//!                                           └─ run_on_master
//!                                                └─ run_as_master
//!        take_timeout ◀──────── outcome ───────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use super::{JobFailure, JobOutcome, StreamableJob};
use crate::cluster::ClusterContext;

/// A streamable job that executes logically on the master
#[async_trait]
pub trait MasterNodeJob: StreamableJob + Clone + 'static {
    /// The job's work, called only on the master node
    async fn run_as_master(&self, ctx: &ClusterContext) -> JobOutcome;
}

/// Run `job` on the master, forwarding it if this node is not the master
///
/// A dispatch that produces no future is reported as a failure; the job's own
/// failure side effects belong in [`MasterNodeJob::run_as_master`].
pub async fn run_on_master<J: MasterNodeJob>(job: &J, ctx: &ClusterContext) -> JobOutcome {
    if ctx.registry.is_master().await {
        return job.run_as_master(ctx).await;
    }

    let master = ctx.registry.master_node().await;
    debug!(job = job.name(), master = %master, "Forwarding job to master");

    let Some(future) = ctx.registry.send_request(&master, Arc::new(job.clone())).await else {
        error!(job = job.name(), master = %master, "Could not reach master node");
        return Err(JobFailure::new(format!(
            "master node [{}] is unreachable",
            master.id
        )));
    };

    future
        .take_timeout(ctx.request_timeout)
        .await
        .unwrap_or_else(|e| {
            Err(JobFailure::new(format!(
                "no result from master node [{}]: {e}",
                master.id
            )))
        })
}
