//! Collection indexing jobs
//!
//! [`MasterCollectionAddIndexingJob`] is the entry point: it is forwarded to
//! the master, which looks up the collection's index node and hands a
//! [`CollectionAddIndexingJob`] to it. Only a failed hand-off (no result at
//! all) is recorded as a failed run and raises a notification. A failure
//! reported by the index node inside its result is returned as-is.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use super::master::{run_on_master, MasterNodeJob};
use super::{
    CodecError, DataInput, DataOutput, Job, JobFailure, JobKind, JobOutcome, JobTarget, JobValue,
    StreamableJob,
};
use crate::cluster::ClusterContext;
use crate::notifications::Notification;
use crate::processlog::{IndexingType, ProcessLog, ResultStatus};

fn write_collection_args(output: &mut DataOutput, collection_id: &str, scheduled: bool) {
    output.write_string(collection_id);
    output.write_bool(scheduled);
}

fn read_collection_args(input: &mut DataInput) -> Result<(String, bool), CodecError> {
    Ok((input.read_string()?, input.read_bool()?))
}

// ============================================================================
// Index node side
// ============================================================================

/// Incremental indexing run for one collection, executed on its index node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionAddIndexingJob {
    pub collection_id: String,
    pub scheduled: bool,
}

impl CollectionAddIndexingJob {
    pub fn new(collection_id: impl Into<String>, scheduled: bool) -> Self {
        Self {
            collection_id: collection_id.into(),
            scheduled,
        }
    }
}

#[async_trait]
impl Job for CollectionAddIndexingJob {
    fn name(&self) -> &'static str {
        "collection_add_indexing"
    }

    fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    async fn run(&self, ctx: &ClusterContext) -> JobOutcome {
        if ctx.collections.get(&self.collection_id).is_none() {
            return Err(JobFailure::new(format!(
                "collection [{}] does not exist",
                self.collection_id
            )));
        }

        let started_at = Utc::now();
        ctx.process_log
            .record(ProcessLog::IndexingStart {
                collection_id: self.collection_id.clone(),
                indexing_type: IndexingType::Add,
                scheduled: self.scheduled,
                started_at,
            })
            .await;

        info!(collection = %self.collection_id, scheduled = self.scheduled, "Add indexing run");

        ctx.process_log
            .record(ProcessLog::IndexingFinish {
                collection_id: self.collection_id.clone(),
                indexing_type: IndexingType::Add,
                status: ResultStatus::Success,
                scheduled: self.scheduled,
                started_at,
                finished_at: Utc::now(),
                message: None,
            })
            .await;

        Ok(Some(JobValue::Text(self.collection_id.clone())))
    }

    fn as_streamable(&self) -> Option<&dyn StreamableJob> {
        Some(self)
    }
}

impl StreamableJob for CollectionAddIndexingJob {
    fn kind(&self) -> JobKind {
        JobKind::CollectionAddIndexing
    }

    fn write_to(&self, output: &mut DataOutput) {
        write_collection_args(output, &self.collection_id, self.scheduled);
    }

    fn read_from(input: &mut DataInput) -> Result<Self, CodecError> {
        let (collection_id, scheduled) = read_collection_args(input)?;
        Ok(Self {
            collection_id,
            scheduled,
        })
    }
}

// ============================================================================
// Master side
// ============================================================================

/// Starts an add-indexing run from any node, coordinated by the master
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterCollectionAddIndexingJob {
    pub collection_id: String,
    pub scheduled: bool,
}

impl MasterCollectionAddIndexingJob {
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            scheduled: false,
        }
    }

    pub fn scheduled(mut self, scheduled: bool) -> Self {
        self.scheduled = scheduled;
        self
    }

    async fn report_dispatch_failure(
        &self,
        ctx: &ClusterContext,
        index_node: &str,
        started_at: DateTime<Utc>,
    ) {
        let message = format!("could not dispatch indexing to node [{index_node}]");

        ctx.process_log
            .record(ProcessLog::IndexingFinish {
                collection_id: self.collection_id.clone(),
                indexing_type: IndexingType::Add,
                status: ResultStatus::Fail,
                scheduled: self.scheduled,
                started_at,
                finished_at: Utc::now(),
                message: Some(message.clone()),
            })
            .await;

        ctx.notifications
            .notify(Notification::indexing_failed(
                &self.collection_id,
                IndexingType::Add,
                started_at,
                message,
            ))
            .await;
    }
}

#[async_trait]
impl Job for MasterCollectionAddIndexingJob {
    fn name(&self) -> &'static str {
        "master_collection_add_indexing"
    }

    fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    fn target(&self) -> JobTarget {
        JobTarget::Master
    }

    async fn run(&self, ctx: &ClusterContext) -> JobOutcome {
        run_on_master(self, ctx).await
    }

    fn as_streamable(&self) -> Option<&dyn StreamableJob> {
        Some(self)
    }
}

#[async_trait]
impl MasterNodeJob for MasterCollectionAddIndexingJob {
    async fn run_as_master(&self, ctx: &ClusterContext) -> JobOutcome {
        let collection = ctx.collections.get(&self.collection_id).ok_or_else(|| {
            JobFailure::new(format!("collection [{}] does not exist", self.collection_id))
        })?;

        let index_node = ctx
            .registry
            .node_by_id(&collection.index_node)
            .await
            .ok_or_else(|| {
                JobFailure::new(format!(
                    "index node [{}] of collection [{}] is not a cluster member",
                    collection.index_node, self.collection_id
                ))
            })?;

        let started_at = Utc::now();
        let job = CollectionAddIndexingJob::new(&self.collection_id, self.scheduled);
        let Some(future) = ctx.registry.send_request(&index_node, Arc::new(job)).await else {
            error!(
                collection = %self.collection_id,
                node = %index_node,
                "Indexing dispatch failed"
            );
            self.report_dispatch_failure(ctx, &index_node.id, started_at)
                .await;
            return Err(JobFailure::new(format!(
                "indexing of [{}] could not be dispatched to [{}]",
                self.collection_id, index_node.id
            )));
        };

        future
            .take_timeout(ctx.request_timeout)
            .await
            .unwrap_or_else(|e| {
                Err(JobFailure::new(format!(
                    "no indexing result from [{}]: {e}",
                    index_node.id
                )))
            })
    }
}

impl StreamableJob for MasterCollectionAddIndexingJob {
    fn kind(&self) -> JobKind {
        JobKind::MasterCollectionAddIndexing
    }

    fn write_to(&self, output: &mut DataOutput) {
        write_collection_args(output, &self.collection_id, self.scheduled);
    }

    fn read_from(input: &mut DataInput) -> Result<Self, CodecError> {
        let (collection_id, scheduled) = read_collection_args(input)?;
        Ok(Self {
            collection_id,
            scheduled,
        })
    }
}
