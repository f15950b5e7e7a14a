//! Per-shard round-robin node selection
//!
//! Each shard maps to an immutable candidate list plus an atomic cursor.
//! [`LoadBalancer::update`] swaps the whole entry, so a concurrent reader sees
//! either the old list or the new one, never a mix.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::node::Node;

#[derive(Debug)]
struct ShardCandidates {
    nodes: Vec<Arc<Node>>,
    cursor: AtomicUsize,
}

/// Shard id to replica nodes, selected in rotation
#[derive(Debug, Default)]
pub struct LoadBalancer {
    shards: DashMap<String, Arc<ShardCandidates>>,
}

impl LoadBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the candidate list for `shard_id`; disabled nodes are dropped
    pub fn update(&self, shard_id: impl Into<String>, nodes: Vec<Arc<Node>>) {
        let nodes: Vec<_> = nodes.into_iter().filter(|n| n.enabled).collect();
        self.shards.insert(
            shard_id.into(),
            Arc::new(ShardCandidates {
                nodes,
                cursor: AtomicUsize::new(0),
            }),
        );
    }

    /// Next candidate for `shard_id`, or `None` if the shard is unknown or empty
    pub fn get_balanced_node(&self, shard_id: &str) -> Option<Arc<Node>> {
        // Clone the entry out so the map shard lock is not held while selecting.
        let entry = self.shards.get(shard_id).map(|e| Arc::clone(e.value()))?;
        if entry.nodes.is_empty() {
            return None;
        }
        let index = entry.cursor.fetch_add(1, Ordering::Relaxed) % entry.nodes.len();
        Some(Arc::clone(&entry.nodes[index]))
    }

    pub fn candidates(&self, shard_id: &str) -> Vec<Arc<Node>> {
        self.shards
            .get(shard_id)
            .map(|e| e.nodes.clone())
            .unwrap_or_default()
    }

    pub fn shard_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.shards.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}
