//! Prometheus metrics for the node registry
//!
//! Tracks:
//! - Dispatch: local executions, remote dispatches and transport failures per peer
//! - File transfers by mode (`local_copy`, `remote`)
//! - Membership: number of active nodes
//!
//! # Usage
//!
//! Every [`ClusterContext`](crate::cluster::ClusterContext) owns one
//! [`ClusterMetrics`] with its own registry, so several nodes in one process
//! do not collide. [`ClusterMetrics::render`] produces the text exposition
//! format served on `/metrics`.

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

// ============================================================================
// Metrics Storage
// ============================================================================

/// Metrics for one node
#[derive(Debug, Clone)]
pub struct ClusterMetrics {
    registry: Registry,
    local_executions: IntCounter,
    remote_dispatches: IntCounterVec,
    transport_failures: IntCounterVec,
    file_transfers: IntCounterVec,
    active_nodes: IntGauge,
}

// ============================================================================
// Initialization
// ============================================================================

impl ClusterMetrics {
    /// Create and register all metrics, labelled with the owning node id
    pub fn new(node_id: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(
            Some("searchmesh".to_string()),
            Some(std::iter::once(("node".to_string(), node_id.to_string())).collect()),
        )?;

        let local_executions = IntCounter::new(
            "local_executions_total",
            "Jobs executed in-process because the target was this node",
        )?;
        let remote_dispatches = IntCounterVec::new(
            Opts::new(
                "remote_dispatches_total",
                "Jobs handed to the transport by target node",
            ),
            &["target"],
        )?;
        let transport_failures = IntCounterVec::new(
            Opts::new(
                "transport_failures_total",
                "Dispatches that produced no result by target node",
            ),
            &["target"],
        )?;
        let file_transfers = IntCounterVec::new(
            Opts::new("file_transfers_total", "File transfers by mode"),
            &["mode"],
        )?;
        let active_nodes = IntGauge::new("active_nodes", "Nodes currently marked active")?;

        registry.register(Box::new(local_executions.clone()))?;
        registry.register(Box::new(remote_dispatches.clone()))?;
        registry.register(Box::new(transport_failures.clone()))?;
        registry.register(Box::new(file_transfers.clone()))?;
        registry.register(Box::new(active_nodes.clone()))?;

        Ok(Self {
            registry,
            local_executions,
            remote_dispatches,
            transport_failures,
            file_transfers,
            active_nodes,
        })
    }

    // ========================================================================
    // Recording
    // ========================================================================

    pub fn record_local_execution(&self) {
        self.local_executions.inc();
    }

    pub fn record_remote_dispatch(&self, target: &str) {
        self.remote_dispatches.with_label_values(&[target]).inc();
    }

    pub fn record_transport_failure(&self, target: &str) {
        self.transport_failures.with_label_values(&[target]).inc();
    }

    pub fn record_file_transfer(&self, mode: &str) {
        self.file_transfers.with_label_values(&[mode]).inc();
    }

    pub fn set_active_nodes(&self, count: usize) {
        self.active_nodes.set(count as i64);
    }

    // ========================================================================
    // Reading
    // ========================================================================

    pub fn local_executions(&self) -> u64 {
        self.local_executions.get()
    }

    pub fn remote_dispatches(&self, target: &str) -> u64 {
        self.remote_dispatches.with_label_values(&[target]).get()
    }

    pub fn transport_failures(&self, target: &str) -> u64 {
        self.transport_failures.with_label_values(&[target]).get()
    }

    pub fn active_nodes(&self) -> i64 {
        self.active_nodes.get()
    }

    /// Encode all metrics to Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
