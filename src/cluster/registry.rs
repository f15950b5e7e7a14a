//! Node registry: membership and dispatch
//!
//! The registry owns the live node map together with the self and master
//! references, bootstraps connections at start, and decides for every request
//! whether it runs in-process or goes through the transport.
//!
//! ```text
//!                      ┌──────────────────────────────┐
//!   send_request ─────▶│ target == self ?             │
//!                      │   yes ─▶ LocalExecutor.offer │
//!                      │   no  ─▶ Transport.send      │──▶ peer
//!                      └──────────────────────────────┘
//!                        Err from transport ─▶ None
//! ```
//!
//! Membership is read-mostly. Reconciliation ([`NodeRegistry::update_node`])
//! and master changes take the write lock for the whole step, so readers never
//! observe a half-applied update.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use super::balancer::LoadBalancer;
use super::context::Environment;
use super::error::{ClusterError, StartupError};
use super::node::{Node, NodeSnapshot};
use crate::job::cluster::NodeHandshakeJob;
use crate::job::{Job, JobOutcome, JobTarget, LocalExecutor, ResultFuture};
use crate::metrics::ClusterMetrics;
use crate::settings::{NodeListSettings, SettingsStore};
use crate::transport::loopback::copy_file;
use crate::transport::{Transport, TransportError};

// ============================================================================
// Membership
// ============================================================================

/// Live node map plus the two distinguished references into it
#[derive(Debug)]
struct Membership {
    nodes: BTreeMap<String, Arc<Node>>,
    my_node: Arc<Node>,
    master_node: Arc<Node>,
}

impl Membership {
    fn build(
        node_list: &NodeListSettings,
        my_node_id: &str,
        master_node_id: &str,
    ) -> Result<Self, StartupError> {
        let mut nodes = BTreeMap::new();
        for settings in &node_list.nodes {
            let node = Arc::new(Node::from_settings(settings));
            if nodes.insert(settings.id.clone(), node).is_some() {
                return Err(StartupError::DuplicateNode {
                    node_id: settings.id.clone(),
                });
            }
        }

        let my_node = nodes
            .get(my_node_id)
            .cloned()
            .ok_or_else(|| StartupError::SelfNodeMissing {
                node_id: my_node_id.to_string(),
            })?;
        let master_node = nodes
            .get(master_node_id)
            .cloned()
            .ok_or_else(|| StartupError::MasterNodeMissing {
                node_id: master_node_id.to_string(),
            })?;

        Ok(Self {
            nodes,
            my_node,
            master_node,
        })
    }

    /// Insert or replace a node, keeping self and master references current
    fn put(&mut self, node: Arc<Node>) {
        if node.id == self.my_node.id {
            node.set_active();
            self.my_node = Arc::clone(&node);
        }
        if node.id == self.master_node.id {
            self.master_node = Arc::clone(&node);
        }
        self.nodes.insert(node.id.clone(), node);
    }

    fn active_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_active()).count()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Cluster membership view and request router of one node
pub struct NodeRegistry {
    my_node_id: String,
    environment: Environment,
    membership: RwLock<Membership>,
    balancer: LoadBalancer,
    transport: Arc<dyn Transport>,
    executor: Arc<dyn LocalExecutor>,
    settings: Arc<dyn SettingsStore>,
    metrics: Arc<ClusterMetrics>,
}

impl NodeRegistry {
    /// Build membership, bring up the transport and connect to enabled peers
    ///
    /// Peer connection failures are logged and leave the peer inactive; they
    /// never fail startup.
    pub async fn start(
        environment: Environment,
        node_list: &NodeListSettings,
        transport: Arc<dyn Transport>,
        executor: Arc<dyn LocalExecutor>,
        settings: Arc<dyn SettingsStore>,
        metrics: Arc<ClusterMetrics>,
    ) -> Result<Self, StartupError> {
        let membership = Membership::build(
            node_list,
            &environment.my_node_id,
            &environment.master_node_id,
        )?;
        membership.my_node.set_active();

        transport.load().await.map_err(StartupError::TransportLoad)?;

        let registry = Self {
            my_node_id: environment.my_node_id.clone(),
            environment,
            membership: RwLock::new(membership),
            balancer: LoadBalancer::new(),
            transport,
            executor,
            settings,
            metrics,
        };

        registry.connect_peers().await;
        registry.refresh_active_gauge().await;

        let master = registry.master_node().await;
        info!(
            node_id = %registry.my_node_id,
            master = %master,
            active = registry.active_count().await,
            "Node registry started"
        );
        Ok(registry)
    }

    async fn connect_peers(&self) {
        let peers: Vec<_> = self
            .node_list()
            .await
            .into_iter()
            .filter(|n| n.enabled && !self.is_my_node(n))
            .collect();

        join_all(peers.iter().map(|peer| self.connect_peer(peer))).await;
    }

    async fn connect_peer(&self, peer: &Arc<Node>) {
        match self.transport.connect(peer).await {
            Ok(()) => {
                peer.set_active();
                let handshake = Arc::new(NodeHandshakeJob::new(&self.my_node_id));
                if self.send_request(peer, handshake).await.is_some() {
                    debug!(node = %peer, "Handshake sent");
                }
            }
            Err(e) => {
                error!(node = %peer, error = %e, "Failed to connect to node");
                peer.set_inactive();
            }
        }
    }

    /// Tear down the transport
    pub async fn stop(&self) -> Result<(), TransportError> {
        self.transport.unload().await?;
        info!(node_id = %self.my_node_id, "Node registry stopped");
        Ok(())
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Run `job` on `node`
    ///
    /// Self-targeted jobs go to the local executor and never touch the
    /// transport. `None` means the dispatch itself failed; a delivered result
    /// may still carry an application failure.
    pub async fn send_request(
        &self,
        node: &Node,
        job: Arc<dyn Job>,
    ) -> Option<ResultFuture<JobOutcome>> {
        if self.is_my_node(node) {
            trace!(job = job.name(), "Executing job locally");
            self.metrics.record_local_execution();
            return Some(self.executor.offer(job));
        }

        let job_name = job.name();
        if !node.enabled {
            warn!(node = %node, job = job_name, "Refusing to dispatch to disabled node");
            self.metrics.record_transport_failure(&node.id);
            return None;
        }

        match self.transport.send_request(node, job).await {
            Ok(future) => {
                self.metrics.record_remote_dispatch(&node.id);
                Some(future)
            }
            Err(e) => {
                error!(node = %node, job = job_name, error = %e, "Failed to send request");
                self.metrics.record_transport_failure(&node.id);
                None
            }
        }
    }

    /// Run `job` on whichever node is master right now
    pub async fn send_request_to_master(
        &self,
        job: Arc<dyn Job>,
    ) -> Option<ResultFuture<JobOutcome>> {
        let master = self.master_node().await;
        self.send_request(&master, job).await
    }

    /// Route `job` by its own target: here, or the master
    pub async fn submit(&self, job: Arc<dyn Job>) -> Option<ResultFuture<JobOutcome>> {
        match job.target() {
            JobTarget::Direct => {
                let me = self.my_node().await;
                self.send_request(&me, job).await
            }
            JobTarget::Master => self.send_request_to_master(job).await,
        }
    }

    /// Send a regular file to `node`, landing at `target` under its home
    ///
    /// Returns `Ok(None)` for a directory source, and for a self-targeted
    /// send whose source equals the target as given or its resolved
    /// destination. Local copy failures are reported as
    /// [`TransportError::FileTransfer`].
    pub async fn send_file(
        &self,
        node: &Node,
        source: &Path,
        target: &Path,
    ) -> Result<Option<ResultFuture<bool>>, TransportError> {
        let is_dir = tokio::fs::metadata(source)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_dir {
            debug!(source = %source.display(), "Directory transfer is not supported");
            return Ok(None);
        }

        if !self.is_my_node(node) {
            if !node.enabled {
                warn!(node = %node, "Refusing to send file to disabled node");
                return Err(TransportError::Unreachable(node.id.clone()));
            }
            let future = self.transport.send_file(node, source, target).await?;
            self.metrics.record_file_transfer("remote");
            return Ok(Some(future));
        }

        let file_error = |e: std::io::Error| TransportError::FileTransfer(e.to_string());
        let source_abs = std::path::absolute(source).map_err(file_error)?;
        let destination = self.environment.file_path(target);
        if source_abs == std::path::absolute(target).map_err(file_error)?
            || source_abs == std::path::absolute(&destination).map_err(file_error)?
        {
            warn!(path = %source.display(), "Source and target are the same file, nothing to send");
            return Ok(None);
        }

        warn!(
            source = %source.display(),
            target = %destination.display(),
            "Target is this node, copying file locally"
        );
        copy_file(source, &destination).await.map_err(|e| {
            TransportError::FileTransfer(format!(
                "{} -> {}: {e}",
                source.display(),
                destination.display()
            ))
        })?;
        self.metrics.record_file_transfer("local_copy");

        Ok(Some(ResultFuture::ready(true)))
    }

    // ========================================================================
    // Reconfiguration
    // ========================================================================

    /// Reconcile live membership with a new node list, then persist it
    ///
    /// A shorter list removes only the first live id it no longer names; no
    /// connection is closed and in-flight work is left alone. Otherwise nodes
    /// with a changed endpoint are replaced by fresh inactive nodes and new
    /// ids are added as inactive. Self and master are never removed.
    pub async fn update_node(&self, node_list: NodeListSettings) -> Result<(), ClusterError> {
        let mut membership = self.membership.write().await;

        if node_list.len() < membership.nodes.len() {
            let missing = membership
                .nodes
                .keys()
                .find(|id| !node_list.contains(id))
                .cloned();
            if let Some(id) = missing {
                if id == membership.my_node.id || id == membership.master_node.id {
                    return Err(ClusterError::ProtectedNode(id));
                }
                membership.nodes.remove(&id);
                info!(node_id = %id, "Node removed from membership");
            }
        } else {
            for settings in &node_list.nodes {
                match membership.nodes.get(&settings.id) {
                    Some(existing) if existing.same_endpoint(&settings.address, settings.port) => {
                        trace!(node = %existing, "Node unchanged");
                    }
                    Some(existing) => {
                        let replacement = Arc::new(Node::from_settings(settings));
                        info!(old = %existing, new = %replacement, "Node endpoint changed, replacing");
                        membership.put(replacement);
                    }
                    None => {
                        let node = Arc::new(Node::from_settings(settings));
                        info!(node = %node, enabled = node.enabled, "Node added to membership");
                        membership.put(node);
                    }
                }
            }
        }

        self.refresh_balancer(&membership);
        self.metrics.set_active_nodes(membership.active_count());
        self.settings.persist(&node_list)?;
        Ok(())
    }

    /// Point shards at the current node objects, dropping removed ids
    ///
    /// Shards whose candidates are unchanged keep their rotation position.
    fn refresh_balancer(&self, membership: &Membership) {
        for shard_id in self.balancer.shard_ids() {
            let current = self.balancer.candidates(&shard_id);
            let nodes: Vec<_> = current
                .iter()
                .filter_map(|n| membership.nodes.get(&n.id).cloned())
                .collect();

            let unchanged = nodes.len() == current.len()
                && nodes.iter().zip(&current).all(|(a, b)| Arc::ptr_eq(a, b));
            if !unchanged {
                debug!(shard = %shard_id, candidates = nodes.len(), "Shard candidates refreshed");
                self.balancer.update(shard_id, nodes);
            }
        }
    }

    /// Designate another configured node as master
    pub async fn change_master(&self, node_id: &str) -> Result<(), ClusterError> {
        let mut membership = self.membership.write().await;
        let node = membership
            .nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| ClusterError::UnknownNode(node_id.to_string()))?;
        info!(old = %membership.master_node, new = %node, "Master node changed");
        membership.master_node = node;
        Ok(())
    }

    // ========================================================================
    // Load balancing
    // ========================================================================

    /// Set the replica nodes of a shard by id; unknown ids are skipped
    pub async fn update_load_balance(&self, shard_id: &str, node_ids: &[String]) {
        let nodes = self.nodes_by_ids(node_ids).await;
        debug!(shard = shard_id, candidates = nodes.len(), "Shard candidates updated");
        self.balancer.update(shard_id, nodes);
    }

    pub fn get_balanced_node(&self, shard_id: &str) -> Option<Arc<Node>> {
        let node = self.balancer.get_balanced_node(shard_id);
        match &node {
            Some(n) => debug!(shard = shard_id, node = %n, "Balanced node selected"),
            None => debug!(shard = shard_id, "No candidate for shard"),
        }
        node
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn my_node_id(&self) -> &str {
        &self.my_node_id
    }

    pub fn is_my_node(&self, node: &Node) -> bool {
        node.id == self.my_node_id
    }

    pub async fn my_node(&self) -> Arc<Node> {
        Arc::clone(&self.membership.read().await.my_node)
    }

    pub async fn master_node(&self) -> Arc<Node> {
        Arc::clone(&self.membership.read().await.master_node)
    }

    pub async fn is_master(&self) -> bool {
        self.membership.read().await.master_node.id == self.my_node_id
    }

    pub async fn node_by_id(&self, node_id: &str) -> Option<Arc<Node>> {
        self.membership.read().await.nodes.get(node_id).cloned()
    }

    pub async fn nodes_by_ids(&self, node_ids: &[String]) -> Vec<Arc<Node>> {
        let membership = self.membership.read().await;
        node_ids
            .iter()
            .filter_map(|id| membership.nodes.get(id).cloned())
            .collect()
    }

    /// All nodes ordered by id
    pub async fn node_list(&self) -> Vec<Arc<Node>> {
        self.membership.read().await.nodes.values().cloned().collect()
    }

    pub async fn active_count(&self) -> usize {
        self.membership.read().await.active_count()
    }

    async fn refresh_active_gauge(&self) {
        self.metrics.set_active_nodes(self.active_count().await);
    }

    /// Reporting view of every node, flagged with self and master
    pub async fn snapshot(&self) -> Vec<NodeSnapshot> {
        let membership = self.membership.read().await;
        membership
            .nodes
            .values()
            .map(|node| NodeSnapshot {
                is_self: node.id == membership.my_node.id,
                is_master: node.id == membership.master_node.id,
                ..node.snapshot()
            })
            .collect()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("my_node_id", &self.my_node_id)
            .field("balancer", &self.balancer)
            .finish_non_exhaustive()
    }
}
