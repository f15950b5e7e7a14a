//! Cluster member identity and liveness

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::settings::NodeSettings;

// ============================================================================
// Node Status
// ============================================================================

/// Liveness of a node as last observed by this process
///
/// Advisory only: dispatch never checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Inactive,
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::Inactive
    }
}

// ============================================================================
// Node
// ============================================================================

/// One cluster member
///
/// Identity and `enabled` are fixed at construction. A changed endpoint is
/// handled by building a new `Node`, never by mutating this one.
#[derive(Debug)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub enabled: bool,
    active: AtomicBool,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        enabled: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            port,
            enabled,
            active: AtomicBool::new(false),
        }
    }

    pub fn from_settings(settings: &NodeSettings) -> Self {
        Self::new(
            &settings.id,
            &settings.name,
            &settings.address,
            settings.port,
            settings.enabled,
        )
    }

    pub fn status(&self) -> NodeStatus {
        if self.is_active() {
            NodeStatus::Active
        } else {
            NodeStatus::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn set_active(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub fn set_inactive(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Whether this node listens on the given endpoint
    pub fn same_endpoint(&self, address: &str, port: u16) -> bool {
        self.address == address && self.port == port
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
            port: self.port,
            enabled: self.enabled,
            status: self.status(),
            is_self: false,
            is_master: false,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:{})", self.id, self.address, self.port)
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time view of a node for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub enabled: bool,
    pub status: NodeStatus,

    /// Set by the registry
    #[serde(default)]
    pub is_self: bool,

    /// Set by the registry
    #[serde(default)]
    pub is_master: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_is_inactive() {
        let node = Node::new("node1", "Node 1", "127.0.0.1", 9090, true);
        assert_eq!(node.status(), NodeStatus::Inactive);

        node.set_active();
        assert!(node.is_active());

        node.set_inactive();
        assert_eq!(node.status(), NodeStatus::Inactive);
    }

    #[test]
    fn test_equality_is_by_id() {
        let a = Node::new("node1", "A", "10.0.0.1", 9090, true);
        let b = Node::new("node1", "B", "10.0.0.2", 9191, false);
        let c = Node::new("node2", "A", "10.0.0.1", 9090, true);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_same_endpoint() {
        let node = Node::new("node1", "Node 1", "10.0.0.1", 9090, true);
        assert!(node.same_endpoint("10.0.0.1", 9090));
        assert!(!node.same_endpoint("10.0.0.1", 9091));
        assert!(!node.same_endpoint("10.0.0.2", 9090));
    }

    #[test]
    fn test_snapshot_serializes_lowercase_status() {
        let node = Node::new("node1", "Node 1", "127.0.0.1", 9090, true);
        node.set_active();

        let json = serde_json::to_value(node.snapshot()).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["id"], "node1");
    }

    #[test]
    fn test_display() {
        let node = Node::new("node1", "Node 1", "127.0.0.1", 9090, true);
        assert_eq!(node.to_string(), "node1(127.0.0.1:9090)");
    }
}
