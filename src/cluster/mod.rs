//! Cluster membership, dispatch and shard routing
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                ClusterContext                 │
//! │  environment · collections · process log ·    │
//! │  notifications · metrics · job service        │
//! │                                               │
//! │   ┌───────────────────────────────────────┐   │
//! │   │            NodeRegistry               │   │
//! │   │  nodes ─ my_node ─ master_node        │   │
//! │   │  LoadBalancer (shard → nodes)         │   │
//! │   └───────────────────────────────────────┘   │
//! └──────────────┬───────────────────┬────────────┘
//!                │ self              │ peers
//!                ▼                   ▼
//!          LocalExecutor         Transport
//! ```
//!
//! # Modules
//!
//! - [`node`] - member identity and liveness
//! - [`balancer`] - per-shard round-robin selection
//! - [`registry`] - membership, dispatch and reconciliation
//! - [`context`] - per-node context handed to every job
//! - [`error`] - startup and runtime errors

pub mod balancer;
pub mod context;
pub mod error;
pub mod node;
pub mod registry;

pub use balancer::LoadBalancer;
pub use context::{ClusterContext, ClusterContextBuilder, Environment};
pub use error::{ClusterError, StartupError};
pub use node::{Node, NodeSnapshot, NodeStatus};
pub use registry::NodeRegistry;
