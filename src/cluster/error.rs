//! Cluster error types

use crate::settings::SettingsError;
use crate::transport::TransportError;

/// Fatal conditions that abort node startup
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("[{code}] node [{node_id}] (self) is not in the node list", code = Self::SELF_NODE_MISSING)]
    SelfNodeMissing { node_id: String },

    #[error("[{code}] master node [{node_id}] is not in the node list", code = Self::MASTER_NODE_MISSING)]
    MasterNodeMissing { node_id: String },

    #[error("[{code}] node id [{node_id}] appears more than once", code = Self::DUPLICATE_NODE)]
    DuplicateNode { node_id: String },

    #[error("[{code}] transport could not be loaded: {0}", code = Self::TRANSPORT_LOAD)]
    TransportLoad(#[source] TransportError),

    #[error("[{code}] metrics registry could not be built: {0}", code = Self::METRICS)]
    Metrics(#[from] prometheus::Error),
}

impl StartupError {
    pub const SELF_NODE_MISSING: &'static str = "ERR-00300";
    pub const MASTER_NODE_MISSING: &'static str = "ERR-00301";
    pub const DUPLICATE_NODE: &'static str = "ERR-00302";
    pub const TRANSPORT_LOAD: &'static str = "ERR-00305";
    pub const METRICS: &'static str = "ERR-00309";

    /// Stable code for operators and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::SelfNodeMissing { .. } => Self::SELF_NODE_MISSING,
            Self::MasterNodeMissing { .. } => Self::MASTER_NODE_MISSING,
            Self::DuplicateNode { .. } => Self::DUPLICATE_NODE,
            Self::TransportLoad(_) => Self::TRANSPORT_LOAD,
            Self::Metrics(_) => Self::METRICS,
        }
    }
}

/// Errors from runtime membership operations
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("unknown node [{0}]")]
    UnknownNode(String),

    #[error("node [{0}] cannot be removed while it is self or master")]
    ProtectedNode(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Startup(#[from] StartupError),
}
