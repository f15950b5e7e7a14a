//! Transport capability used by the node registry
//!
//! The registry only needs a small contract from the network layer: a
//! load/unload lifecycle, connecting to a peer, sending a job and sending a
//! file. Both send operations hand back a [`ResultFuture`] that the transport
//! completes when the peer answers.
//!
//! Implementations are selected by [`TransportKind`] through
//! [`create_transport`].

pub mod loopback;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cluster::Node;
use crate::job::{CodecError, Job, JobOutcome, LocalExecutor, ResultFuture};

pub use loopback::{LoopbackHub, LoopbackTransport};

/// Transport-level failures
///
/// Any of these means no result exists for the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not loaded")]
    NotLoaded,

    #[error("could not bind endpoint for node [{node_id}]: {reason}")]
    Bind { node_id: String, reason: String },

    #[error("could not connect to node [{node}]: {reason}")]
    Connect { node: String, reason: String },

    #[error("node [{0}] is unreachable")]
    Unreachable(String),

    #[error("job '{0}' cannot be sent over the network")]
    NotStreamable(&'static str),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("file transfer failed: {0}")]
    FileTransfer(String),
}

/// Network capability the registry dispatches through
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bring the transport up
    async fn load(&self) -> Result<(), TransportError>;

    /// Tear the transport down
    async fn unload(&self) -> Result<(), TransportError>;

    async fn connect(&self, node: &Node) -> Result<(), TransportError>;

    /// Send a job for execution on `node`
    async fn send_request(
        &self,
        node: &Node,
        job: Arc<dyn Job>,
    ) -> Result<ResultFuture<JobOutcome>, TransportError>;

    /// Send a regular file to `target` under the peer's home
    async fn send_file(
        &self,
        node: &Node,
        source: &Path,
        target: &Path,
    ) -> Result<ResultFuture<bool>, TransportError>;
}

/// Available transport implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process hub shared by every node of one process
    #[default]
    Loopback,
}

/// What a transport needs to know about the node it serves
pub struct TransportSetup {
    pub node_id: String,
    pub home: PathBuf,
    pub executor: Arc<dyn LocalExecutor>,
    pub hub: Arc<LoopbackHub>,
}

/// Build the transport selected by `kind`
pub fn create_transport(kind: TransportKind, setup: TransportSetup) -> Arc<dyn Transport> {
    match kind {
        TransportKind::Loopback => Arc::new(LoopbackTransport::new(
            setup.hub,
            setup.node_id,
            setup.executor,
            setup.home,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_kind_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: TransportKind,
        }

        let parsed: Wrapper = toml::from_str(r#"kind = "loopback""#).unwrap();
        assert_eq!(parsed.kind, TransportKind::Loopback);
        assert!(toml::from_str::<Wrapper>(r#"kind = "carrier-pigeon""#).is_err());
    }

    #[test]
    fn test_codec_error_converts() {
        let err: TransportError = CodecError::UnknownTag(7).into();
        assert!(matches!(err, TransportError::Codec(CodecError::UnknownTag(7))));
    }
}
