//! In-process transport
//!
//! Every node of one process binds an endpoint on a shared [`LoopbackHub`].
//! Requests still go through the binary codec: the job is encoded on the
//! sending side, decoded into a fresh job on the receiving side and handed to
//! the receiver's executor; the outcome travels back encoded as well.
//!
//! ```text
//!  LoopbackTransport(node1)          LoopbackHub           node2 executor
//!  ────────────────────────   encode  ─────────── decode   ──────────────
//!  send_request(node2, job) ───────▶ endpoint[node2] ─────▶ offer(job')
//!        ResultFuture ◀──── decode ◀── encode outcome ◀──────── run
//! ```
//!
//! Endpoints can be marked unreachable to simulate a partitioned peer.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::{Transport, TransportError};
use crate::cluster::Node;
use crate::job::codec::{decode_job, decode_outcome, encode_job, encode_outcome};
use crate::job::{CodecError, Job, JobFailure, JobOutcome, LocalExecutor, ResultFuture};

struct Endpoint {
    executor: Arc<dyn LocalExecutor>,
    home: PathBuf,
    reachable: AtomicBool,
}

/// Shared switchboard between the loopback transports of one process
#[derive(Default)]
pub struct LoopbackHub {
    endpoints: DashMap<String, Arc<Endpoint>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(
        &self,
        node_id: &str,
        executor: Arc<dyn LocalExecutor>,
        home: PathBuf,
    ) -> Result<(), TransportError> {
        match self.endpoints.entry(node_id.to_string()) {
            Entry::Occupied(_) => Err(TransportError::Bind {
                node_id: node_id.to_string(),
                reason: "endpoint already bound".to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Endpoint {
                    executor,
                    home,
                    reachable: AtomicBool::new(true),
                }));
                Ok(())
            }
        }
    }

    fn unbind(&self, node_id: &str) {
        self.endpoints.remove(node_id);
    }

    fn endpoint(&self, node_id: &str) -> Option<Arc<Endpoint>> {
        self.endpoints.get(node_id).map(|e| Arc::clone(e.value()))
    }

    pub fn is_bound(&self, node_id: &str) -> bool {
        self.endpoints.contains_key(node_id)
    }

    /// Simulate a partition; returns false if the node is not bound
    pub fn set_reachable(&self, node_id: &str, reachable: bool) -> bool {
        match self.endpoints.get(node_id) {
            Some(endpoint) => {
                endpoint.reachable.store(reachable, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub fn bound_nodes(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for LoopbackHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackHub")
            .field("endpoints", &self.bound_nodes())
            .finish()
    }
}

/// One node's view of the [`LoopbackHub`]
pub struct LoopbackTransport {
    hub: Arc<LoopbackHub>,
    node_id: String,
    executor: Arc<dyn LocalExecutor>,
    home: PathBuf,
    loaded: AtomicBool,
    sent: AtomicU64,
}

impl LoopbackTransport {
    pub fn new(
        hub: Arc<LoopbackHub>,
        node_id: impl Into<String>,
        executor: Arc<dyn LocalExecutor>,
        home: impl Into<PathBuf>,
    ) -> Self {
        Self {
            hub,
            node_id: node_id.into(),
            executor,
            home: home.into(),
            loaded: AtomicBool::new(false),
            sent: AtomicU64::new(0),
        }
    }

    /// Requests and files handed to a peer so far
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn ensure_loaded(&self) -> Result<(), TransportError> {
        if self.loaded.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(TransportError::NotLoaded)
        }
    }

    fn reachable_peer(&self, node: &Node) -> Result<Arc<Endpoint>, TransportError> {
        let endpoint = self.hub.endpoint(&node.id).ok_or_else(|| TransportError::Connect {
            node: node.id.clone(),
            reason: "no endpoint bound".to_string(),
        })?;
        if !endpoint.reachable.load(Ordering::Acquire) {
            return Err(TransportError::Unreachable(node.id.clone()));
        }
        Ok(endpoint)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn load(&self) -> Result<(), TransportError> {
        self.hub
            .bind(&self.node_id, Arc::clone(&self.executor), self.home.clone())?;
        self.loaded.store(true, Ordering::Release);
        debug!(node_id = %self.node_id, "Loopback endpoint bound");
        Ok(())
    }

    async fn unload(&self) -> Result<(), TransportError> {
        self.ensure_loaded()?;
        self.hub.unbind(&self.node_id);
        self.loaded.store(false, Ordering::Release);
        debug!(node_id = %self.node_id, "Loopback endpoint released");
        Ok(())
    }

    async fn connect(&self, node: &Node) -> Result<(), TransportError> {
        self.ensure_loaded()?;
        self.reachable_peer(node).map(|_| ())
    }

    async fn send_request(
        &self,
        node: &Node,
        job: Arc<dyn Job>,
    ) -> Result<ResultFuture<JobOutcome>, TransportError> {
        self.ensure_loaded()?;
        let peer = self.reachable_peer(node)?;

        let payload = encode_job(job.as_ref()).map_err(|e| match e {
            CodecError::NotStreamable(name) => TransportError::NotStreamable(name),
            other => TransportError::Codec(other),
        })?;
        let remote_job = decode_job(payload)?;
        let remote = peer.executor.offer(remote_job);
        self.sent.fetch_add(1, Ordering::Relaxed);

        let (completer, future) = ResultFuture::pending();
        let node_id = node.id.clone();
        tokio::spawn(async move {
            let outcome = remote.take().await.unwrap_or_else(|e| {
                Err(JobFailure::new(format!("execution on [{node_id}] ended: {e}")))
            });
            let reply = encode_outcome(&outcome)
                .and_then(decode_outcome)
                .unwrap_or_else(|e| Err(JobFailure::new(format!("malformed reply: {e}"))));
            let _ = completer.complete(reply);
        });

        Ok(future)
    }

    async fn send_file(
        &self,
        node: &Node,
        source: &Path,
        target: &Path,
    ) -> Result<ResultFuture<bool>, TransportError> {
        self.ensure_loaded()?;
        let peer = self.reachable_peer(node)?;

        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|e| TransportError::FileTransfer(format!("{}: {e}", source.display())))?;
        if !metadata.is_file() {
            return Err(TransportError::FileTransfer(format!(
                "{} is not a regular file",
                source.display()
            )));
        }

        let source = source.to_path_buf();
        let destination = peer.home.join(target);
        let (completer, future) = ResultFuture::pending();
        self.sent.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let copied = copy_file(&source, &destination).await;
            if let Err(e) = &copied {
                warn!(
                    source = %source.display(),
                    target = %destination.display(),
                    error = %e,
                    "Loopback file transfer failed"
                );
            }
            let _ = completer.complete(copied.is_ok());
        });

        Ok(future)
    }
}

/// Copy `source` to `destination`, creating parent directories
pub(crate) async fn copy_file(source: &Path, destination: &Path) -> std::io::Result<u64> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(source, destination).await
}
