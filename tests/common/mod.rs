//! Common test utilities

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use searchmesh::cluster::{ClusterContext, Environment, Node, StartupError};
use searchmesh::collections::{CollectionCatalog, CollectionSettings, ShardSettings};
use searchmesh::job::{Job, JobOutcome, JobValue, ResultFuture};
use searchmesh::settings::{MemorySettingsStore, NodeListSettings, NodeSettings};
use searchmesh::transport::{LoopbackHub, Transport, TransportError, TransportKind};

/// Transport double that counts calls and can be told to fail
#[derive(Default)]
pub struct RecordingTransport {
    connects: AtomicUsize,
    requests: AtomicUsize,
    files: AtomicUsize,
    unloads: AtomicUsize,
    fail_load: AtomicBool,
    fail_connect: AtomicBool,
    fail_send: AtomicBool,
    sent: Mutex<Vec<(String, &'static str)>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_load() -> Arc<Self> {
        let transport = Self::default();
        transport.fail_load.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn files(&self) -> usize {
        self.files.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    /// (target node, job name) of every request handed over
    pub fn sent(&self) -> Vec<(String, &'static str)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn load(&self) -> Result<(), TransportError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(TransportError::Bind {
                node_id: "test".into(),
                reason: "port in use".into(),
            });
        }
        Ok(())
    }

    async fn unload(&self) -> Result<(), TransportError> {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(&self, node: &Node) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                node: node.id.clone(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    async fn send_request(
        &self,
        node: &Node,
        job: Arc<dyn Job>,
    ) -> Result<ResultFuture<JobOutcome>, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(node.id.clone()));
        }
        self.sent.lock().unwrap().push((node.id.clone(), job.name()));
        Ok(ResultFuture::ready(Ok(Some(JobValue::Bool(true)))))
    }

    async fn send_file(
        &self,
        node: &Node,
        _source: &Path,
        _target: &Path,
    ) -> Result<ResultFuture<bool>, TransportError> {
        self.files.fetch_add(1, Ordering::SeqCst);
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(node.id.clone()));
        }
        Ok(ResultFuture::ready(true))
    }
}

/// Node list with consecutive ports on localhost
pub fn node_list(ids: &[&str]) -> NodeListSettings {
    NodeListSettings::new(
        ids.iter()
            .enumerate()
            .map(|(i, id)| NodeSettings::new(*id, "127.0.0.1", 9100 + i as u16))
            .collect(),
    )
}

/// One collection indexed on `index_node` with a single shard on `data_nodes`
pub fn catalog(collection_id: &str, index_node: &str, data_nodes: &[&str]) -> CollectionCatalog {
    CollectionCatalog::new(vec![CollectionSettings {
        id: collection_id.to_string(),
        index_node: index_node.to_string(),
        shards: vec![ShardSettings {
            id: format!("{collection_id}_0"),
            data_nodes: data_nodes.iter().map(|s| s.to_string()).collect(),
        }],
    }])
}

/// Start a context over a [`RecordingTransport`]
pub async fn start_recording(
    home: &Path,
    nodes: NodeListSettings,
    my_node_id: &str,
    master_node_id: &str,
    transport: Arc<RecordingTransport>,
) -> Result<(Arc<ClusterContext>, Arc<MemorySettingsStore>), StartupError> {
    let settings = Arc::new(MemorySettingsStore::new(nodes));
    let context = ClusterContext::builder(
        Environment::new(home, my_node_id, master_node_id),
        settings.clone(),
    )
    .transport(transport)
    .start()
    .await?;
    Ok((context, settings))
}

/// Start one node of an in-process cluster on `hub`
pub async fn start_loopback(
    home: &Path,
    hub: &Arc<LoopbackHub>,
    nodes: &NodeListSettings,
    my_node_id: &str,
    master_node_id: &str,
    collections: CollectionCatalog,
) -> Arc<ClusterContext> {
    ClusterContext::builder(
        Environment::new(home.join(my_node_id), my_node_id, master_node_id),
        Arc::new(MemorySettingsStore::new(nodes.clone())),
    )
    .collections(collections)
    .transport_kind(TransportKind::Loopback, Arc::clone(hub))
    .start()
    .await
    .unwrap()
}
