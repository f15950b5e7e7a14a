//! Integration tests for cluster membership, dispatch and indexing

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use common::{catalog, node_list, start_loopback, start_recording, RecordingTransport};
use searchmesh::cluster::{ClusterContext, ClusterError, Environment, NodeStatus, StartupError};
use searchmesh::collections::CollectionCatalog;
use searchmesh::job::{
    ClusterStatusJob, JobValue, MasterCollectionAddIndexingJob, NodeDirectoryCleanJob,
    NodeHandshakeJob,
};
use searchmesh::notifications::NotificationKind;
use searchmesh::processlog::{ProcessLog, ResultStatus};
use searchmesh::settings::{MemorySettingsStore, NodeListSettings, NodeSettings, SettingsStore};
use searchmesh::transport::{LoopbackHub, TransportKind};

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_startup_connects_enabled_peers() {
    let home = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1", "node2", "node3"]),
        "node1",
        "node2",
        transport.clone(),
    )
    .await
    .unwrap();

    assert_eq!(transport.connects(), 2);
    // One handshake per connected peer
    assert_eq!(transport.requests(), 2);
    assert!(transport.sent().iter().all(|(_, job)| *job == "node_handshake"));

    assert!(!ctx.registry.is_master().await);
    assert_eq!(ctx.registry.master_node().await.id, "node2");
    assert_eq!(ctx.registry.active_count().await, 3);
    assert_eq!(ctx.metrics.active_nodes(), 3);
}

#[tokio::test]
async fn test_startup_with_failing_peers_still_succeeds() {
    let home = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    transport.set_fail_connect(true);

    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1", "node2", "node3"]),
        "node1",
        "node1",
        transport.clone(),
    )
    .await
    .unwrap();

    assert_eq!(transport.requests(), 0);
    assert_eq!(ctx.registry.active_count().await, 1);
    let node2 = ctx.registry.node_by_id("node2").await.unwrap();
    assert_eq!(node2.status(), NodeStatus::Inactive);
}

#[tokio::test]
async fn test_startup_skips_disabled_peers() {
    let home = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    let nodes = NodeListSettings::new(vec![
        NodeSettings::new("node1", "127.0.0.1", 9100),
        NodeSettings::new("node2", "127.0.0.1", 9101),
        NodeSettings::new("node3", "127.0.0.1", 9102).disabled(),
    ]);

    start_recording(home.path(), nodes, "node1", "node1", transport.clone())
        .await
        .unwrap();

    assert_eq!(transport.connects(), 1);
}

#[tokio::test]
async fn test_startup_error_codes() {
    let home = TempDir::new().unwrap();

    let err = start_recording(
        home.path(),
        node_list(&["node2", "node3"]),
        "node1",
        "node2",
        RecordingTransport::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StartupError::SelfNodeMissing { .. }));
    assert_eq!(err.code(), "ERR-00300");
    assert!(err.to_string().starts_with("[ERR-00300]"));

    let err = start_recording(
        home.path(),
        node_list(&["node1", "node2"]),
        "node1",
        "node9",
        RecordingTransport::new(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "ERR-00301");

    let err = start_recording(
        home.path(),
        node_list(&["node1", "node1"]),
        "node1",
        "node1",
        RecordingTransport::new(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "ERR-00302");

    let err = start_recording(
        home.path(),
        node_list(&["node1"]),
        "node1",
        "node1",
        RecordingTransport::failing_load(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StartupError::TransportLoad(_)));
    assert_eq!(err.code(), "ERR-00305");
}

#[tokio::test]
async fn test_shutdown_unloads_transport() {
    let home = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1"]),
        "node1",
        "node1",
        transport.clone(),
    )
    .await
    .unwrap();

    ctx.shutdown().await.unwrap();
    assert_eq!(transport.unloads(), 1);

    let me = ctx.registry.my_node().await;
    let result = ctx
        .registry
        .send_request(&me, Arc::new(NodeHandshakeJob::new("node1")))
        .await
        .unwrap();
    assert!(result.take().await.unwrap().is_err());
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_self_dispatch_never_touches_transport() {
    let home = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1", "node2"]),
        "node1",
        "node1",
        transport.clone(),
    )
    .await
    .unwrap();
    let before = transport.requests();

    let me = ctx.registry.my_node().await;
    let result = ctx
        .registry
        .send_request(&me, Arc::new(NodeHandshakeJob::new("node2")))
        .await
        .expect("local dispatch always yields a future");

    assert_eq!(result.take().await.unwrap(), Ok(Some(JobValue::Bool(true))));
    assert_eq!(transport.requests(), before);
    assert_eq!(ctx.metrics.local_executions(), 1);
}

#[tokio::test]
async fn test_remote_dispatch_goes_through_transport() {
    let home = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1", "node2"]),
        "node1",
        "node1",
        transport.clone(),
    )
    .await
    .unwrap();
    let before = transport.requests();

    let node2 = ctx.registry.node_by_id("node2").await.unwrap();
    let result = ctx
        .registry
        .send_request(&node2, Arc::new(NodeDirectoryCleanJob::new("index/1")))
        .await
        .unwrap();

    assert_eq!(result.take().await.unwrap(), Ok(Some(JobValue::Bool(true))));
    assert_eq!(transport.requests(), before + 1);
    assert_eq!(
        transport.sent().last(),
        Some(&("node2".to_string(), "node_directory_clean"))
    );
    // Handshake plus this request
    assert_eq!(ctx.metrics.remote_dispatches("node2"), 2);
}

#[tokio::test]
async fn test_transport_failure_yields_no_future() {
    let home = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1", "node2"]),
        "node1",
        "node1",
        transport.clone(),
    )
    .await
    .unwrap();
    transport.set_fail_send(true);

    let node2 = ctx.registry.node_by_id("node2").await.unwrap();
    let result = ctx
        .registry
        .send_request(&node2, Arc::new(NodeHandshakeJob::new("node1")))
        .await;

    assert!(result.is_none());
    assert_eq!(ctx.metrics.transport_failures("node2"), 1);
}

#[tokio::test]
async fn test_disabled_node_is_never_dispatched_to() {
    let home = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    let nodes = NodeListSettings::new(vec![
        NodeSettings::new("node1", "127.0.0.1", 9100),
        NodeSettings::new("node2", "127.0.0.1", 9101).disabled(),
    ]);
    let (ctx, _) = start_recording(home.path(), nodes, "node1", "node1", transport.clone())
        .await
        .unwrap();

    let node2 = ctx.registry.node_by_id("node2").await.unwrap();
    let result = ctx
        .registry
        .send_request(&node2, Arc::new(NodeHandshakeJob::new("node1")))
        .await;

    assert!(result.is_none());
    assert_eq!(transport.requests(), 0);
}

#[tokio::test]
async fn test_master_change_moves_dispatch_off_node() {
    let home = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1", "node2"]),
        "node1",
        "node1",
        transport.clone(),
    )
    .await
    .unwrap();
    let before = transport.requests();

    let result = ctx
        .registry
        .send_request_to_master(Arc::new(NodeHandshakeJob::new("node2")))
        .await
        .unwrap();
    assert!(result.take().await.unwrap().is_ok());
    assert_eq!(transport.requests(), before);

    ctx.registry.change_master("node2").await.unwrap();
    assert!(!ctx.registry.is_master().await);

    ctx.registry
        .send_request_to_master(Arc::new(NodeHandshakeJob::new("node1")))
        .await
        .unwrap();
    assert_eq!(transport.requests(), before + 1);
    assert_eq!(transport.sent().last().unwrap().0, "node2");

    assert!(matches!(
        ctx.registry.change_master("node9").await,
        Err(ClusterError::UnknownNode(id)) if id == "node9"
    ));
}

// ============================================================================
// File transfer
// ============================================================================

#[tokio::test]
async fn test_send_file_cases() {
    let home = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1", "node2"]),
        "node1",
        "node1",
        transport.clone(),
    )
    .await
    .unwrap();
    let me = ctx.registry.my_node().await;
    let node2 = ctx.registry.node_by_id("node2").await.unwrap();

    // Directories are not sent
    let sent = ctx
        .registry
        .send_file(&node2, outside.path(), Path::new("segments"))
        .await
        .unwrap();
    assert!(sent.is_none());
    assert_eq!(transport.files(), 0);

    // Self with source already at the destination
    let in_place = home.path().join("segments/0.seg");
    std::fs::create_dir_all(in_place.parent().unwrap()).unwrap();
    std::fs::write(&in_place, b"segment").unwrap();
    let sent = ctx
        .registry
        .send_file(&me, &in_place, Path::new("segments/0.seg"))
        .await
        .unwrap();
    assert!(sent.is_none());

    // Self with a different destination copies locally
    let source = outside.path().join("1.seg");
    std::fs::write(&source, b"payload").unwrap();
    let sent = ctx
        .registry
        .send_file(&me, &source, Path::new("incoming/1.seg"))
        .await
        .unwrap()
        .unwrap();
    assert!(sent.take().await.unwrap());
    assert_eq!(
        std::fs::read(home.path().join("incoming/1.seg")).unwrap(),
        b"payload"
    );
    assert_eq!(transport.files(), 0);

    // Remote goes through the transport
    let sent = ctx
        .registry
        .send_file(&node2, &source, Path::new("incoming/1.seg"))
        .await
        .unwrap()
        .unwrap();
    assert!(sent.take().await.unwrap());
    assert_eq!(transport.files(), 1);
}

#[tokio::test]
async fn test_send_file_to_self_with_identical_paths_is_a_no_op() {
    let home = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1"]),
        "node1",
        "node1",
        RecordingTransport::new(),
    )
    .await
    .unwrap();
    let me = ctx.registry.my_node().await;

    // Relative to the working directory, not the node home
    let relative = Path::new("Cargo.toml");
    let sent = ctx.registry.send_file(&me, relative, relative).await.unwrap();
    assert!(sent.is_none());
    assert!(!home.path().join("Cargo.toml").exists());

    let absolute = outside.path().join("0.seg");
    std::fs::write(&absolute, b"segment").unwrap();
    let sent = ctx.registry.send_file(&me, &absolute, &absolute).await.unwrap();
    assert!(sent.is_none());
    assert_eq!(std::fs::read(&absolute).unwrap(), b"segment");
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_update_node_removes_first_missing() {
    let home = TempDir::new().unwrap();
    let (ctx, settings) = start_recording(
        home.path(),
        node_list(&["node1", "node2", "node3"]),
        "node1",
        "node1",
        RecordingTransport::new(),
    )
    .await
    .unwrap();
    ctx.registry
        .update_load_balance("news_0", &["node2".into(), "node3".into()])
        .await;

    ctx.registry
        .update_node(node_list(&["node1", "node2"]))
        .await
        .unwrap();

    assert!(ctx.registry.node_by_id("node3").await.is_none());
    assert_eq!(ctx.registry.node_list().await.len(), 2);
    assert_eq!(settings.persist_count(), 1);

    let candidates: Vec<_> = ctx
        .registry
        .balancer()
        .candidates("news_0")
        .iter()
        .map(|n| n.id.clone())
        .collect();
    assert_eq!(candidates, vec!["node2"]);
}

#[tokio::test]
async fn test_update_node_removes_only_one_per_call() {
    let home = TempDir::new().unwrap();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1", "node2", "node3", "node4"]),
        "node1",
        "node1",
        RecordingTransport::new(),
    )
    .await
    .unwrap();

    ctx.registry
        .update_node(node_list(&["node1", "node2"]))
        .await
        .unwrap();

    let ids: Vec<_> = ctx
        .registry
        .node_list()
        .await
        .iter()
        .map(|n| n.id.clone())
        .collect();
    assert_eq!(ids, vec!["node1", "node2", "node4"]);
}

#[tokio::test]
async fn test_update_node_refuses_to_remove_self_or_master() {
    let home = TempDir::new().unwrap();
    let (ctx, settings) = start_recording(
        home.path(),
        node_list(&["node1", "node2", "node3"]),
        "node2",
        "node1",
        RecordingTransport::new(),
    )
    .await
    .unwrap();

    let err = ctx
        .registry
        .update_node(node_list(&["node2", "node3"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ClusterError::ProtectedNode(id) if id == "node1"));
    assert_eq!(ctx.registry.node_list().await.len(), 3);
    assert_eq!(settings.persist_count(), 0);
}

#[tokio::test]
async fn test_update_node_replaces_changed_endpoint() {
    let home = TempDir::new().unwrap();
    let (ctx, settings) = start_recording(
        home.path(),
        node_list(&["node1", "node2", "node3"]),
        "node1",
        "node1",
        RecordingTransport::new(),
    )
    .await
    .unwrap();
    let old_node3 = ctx.registry.node_by_id("node3").await.unwrap();
    assert!(old_node3.is_active());

    let mut updated = node_list(&["node1", "node2", "node3"]);
    updated.nodes[1].port = 9999;
    updated.nodes.push(NodeSettings::new("node4", "127.0.0.1", 9200));
    ctx.registry.update_node(updated).await.unwrap();

    let node2 = ctx.registry.node_by_id("node2").await.unwrap();
    assert_eq!(node2.port, 9999);
    assert_eq!(node2.status(), NodeStatus::Inactive);

    let node3 = ctx.registry.node_by_id("node3").await.unwrap();
    assert!(Arc::ptr_eq(&node3, &old_node3));
    assert!(node3.is_active());

    let node4 = ctx.registry.node_by_id("node4").await.unwrap();
    assert_eq!(node4.status(), NodeStatus::Inactive);
    assert_eq!(settings.persist_count(), 1);
    assert!(settings.node_list().contains("node4"));
}

// ============================================================================
// Load balancing
// ============================================================================

#[tokio::test]
async fn test_balanced_node_round_robin() {
    let home = TempDir::new().unwrap();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1", "node2", "node3"]),
        "node1",
        "node1",
        RecordingTransport::new(),
    )
    .await
    .unwrap();

    ctx.registry
        .update_load_balance(
            "news_0",
            &["node1".into(), "node2".into(), "node9".into(), "node3".into()],
        )
        .await;

    let picks: Vec<_> = (0..6)
        .map(|_| ctx.registry.get_balanced_node("news_0").unwrap().id.clone())
        .collect();
    assert_eq!(
        picks,
        vec!["node1", "node2", "node3", "node1", "node2", "node3"]
    );
    assert!(ctx.registry.get_balanced_node("missing").is_none());
}

#[tokio::test]
async fn test_update_node_keeps_rotation_of_unaffected_shards() {
    let home = TempDir::new().unwrap();
    let (ctx, _) = start_recording(
        home.path(),
        node_list(&["node1", "node2", "node3"]),
        "node1",
        "node1",
        RecordingTransport::new(),
    )
    .await
    .unwrap();

    ctx.registry
        .update_load_balance("news_0", &["node1".into(), "node2".into()])
        .await;
    ctx.registry
        .update_load_balance("blog_0", &["node2".into(), "node3".into()])
        .await;
    assert_eq!(ctx.registry.get_balanced_node("news_0").unwrap().id, "node1");
    assert_eq!(ctx.registry.get_balanced_node("blog_0").unwrap().id, "node2");

    // node3 moves; only blog_0 is rebuilt
    let mut nodes = node_list(&["node1", "node2", "node3", "node4"]);
    nodes.nodes[2] = NodeSettings::new("node3", "10.0.0.3", 9300);
    ctx.registry.update_node(nodes).await.unwrap();

    assert_eq!(ctx.registry.get_balanced_node("news_0").unwrap().id, "node2");
    assert_eq!(ctx.registry.get_balanced_node("blog_0").unwrap().id, "node2");
    let moved = ctx.registry.get_balanced_node("blog_0").unwrap();
    assert_eq!(moved.id, "node3");
    assert!(moved.same_endpoint("10.0.0.3", 9300));
}

// ============================================================================
// In-process cluster
// ============================================================================

struct Cluster {
    _home: TempDir,
    hub: Arc<LoopbackHub>,
    nodes: Vec<Arc<searchmesh::cluster::ClusterContext>>,
}

impl Cluster {
    /// node1 is master, node2 indexes `news`, node3 only submits
    async fn start(index_catalog: CollectionCatalog) -> Self {
        let home = TempDir::new().unwrap();
        let hub = Arc::new(LoopbackHub::new());
        let list = node_list(&["node1", "node2", "node3"]);
        let news = catalog("news", "node2", &["node2", "node3"]);

        let node1 = start_loopback(home.path(), &hub, &list, "node1", "node1", news.clone()).await;
        let node2 = start_loopback(home.path(), &hub, &list, "node2", "node1", index_catalog).await;
        let node3 = start_loopback(home.path(), &hub, &list, "node3", "node1", news).await;

        Self {
            _home: home,
            hub,
            nodes: vec![node1, node2, node3],
        }
    }

    fn node(&self, n: usize) -> &Arc<searchmesh::cluster::ClusterContext> {
        &self.nodes[n - 1]
    }
}

#[tokio::test]
async fn test_loopback_handshake_marks_late_peers_active() {
    let cluster = Cluster::start(catalog("news", "node2", &["node2"])).await;

    // node1 booted first; node2 and node3 announced themselves afterwards
    let node1 = cluster.node(1);
    tokio::time::timeout(Duration::from_secs(5), async {
        while node1.registry.active_count().await < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("handshakes from node2 and node3 arrive");
    assert_eq!(cluster.hub.bound_nodes(), vec!["node1", "node2", "node3"]);
}

#[tokio::test]
async fn test_indexing_runs_on_index_node() {
    let cluster = Cluster::start(catalog("news", "node2", &["node2"])).await;

    let result = cluster
        .node(3)
        .registry
        .submit(Arc::new(MasterCollectionAddIndexingJob::new("news")))
        .await
        .unwrap();

    assert_eq!(
        result.take().await.unwrap(),
        Ok(Some(JobValue::Text("news".into())))
    );

    let log = cluster.node(2).process_log.for_collection("news").await;
    assert_eq!(log.len(), 2);
    assert!(matches!(log[0], ProcessLog::IndexingStart { .. }));
    assert!(matches!(
        log[1],
        ProcessLog::IndexingFinish {
            status: ResultStatus::Success,
            ..
        }
    ));
    assert!(cluster.node(1).notifications.history().await.is_empty());
}

#[tokio::test]
async fn test_indexing_dispatch_failure_is_reported_on_master() {
    let cluster = Cluster::start(catalog("news", "node2", &["node2"])).await;
    cluster.hub.set_reachable("node2", false);

    let submitted_at = chrono::Utc::now();
    let result = cluster
        .node(3)
        .registry
        .submit(Arc::new(MasterCollectionAddIndexingJob::new("news")))
        .await
        .unwrap();

    let failure = result.take().await.unwrap().unwrap_err();
    assert!(failure.message.contains("node2"));

    let log = cluster.node(1).process_log.for_collection("news").await;
    assert_eq!(log.len(), 1);
    let ProcessLog::IndexingFinish {
        status,
        started_at,
        finished_at,
        ..
    } = &log[0]
    else {
        panic!("expected a finished run, got {:?}", log[0]);
    };
    assert_eq!(*status, ResultStatus::Fail);
    // The run starts before the hand-off is attempted
    assert!(submitted_at <= *started_at);
    assert!(started_at <= finished_at);

    let notifications = cluster.node(1).notifications.history().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::IndexingFailed);
    assert_eq!(notifications[0].metadata["collection"], "news");
}

#[tokio::test]
async fn test_indexing_application_failure_does_not_notify() {
    // node2 does not know the collection and reports a failure in its result
    let cluster = Cluster::start(CollectionCatalog::default()).await;

    let result = cluster
        .node(3)
        .registry
        .submit(Arc::new(MasterCollectionAddIndexingJob::new("news")))
        .await
        .unwrap();

    let failure = result.take().await.unwrap().unwrap_err();
    assert!(failure.message.contains("does not exist"));
    assert!(cluster.node(1).notifications.history().await.is_empty());
    assert!(cluster.node(1).process_log.entries().await.is_empty());
}

#[tokio::test]
async fn test_indexing_on_master_index_node_with_one_job_slot() {
    // Master, index node and submitter are the same node; the forwarded
    // indexing job must run while its parent still holds the only slot
    let home = TempDir::new().unwrap();
    let ctx = ClusterContext::builder(
        Environment::new(home.path(), "node1", "node1"),
        Arc::new(MemorySettingsStore::new(node_list(&["node1"]))),
    )
    .collections(catalog("news", "node1", &["node1"]))
    .transport_kind(TransportKind::Loopback, Arc::new(LoopbackHub::new()))
    .max_concurrent_jobs(1)
    .request_timeout(Duration::from_secs(2))
    .start()
    .await
    .unwrap();

    let first = ctx
        .registry
        .submit(Arc::new(MasterCollectionAddIndexingJob::new("news")))
        .await
        .unwrap();
    let second = ctx
        .registry
        .submit(Arc::new(MasterCollectionAddIndexingJob::new("news")))
        .await
        .unwrap();

    for result in [first, second] {
        assert_eq!(
            result.take_timeout(Duration::from_secs(5)).await.unwrap(),
            Ok(Some(JobValue::Text("news".into())))
        );
    }
    assert_eq!(ctx.process_log.for_collection("news").await.len(), 4);
    assert_eq!(ctx.job_service.running(), 0);
}

#[tokio::test]
async fn test_unreachable_master_yields_no_future() {
    let cluster = Cluster::start(catalog("news", "node2", &["node2"])).await;
    cluster.hub.set_reachable("node1", false);

    let result = cluster
        .node(3)
        .registry
        .submit(Arc::new(MasterCollectionAddIndexingJob::new("news")))
        .await;

    assert!(result.is_none());
    assert_eq!(cluster.node(3).metrics.transport_failures("node1"), 1);
}

#[tokio::test]
async fn test_directory_clean_on_peer() {
    let cluster = Cluster::start(catalog("news", "node2", &["node2"])).await;
    let node2_home = cluster.node(2).environment.home.clone();
    for dir in ["index/3", "index/4", "index/6"] {
        std::fs::create_dir_all(node2_home.join(dir)).unwrap();
    }

    let node2 = cluster.node(1).registry.node_by_id("node2").await.unwrap();
    let result = cluster
        .node(1)
        .registry
        .send_request(&node2, Arc::new(NodeDirectoryCleanJob::new("index/3")))
        .await
        .unwrap();

    assert_eq!(result.take().await.unwrap(), Ok(Some(JobValue::Bool(true))));
    assert!(!node2_home.join("index/3").exists());
    assert!(!node2_home.join("index/4").exists());
    assert!(node2_home.join("index/6").exists());
}

#[tokio::test]
async fn test_file_transfer_between_nodes() {
    let cluster = Cluster::start(catalog("news", "node2", &["node2"])).await;
    let source = cluster.node(1).environment.file_path("export/0.seg");
    std::fs::create_dir_all(source.parent().unwrap()).unwrap();
    std::fs::write(&source, b"segment").unwrap();

    let node2 = cluster.node(1).registry.node_by_id("node2").await.unwrap();
    let sent = cluster
        .node(1)
        .registry
        .send_file(&node2, &source, Path::new("import/0.seg"))
        .await
        .unwrap()
        .unwrap();

    assert!(sent.take().await.unwrap());
    let landed = cluster.node(2).environment.file_path("import/0.seg");
    assert_eq!(std::fs::read(landed).unwrap(), b"segment");
}

#[tokio::test]
async fn test_local_only_job_is_not_sent() {
    let cluster = Cluster::start(catalog("news", "node2", &["node2"])).await;
    let node1 = cluster.node(1);

    let node2 = node1.registry.node_by_id("node2").await.unwrap();
    assert!(node1
        .registry
        .send_request(&node2, Arc::new(ClusterStatusJob))
        .await
        .is_none());

    let result = node1.registry.submit(Arc::new(ClusterStatusJob)).await.unwrap();
    match result.take().await.unwrap() {
        Ok(Some(JobValue::Text(json))) => {
            let nodes: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(nodes.as_array().unwrap().len(), 3);
            assert_eq!(nodes[0]["id"], "node1");
            assert_eq!(nodes[0]["is_master"], true);
        }
        other => panic!("unexpected status result: {other:?}"),
    }
}
