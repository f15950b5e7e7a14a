//! Per-node cluster context
//!
//! One [`ClusterContext`] is built at node startup and handed to every job
//! run. It owns the registry, the local executor and the collaborators jobs
//! report to. Nothing in the crate reaches for a global instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::error::StartupError;
use super::registry::NodeRegistry;
use crate::collections::CollectionCatalog;
use crate::job::JobService;
use crate::metrics::ClusterMetrics;
use crate::notifications::NotificationService;
use crate::processlog::ProcessLogBook;
use crate::settings::SettingsStore;
use crate::transport::{create_transport, LoopbackHub, Transport, TransportKind, TransportSetup};

/// Identity and managed filesystem root of the running node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub home: PathBuf,
    pub my_node_id: String,
    pub master_node_id: String,
}

impl Environment {
    pub fn new(
        home: impl Into<PathBuf>,
        my_node_id: impl Into<String>,
        master_node_id: impl Into<String>,
    ) -> Self {
        Self {
            home: home.into(),
            my_node_id: my_node_id.into(),
            master_node_id: master_node_id.into(),
        }
    }

    /// Resolve `path` under the node home
    pub fn file_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.home.join(path)
    }

    /// Where the node list is stored
    pub fn settings_path(&self) -> PathBuf {
        self.file_path("conf/nodes.toml")
    }
}

/// Everything a job needs while running on this node
pub struct ClusterContext {
    pub environment: Environment,
    pub registry: NodeRegistry,
    pub collections: CollectionCatalog,
    pub job_service: Arc<JobService>,
    pub process_log: ProcessLogBook,
    pub notifications: NotificationService,
    pub metrics: Arc<ClusterMetrics>,
    pub request_timeout: Duration,
}

impl ClusterContext {
    pub fn builder(environment: Environment, settings: Arc<dyn SettingsStore>) -> ClusterContextBuilder {
        ClusterContextBuilder::new(environment, settings)
    }

    /// Stop executing jobs and tear down the transport
    pub async fn shutdown(&self) -> Result<(), crate::transport::TransportError> {
        self.job_service.shutdown();
        self.registry.stop().await
    }
}

impl std::fmt::Debug for ClusterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterContext")
            .field("environment", &self.environment)
            .field("registry", &self.registry)
            .field("collections", &self.collections.len())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

enum TransportSource {
    Kind(TransportKind, Arc<LoopbackHub>),
    Custom(Arc<dyn Transport>),
}

/// Assembles and starts a [`ClusterContext`]
pub struct ClusterContextBuilder {
    environment: Environment,
    settings: Arc<dyn SettingsStore>,
    collections: CollectionCatalog,
    notifications: NotificationService,
    transport: TransportSource,
    max_concurrent_jobs: usize,
    request_timeout: Duration,
}

impl ClusterContextBuilder {
    fn new(environment: Environment, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            environment,
            settings,
            collections: CollectionCatalog::default(),
            notifications: NotificationService::default(),
            transport: TransportSource::Kind(TransportKind::Loopback, Arc::new(LoopbackHub::new())),
            max_concurrent_jobs: 8,
            request_timeout: Duration::from_secs(300),
        }
    }

    pub fn collections(mut self, collections: CollectionCatalog) -> Self {
        self.collections = collections;
        self
    }

    pub fn notifications(mut self, notifications: NotificationService) -> Self {
        self.notifications = notifications;
        self
    }

    /// Use the built-in transport `kind`, attached to `hub`
    pub fn transport_kind(mut self, kind: TransportKind, hub: Arc<LoopbackHub>) -> Self {
        self.transport = TransportSource::Kind(kind, hub);
        self
    }

    /// Use an already-built transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = TransportSource::Custom(transport);
        self
    }

    pub fn max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Start the registry and wire the executor to the finished context
    pub async fn start(self) -> Result<Arc<ClusterContext>, StartupError> {
        let environment = self.environment;
        let metrics = Arc::new(ClusterMetrics::new(&environment.my_node_id)?);
        let job_service = Arc::new(JobService::new(self.max_concurrent_jobs));

        let transport = match self.transport {
            TransportSource::Kind(kind, hub) => create_transport(
                kind,
                TransportSetup {
                    node_id: environment.my_node_id.clone(),
                    home: environment.home.clone(),
                    executor: job_service.clone(),
                    hub,
                },
            ),
            TransportSource::Custom(transport) => transport,
        };

        let node_list = self.settings.node_list();
        let registry = NodeRegistry::start(
            environment.clone(),
            &node_list,
            transport,
            job_service.clone(),
            self.settings,
            Arc::clone(&metrics),
        )
        .await?;

        for shard in self.collections.shards() {
            registry.update_load_balance(&shard.id, &shard.data_nodes).await;
        }

        let context = Arc::new(ClusterContext {
            environment,
            registry,
            collections: self.collections,
            job_service: Arc::clone(&job_service),
            process_log: ProcessLogBook::default(),
            notifications: self.notifications,
            metrics,
            request_timeout: self.request_timeout,
        });
        job_service.attach(&context);

        info!(
            node_id = %context.environment.my_node_id,
            home = %context.environment.home.display(),
            "Cluster context ready"
        );
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_paths() {
        let env = Environment::new("/var/searchmesh/node1", "node1", "node1");
        assert_eq!(
            env.file_path("collections/news"),
            PathBuf::from("/var/searchmesh/node1/collections/news")
        );
        assert_eq!(
            env.settings_path(),
            PathBuf::from("/var/searchmesh/node1/conf/nodes.toml")
        );
    }
}
