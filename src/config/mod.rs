//! Configuration management for searchmesh nodes
//!
//! A node is configured from one TOML file, optionally adjusted by
//! environment variables:
//!
//! | Variable | Overrides |
//! |---|---|
//! | `SEARCHMESH_NODE_ID` | `node.my_node_id` |
//! | `SEARCHMESH_MASTER_ID` | `node.master_node_id` |
//! | `SEARCHMESH_HOME` | `node.home` |
//! | `SEARCHMESH_LOG_LEVEL` | `logging.level` |
//!
//! ```toml
//! [node]
//! my_node_id = "node1"
//! master_node_id = "node1"
//! home = "data"
//!
//! [[nodes]]
//! id = "node1"
//! address = "127.0.0.1"
//! port = 9090
//!
//! [[collections]]
//! id = "news"
//! index_node = "node1"
//!
//! [[collections.shards]]
//! id = "news_0"
//! data_nodes = ["node1"]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterContext, ClusterContextBuilder, Environment};
use crate::collections::{CollectionCatalog, CollectionSettings};
use crate::notifications::{ChannelError, NotificationService, WebhookChannel};
use crate::settings::{FileSettingsStore, NodeListSettings, NodeSettings};
use crate::transport::{LoopbackHub, TransportKind};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub node: NodeConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Initial node list; the stored list under the node home wins once written
    #[serde(default)]
    pub nodes: Vec<NodeSettings>,

    #[serde(default)]
    pub collections: Vec<CollectionSettings>,
}

/// Identity of the running node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub my_node_id: String,
    pub master_node_id: String,

    #[serde(default = "default_home")]
    pub home: PathBuf,
}

fn default_home() -> PathBuf {
    PathBuf::from("data")
}

/// Local job execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Upper bound for waiting on a dispatched job
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_concurrent_jobs() -> usize {
    8
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
}

/// Status HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "127.0.0.1:8470".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_bind_address(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
}

impl ClusterConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `SEARCHMESH_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("SEARCHMESH_NODE_ID") {
            self.node.my_node_id = id;
        }
        if let Ok(id) = std::env::var("SEARCHMESH_MASTER_ID") {
            self.node.master_node_id = id;
        }
        if let Ok(home) = std::env::var("SEARCHMESH_HOME") {
            self.node.home = PathBuf::from(home);
        }
        if let Ok(level) = std::env::var("SEARCHMESH_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate configuration values
    ///
    /// Membership problems (self or master missing from `nodes`) are left to
    /// node startup, which reports them with their own error codes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.node.my_node_id.is_empty() {
            return invalid("node.my_node_id must not be empty".into());
        }
        if self.node.master_node_id.is_empty() {
            return invalid("node.master_node_id must not be empty".into());
        }
        if self.executor.max_concurrent_jobs == 0 {
            return invalid("executor.max_concurrent_jobs must be greater than 0".into());
        }
        if self.executor.request_timeout_secs == 0 {
            return invalid("executor.request_timeout_secs must be greater than 0".into());
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return invalid(format!("unknown log format '{}'", self.logging.format));
        }

        for collection in &self.collections {
            if !self.has_node(&collection.index_node) {
                return invalid(format!(
                    "collection [{}] uses unknown index node [{}]",
                    collection.id, collection.index_node
                ));
            }
            for shard in &collection.shards {
                if let Some(unknown) = shard.data_nodes.iter().find(|id| !self.has_node(id)) {
                    return invalid(format!(
                        "shard [{}] uses unknown data node [{unknown}]",
                        shard.id
                    ));
                }
            }
        }

        Ok(())
    }

    fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.executor.request_timeout_secs)
    }

    pub fn environment(&self) -> Environment {
        Environment::new(
            &self.node.home,
            &self.node.my_node_id,
            &self.node.master_node_id,
        )
    }

    pub fn node_list(&self) -> NodeListSettings {
        NodeListSettings::new(self.nodes.clone())
    }

    pub fn collection_catalog(&self) -> CollectionCatalog {
        CollectionCatalog::new(self.collections.clone())
    }

    /// The same cluster seen from `node_id`, with its own home directory
    pub fn for_node(&self, node_id: &str) -> Self {
        let mut config = self.clone();
        config.node.my_node_id = node_id.to_string();
        config.node.home = self.node.home.join(node_id);
        config
    }

    /// Log channel plus the webhook, if one is configured
    pub fn notification_service(&self) -> Result<NotificationService, ChannelError> {
        let service = NotificationService::default();
        match &self.notifications.webhook_url {
            Some(url) => Ok(service.with_channel(Arc::new(WebhookChannel::from_url(url)?))),
            None => Ok(service),
        }
    }

    /// Context builder for this node, with the node list stored under its home
    pub fn context_builder(&self, hub: Arc<LoopbackHub>) -> crate::Result<ClusterContextBuilder> {
        let environment = self.environment();
        let settings = FileSettingsStore::open(environment.settings_path(), self.node_list())?;

        Ok(ClusterContext::builder(environment, Arc::new(settings))
            .collections(self.collection_catalog())
            .notifications(self.notification_service()?)
            .transport_kind(self.transport.kind, hub)
            .max_concurrent_jobs(self.executor.max_concurrent_jobs)
            .request_timeout(self.request_timeout()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [node]
        my_node_id = "node1"
        master_node_id = "node1"

        [[nodes]]
        id = "node1"
        address = "127.0.0.1"
        port = 9090
    "#;

    #[test]
    fn test_defaults_fill_in() {
        let config = ClusterConfig::from_toml_str(MINIMAL).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.executor.max_concurrent_jobs, 8);
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.transport.kind, TransportKind::Loopback);
        assert_eq!(config.node.home, PathBuf::from("data"));
        assert!(!config.admin.enabled);
        assert!(config.notifications.webhook_url.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = ClusterConfig::from_toml_str(MINIMAL).unwrap();
        config.executor.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());

        let mut config = ClusterConfig::from_toml_str(MINIMAL).unwrap();
        config.logging.format = "xml".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_index_node_is_rejected() {
        let mut config = ClusterConfig::from_toml_str(MINIMAL).unwrap();
        config.collections.push(CollectionSettings {
            id: "news".into(),
            index_node: "node7".into(),
            shards: Vec::new(),
        });

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("node7"));
    }

    #[test]
    fn test_for_node() {
        let config = ClusterConfig::from_toml_str(MINIMAL).unwrap();
        let other = config.for_node("node2");

        assert_eq!(other.node.my_node_id, "node2");
        assert_eq!(other.node.master_node_id, "node1");
        assert_eq!(other.node.home, PathBuf::from("data/node2"));
    }
}
