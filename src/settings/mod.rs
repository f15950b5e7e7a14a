//! Node list settings
//!
//! The registry reads its initial membership from a [`SettingsStore`] and
//! writes every reconciled list back through [`SettingsStore::persist`].
//!
//! On disk the list is a TOML file:
//!
//! ```toml
//! [[node]]
//! id = "node1"
//! name = "Node 1"
//! address = "127.0.0.1"
//! port = 9090
//! enabled = true
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid node list in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize node list: {0}")]
    Serialize(#[from] toml::ser::Error),
}

fn default_enabled() -> bool {
    true
}

/// Configured identity of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub address: String,

    pub port: u16,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl NodeSettings {
    pub fn new(id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            address: address.into(),
            port,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Ordered node list as configured
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeListSettings {
    #[serde(rename = "node", default)]
    pub nodes: Vec<NodeSettings>,
}

impl NodeListSettings {
    pub fn new(nodes: Vec<NodeSettings>) -> Self {
        Self { nodes }
    }

    pub fn find_node_by_id(&self, id: &str) -> Option<&NodeSettings> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find_node_by_id(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Provider and sink of the node list
pub trait SettingsStore: Send + Sync {
    fn node_list(&self) -> NodeListSettings;

    fn persist(&self, nodes: &NodeListSettings) -> Result<(), SettingsError>;
}

// ============================================================================
// File store
// ============================================================================

/// TOML file backed store
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    current: RwLock<NodeListSettings>,
}

impl FileSettingsStore {
    /// Load `path`, or start from `fallback` if it does not exist yet
    pub fn open(path: impl Into<PathBuf>, fallback: NodeListSettings) -> Result<Self, SettingsError> {
        let path = path.into();
        let current = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No stored node list, using configuration");
                fallback
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };

        Ok(Self {
            path,
            current: RwLock::new(current),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomically(&self, content: &str) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl SettingsStore for FileSettingsStore {
    fn node_list(&self) -> NodeListSettings {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn persist(&self, nodes: &NodeListSettings) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(nodes)?;
        self.write_atomically(&content)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = nodes.clone();
        info!(path = %self.path.display(), nodes = nodes.len(), "Node list stored");
        Ok(())
    }
}

// ============================================================================
// Memory store
// ============================================================================

/// In-memory store, counting persist calls
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    current: RwLock<NodeListSettings>,
    persisted: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn new(nodes: NodeListSettings) -> Self {
        Self {
            current: RwLock::new(nodes),
            persisted: AtomicUsize::new(0),
        }
    }

    pub fn persist_count(&self) -> usize {
        self.persisted.load(Ordering::Relaxed)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn node_list(&self) -> NodeListSettings {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn persist(&self, nodes: &NodeListSettings) -> Result<(), SettingsError> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = nodes.clone();
        self.persisted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
