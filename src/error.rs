//! Unified error handling for the searchmesh crate
//!
//! Each module keeps its own error enum; [`Error`] wraps all of them so code
//! at module boundaries (configuration loading, the binary) has one type to
//! deal with.
//!
//! # Architecture
//!
//! - [`SearchmeshErrorTrait`] - common interface implemented by the unified error
//! - [`ErrorCategory`] - classification used to decide on retries and exit codes
//! - [`Error`] - unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust
//! use searchmesh::error::{Error, ErrorCategory, SearchmeshErrorTrait};
//!
//! let err = Error::other("index node went away");
//! assert_eq!(err.category(), ErrorCategory::Other);
//! assert!(!err.is_recoverable());
//! ```

use std::io;

use thiserror::Error;

pub use crate::cluster::{ClusterError, StartupError};
pub use crate::config::ConfigError;
pub use crate::job::{CodecError, WaitError};
pub use crate::notifications::ChannelError;
pub use crate::settings::SettingsError;
pub use crate::transport::TransportError;

/// Common trait for searchmesh error types
pub trait SearchmeshErrorTrait: std::error::Error {
    /// Whether retrying the same operation later may succeed
    fn is_recoverable(&self) -> bool;

    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport, connection and HTTP errors
    Network,
    /// Filesystem and settings persistence errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Membership and startup errors
    Cluster,
    /// Wire encoding errors
    Codec,
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Cluster => "cluster",
            Self::Codec => "codec",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the searchmesh crate
#[derive(Error, Debug)]
pub enum Error {
    #[error("startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("wait error: {0}")]
    Wait(#[from] WaitError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("notification channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SearchmeshErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => !matches!(
                e,
                TransportError::NotStreamable(_) | TransportError::Codec(_)
            ),
            Self::Cluster(ClusterError::Transport(_)) => true,
            Self::Wait(WaitError::Timeout(_)) => true,
            Self::Io(_) | Self::Channel(ChannelError::Http(_)) => true,
            Self::Startup(StartupError::TransportLoad(_)) => true,
            Self::Startup(_)
            | Self::Cluster(_)
            | Self::Codec(_)
            | Self::Wait(_)
            | Self::Settings(_)
            | Self::Config(_)
            | Self::Channel(_)
            | Self::Json(_)
            | Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(TransportError::Codec(_)) | Self::Codec(_) => ErrorCategory::Codec,
            Self::Transport(_) | Self::Wait(_) | Self::Channel(_) => ErrorCategory::Network,
            Self::Startup(StartupError::TransportLoad(_)) => ErrorCategory::Network,
            Self::Startup(_) | Self::Cluster(_) => ErrorCategory::Cluster,
            Self::Settings(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Config(_) | Self::Json(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Stable startup code, when this is a startup failure
    pub fn startup_code(&self) -> Option<&'static str> {
        match self {
            Self::Startup(e) | Self::Cluster(ClusterError::Startup(e)) => Some(e.code()),
            _ => None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_category() {
        let err: Error = TransportError::Unreachable("node2".into()).into();
        assert_eq!(err.category(), ErrorCategory::Network);

        let err: Error = CodecError::UnknownTag(9).into();
        assert_eq!(err.category(), ErrorCategory::Codec);

        let err: Error = StartupError::MasterNodeMissing {
            node_id: "m".into(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Cluster);
    }

    #[test]
    fn test_is_recoverable() {
        let err: Error = TransportError::Unreachable("node2".into()).into();
        assert!(err.is_recoverable());

        let err: Error = WaitError::Timeout(Duration::from_secs(1)).into();
        assert!(err.is_recoverable());

        let err: Error = TransportError::NotStreamable("cluster_status").into();
        assert!(!err.is_recoverable());

        let err: Error = ConfigError::Invalid("bad".into()).into();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_startup_code() {
        let err: Error = StartupError::SelfNodeMissing {
            node_id: "n".into(),
        }
        .into();
        assert_eq!(err.startup_code(), Some("ERR-00300"));
        assert_eq!(Error::other("x").startup_code(), None);
    }

    #[test]
    fn test_other_error() {
        let err = Error::with_source("could not read", io::Error::other("disk"));
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(err.to_string(), "could not read");
    }
}
