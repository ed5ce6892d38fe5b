//! Layout persistence errors

use std::path::PathBuf;

/// Failure reading or writing a layout or history snapshot
///
/// The operation that hit it is aborted; nothing in memory is changed.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem failure
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored JSON does not describe a layout snapshot
    #[error("invalid layout file {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot could not be rendered as JSON
    #[error("failed to encode layout: {0}")]
    Encode(#[from] serde_json::Error),
}

impl PersistenceError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create decode error for path
    pub fn decode(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    /// Path involved, when known
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Io { path, .. } | Self::Decode { path, .. } => Some(path),
            Self::Encode(_) => None,
        }
    }
}
