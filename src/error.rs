//! Error types for browsing and reading.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while resolving, listing or reading a path.
#[derive(Debug, Error)]
pub enum Error {
    /// The request path is malformed, escapes the root, or lacks a
    /// required `//` archive delimiter
    #[error("Invalid path '{path}': {reason}")]
    PathResolution {
        /// The offending request path
        path: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Archive file or in-archive entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Sniffed content matches no archive backend
    #[error("Unsupported archive format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The backend failed to index the archive
    #[error("Failed to open archive {}: {source:#}", path.display())]
    BackendOpen {
        /// Archive that failed to open
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// An entry exists but its contents could not be produced
    #[error("Failed to read '{entry}': {source:#}")]
    EntryRead {
        /// In-archive path of the entry
        entry: String,
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// Filesystem failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn path(path: &str, reason: &'static str) -> Self {
        Self::PathResolution {
            path: path.to_string(),
            reason,
        }
    }
}
