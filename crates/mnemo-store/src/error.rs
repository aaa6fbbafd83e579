//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the file-backed stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a store file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line of the event log is not a valid event.
    #[error("malformed event at {}:{line}: {source}", .path.display())]
    MalformedEvent {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The card-state file could not be parsed.
    #[error("malformed card store {}: {source}", .path.display())]
    MalformedCards {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
