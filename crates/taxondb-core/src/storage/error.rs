use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store was closed or never opened.
    #[error("Taxonomy database is not connected")]
    NotConnected,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Table does not exist: {0}")]
    MissingTable(String),

    /// No bucket configured for a remote database and none in the environment.
    #[error("No object store bucket given (set s3_bucket or AWS_STORAGE_BUCKET_NAME)")]
    MissingBucket,

    #[error("Object store error: {0}")]
    Remote(#[from] object_store::Error),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
