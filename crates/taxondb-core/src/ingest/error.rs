use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while fetching, parsing or loading a taxdump.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to fetch {url} after {attempts} attempt(s): {message}")]
    Fetch {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Unsupported archive source: {0}")]
    UnsupportedSource(String),

    #[error("Malformed {file} at line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Store(#[from] StorageError),
}

impl IngestError {
    pub(crate) fn parse(file: &str, line: usize, message: impl Into<String>) -> Self {
        IngestError::Parse {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }
}
