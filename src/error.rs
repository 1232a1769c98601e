use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("Failed to read {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid inbox snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Invalid scoring rules: {0}")]
    Rules(String),

    #[error("Preference store error: {0}")]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, InboxError>;
