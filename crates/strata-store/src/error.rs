//! Store error type

use std::path::PathBuf;

use strata_core::{StrataError, SymbolId};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("duplicate id: {0}")]
    Duplicate(SymbolId),

    /// A stored record that cannot be decoded into a symbol.
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("failed to encode payload: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("failed to prepare database directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] StrataError),
}

impl StoreError {
    pub(crate) fn corrupt(id: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for StrataError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(id) => StrataError::Conflict(format!("duplicate id: {id}")),
            err @ StoreError::Corrupt { .. } => StrataError::Conflict(err.to_string()),
            StoreError::Io { path, source } => StrataError::Io { path, source },
            StoreError::Invalid(inner) => inner,
            err @ (StoreError::Database(_) | StoreError::Encoding(_)) => StrataError::Storage(err.to_string()),
        }
    }
}
