//! Error taxonomy shared by every strata crate

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type StrataResult<T> = Result<T, StrataError>;

/// Failure modes surfaced to callers. Lookup misses are `Option::None`, not
/// `NotFound`; `NotFound` is reserved for operations that must act on a symbol.
#[derive(Debug, Error)]
pub enum StrataError {
    #[error("symbol not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StrataError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StrataError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::NotFound(_) => ErrorKind::NotFound,
            StrataError::Validation(_) => ErrorKind::Validation,
            StrataError::Conflict(_) => ErrorKind::Conflict,
            StrataError::Io { .. } => ErrorKind::Io,
            StrataError::Config(_) => ErrorKind::Config,
            StrataError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Serializable projection of [`StrataError`] for the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Io,
    Config,
    Storage,
}
