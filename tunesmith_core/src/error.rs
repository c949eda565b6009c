// Fatal build errors.
//
// These are programmer or catalog errors: a request references something the
// static game data does not contain, or the request itself is malformed.
// They are returned as `Err` and never mixed into the per-note diagnostics of
// an `OptimizationResult` (see `result.rs`), which carry recoverable,
// user-input problems.

use crate::types::EntityKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no build rules for instrument {0:?}")]
    UnknownInstrument(EntityKind),

    #[error("unknown scroll speed '{0}'")]
    UnknownScrollSpeed(String),

    #[error("unknown track template '{0}'")]
    UnknownTemplate(String),

    #[error("invalid build request: {0}")]
    InvalidRequest(String),

    #[error("catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}
