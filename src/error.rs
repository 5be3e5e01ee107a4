//!
//! Error type of the lattice decoder
//!
use crate::backend::BackendKind;
use thiserror::Error;

/// Errors surfaced by decoding and statistics operations.
///
/// All operations are all-or-nothing, so no partial result accompanies an
/// error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LatticeError {
    /// Axis extents of the score tensor do not describe a flip-flop lattice.
    #[error("invalid score shape: {reason}")]
    InvalidScoreShape { reason: String },
    /// Input magnitudes could push a path score past the sentinel.
    #[error("numeric overflow: {reason}")]
    NumericOverflow { reason: String },
    /// The requested backend is not compiled in or cannot run on this input.
    #[error("{kind} backend is unavailable")]
    BackendUnavailable { kind: BackendKind },
    /// The backend failed while running.
    #[error("backend error: {0}")]
    Backend(String),
    /// The configuration could not be parsed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl LatticeError {
    pub(crate) fn shape<S: Into<String>>(reason: S) -> Self {
        LatticeError::InvalidScoreShape {
            reason: reason.into(),
        }
    }
    pub(crate) fn overflow<S: Into<String>>(reason: S) -> Self {
        LatticeError::NumericOverflow {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LatticeError>;
