use std::path::Path;
use thiserror::Error;

/// Errors raised by the weekly-cost core.
///
/// `InvalidSample` is a caller mistake and never mutates state.
/// `StoreUnavailable` means persistence could not be reached or read; it is
/// never folded into "no state yet".
#[derive(Error, Debug)]
pub enum CostError {
    #[error("Invalid sample: {0}")]
    InvalidSample(String),
    #[error("State store unavailable ({location}): {reason}")]
    StoreUnavailable { location: String, reason: String },
    #[error("Concurrent write conflict: expected revision {expected}, store has {found}")]
    ConcurrentWriteConflict { expected: u64, found: u64 },
}

impl CostError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidSample(msg.into())
    }

    pub fn unavailable(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable {
            location: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the dashboard should see this as "service unavailable"
    /// rather than a bad request.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::ConcurrentWriteConflict { .. }
        )
    }
}
