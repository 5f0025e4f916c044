use crate::types::ElementId;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("mode violation in {operation}: {detail}")]
    ModeViolation {
        operation: &'static str,
        detail: String,
    },

    #[error("storage format version {found} does not match expected version {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("store is locked for writing by another process: {}", path.display())]
    WriteLocked { path: PathBuf },

    #[error("pending store state disappeared before it was kept: {}", path.display())]
    PendingStateLost { path: PathBuf },

    #[error("unknown file: {}", .0.display())]
    UnknownFile(PathBuf),

    #[error("unknown element: {0}")]
    UnknownElement(ElementId),

    #[error("invalid parser unit: {0}")]
    InvalidUnit(String),

    #[error("Invalid store path: {0}")]
    InvalidPath(String),
}

impl StoreError {
    pub(crate) fn mode_violation(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::ModeViolation {
            operation,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub const fn is_mode_violation(&self) -> bool {
        matches!(self, Self::ModeViolation { .. })
    }
}
