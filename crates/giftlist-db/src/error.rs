use giftlist_types::api::ErrorCode;
use thiserror::Error;

/// Typed store failures. Every variant maps onto one [`ErrorCode`]; callers
/// decide how to present it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{kind} version mismatch; got {got} want {want}")]
    VersionConflict {
        kind: &'static str,
        got: i64,
        want: i64,
    },

    #[error("{0}")]
    PermissionDenied(String),

    /// The record is in the wrong state for the request (e.g. claim state).
    #[error("{0}")]
    FailedPrecondition(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("storage failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Internal(String),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound(_) => ErrorCode::NotFound,
            StoreError::VersionConflict { .. } | StoreError::FailedPrecondition(_) => {
                ErrorCode::FailedPrecondition
            }
            StoreError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            StoreError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            StoreError::Sqlite(_) | StoreError::Internal(_) => ErrorCode::Internal,
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Reject blank required text fields.
pub(crate) fn require_nonblank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidArgument(format!("{} required", field)));
    }
    Ok(())
}
