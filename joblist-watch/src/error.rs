//! Error types for the watch engine.

use thiserror::Error;

/// Result type for watch operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Errors that can occur while watching or paginating the job list.
///
/// Cancellation of a query by its own channel is deliberately absent: an
/// aborted call resolves to "no result", never to an error.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Network or server failure. Loops stall and retry without advancing
    /// their index.
    #[error("transport failed: {0}")]
    TransportFailed(String),

    /// Authorization denial. Terminal for the scope; loops do not retry.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// `next_page` with no known continuation token.
    #[error("no next page")]
    NoNextPage,

    /// `prev_page` while already on the first page.
    #[error("no previous page")]
    NoPrevPage,

    /// Page size must be at least one.
    #[error("invalid page size: {0}")]
    InvalidPageSize(usize),

    /// Pagination was requested before `enter`.
    #[error("watch not entered")]
    NotEntered,

    /// Preference store failure.
    #[error("preferences error: {0}")]
    Preferences(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WatchError {
    /// Whether a loop should stall and retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, WatchError::TransportFailed(_) | WatchError::Serialization(_))
    }

    /// Whether this error is a pagination boundary (a no-op, not a failure).
    pub fn is_boundary(&self) -> bool {
        matches!(self, WatchError::NoNextPage | WatchError::NoPrevPage)
    }
}

impl From<reqwest::Error> for WatchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) if status.as_u16() == 403 => WatchError::Forbidden(e.to_string()),
            _ => WatchError::TransportFailed(e.to_string()),
        }
    }
}

impl From<rusqlite::Error> for WatchError {
    fn from(e: rusqlite::Error) -> Self {
        WatchError::Preferences(e.to_string())
    }
}
