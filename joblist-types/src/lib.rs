//! Core type definitions for the job list watch engine.
//!
//! This crate defines the plain data model shared by the watch engine and
//! its front ends:
//! - Consistency indexes and continuation tokens returned by blocking queries
//! - Pagination cursors and query scopes
//! - Job identities, ordered ID sets, job records and detail snapshots
//!
//! Nothing here performs I/O; the polling machinery lives in `joblist-watch`.

mod cursor;
mod index;
mod job;

pub use cursor::{Cursor, Direction, Scope, ALL_NAMESPACES};
pub use index::{ConsistencyIndex, ContinuationToken};
pub use job::{DetailSnapshot, JobIdSet, JobRecord, JobRef};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid job reference: {0}")]
    InvalidJobRef(String),
}
