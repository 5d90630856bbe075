//! Consistency indexes and continuation tokens.
//!
//! Both are opaque to the client: indexes are only ever compared against
//! earlier values from the same query stream, and tokens are handed back to
//! the server verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic tag identifying a point in the backend's change history.
///
/// Zero means "no data seen yet"; a query sent with index zero returns
/// immediately instead of blocking.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConsistencyIndex(u64);

impl ConsistencyIndex {
    /// The index of a stream that has not produced data yet.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw index value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw index value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether this stream has not seen any data yet.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Folds an index observed in a response into this one.
    ///
    /// The stored index never moves backwards, and a zero observation (a
    /// response without index metadata) leaves it untouched.
    pub fn advance(&mut self, observed: ConsistencyIndex) -> bool {
        if observed.0 > self.0 {
            self.0 = observed.0;
            true
        } else {
            false
        }
    }
}

impl From<u64> for ConsistencyIndex {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConsistencyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque "resume listing after this point" marker issued by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wraps a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContinuationToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ContinuationToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
