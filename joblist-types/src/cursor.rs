//! Pagination cursor and query scope.

use crate::index::ContinuationToken;
use serde::{Deserialize, Serialize};

/// Namespace wildcard selecting jobs from every namespace.
pub const ALL_NAMESPACES: &str = "*";

/// Direction of the most recent page move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Position within the paginated listing.
///
/// `cursor_at == None` always means the first page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Token of the first job on the page, or `None` for the first page.
    pub cursor_at: Option<ContinuationToken>,
    /// Number of jobs per page.
    pub page_size: usize,
    /// Which way the user last moved.
    pub direction: Direction,
}

impl Cursor {
    /// A cursor positioned at the first page.
    #[must_use]
    pub fn first_page(page_size: usize) -> Self {
        Self {
            cursor_at: None,
            page_size,
            direction: Direction::Forward,
        }
    }

    /// A cursor positioned at the given token (or the first page for `None`).
    #[must_use]
    pub fn at(cursor_at: Option<ContinuationToken>, page_size: usize) -> Self {
        Self {
            cursor_at,
            page_size,
            direction: Direction::Forward,
        }
    }

    /// Whether this cursor points at the first page.
    #[must_use]
    pub fn is_first_page(&self) -> bool {
        self.cursor_at.is_none()
    }
}

/// The filter set a watch covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Namespace to list; [`ALL_NAMESPACES`] for every namespace.
    pub namespace: String,
    /// Optional server-side filter expression, passed through unchanged.
    #[serde(default)]
    pub filter: Option<String>,
}

impl Scope {
    /// Scope covering every namespace.
    #[must_use]
    pub fn all() -> Self {
        Self {
            namespace: ALL_NAMESPACES.to_string(),
            filter: None,
        }
    }

    /// Scope restricted to one namespace.
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            filter: None,
        }
    }

    /// Adds a server-side filter expression.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Whether this scope spans all namespaces.
    #[must_use]
    pub fn is_all_namespaces(&self) -> bool {
        self.namespace == ALL_NAMESPACES
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::all()
    }
}
