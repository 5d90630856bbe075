//! Cursor-based pagination over the job listing.
//!
//! Pages are addressed by continuation tokens, never offsets: the listing is
//! large and mutating, so "the 40th job" is meaningless a second later while
//! "the job after `default.web`" is stable.

use crate::client::BlockingQueryClient;
use crate::error::{WatchError, WatchResult};
use crate::transport::{QueryResult, RequestSpec};
use joblist_types::{ContinuationToken, Cursor, Direction, Scope};
use tracing::debug;

/// Owns the cursor and moves it between pages.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    cursor: Cursor,
    /// Token reported by the most recent listing result.
    next_token: Option<ContinuationToken>,
}

impl CursorPaginator {
    /// A paginator at the first page.
    pub fn new(page_size: usize) -> Self {
        Self::at(None, page_size)
    }

    /// A paginator positioned at `cursor_at`.
    pub fn at(cursor_at: Option<ContinuationToken>, page_size: usize) -> Self {
        Self {
            cursor: Cursor::at(cursor_at, page_size),
            next_token: None,
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn page_size(&self) -> usize {
        self.cursor.page_size
    }

    pub fn next_token(&self) -> Option<&ContinuationToken> {
        self.next_token.as_ref()
    }

    pub fn has_next(&self) -> bool {
        self.next_token.is_some()
    }

    pub fn has_prev(&self) -> bool {
        self.cursor.cursor_at.is_some()
    }

    /// Records the continuation token from the latest listing result; `None`
    /// means the current page is the last one.
    pub fn observe_next_token(&mut self, token: Option<ContinuationToken>) {
        self.next_token = token;
    }

    /// Moves to the page after the current one.
    pub fn next_page(&mut self) -> WatchResult<&Cursor> {
        let token = self.next_token.take().ok_or(WatchError::NoNextPage)?;
        debug!("Paging forward to {}", token);
        self.cursor.cursor_at = Some(token);
        self.cursor.direction = Direction::Forward;
        Ok(&self.cursor)
    }

    /// Builds the reverse lookup that locates the previous page.
    pub fn prev_page_request(&self, scope: &Scope) -> WatchResult<RequestSpec> {
        let anchor = self.cursor.cursor_at.as_ref().ok_or(WatchError::NoPrevPage)?;
        Ok(RequestSpec::previous_page(scope, anchor, self.cursor.page_size))
    }

    /// Applies the result of [`prev_page_request`](Self::prev_page_request).
    ///
    /// The reverse listing starts at the current page's first job and walks
    /// backwards `page_size + 1` jobs, so its last item is the first job of the
    /// previous page. With one item or fewer there is nothing before the
    /// current page and the cursor returns to the first page. A reverse result
    /// without a continuation token has reached the start of the listing,
    /// which also means the previous page is the first one.
    pub fn resolve_prev_page(&mut self, reverse: &QueryResult) -> &Cursor {
        let cursor_at = if reverse.items.len() > 1 {
            match (&reverse.meta.next_token, reverse.items.last()) {
                (Some(_), Some(oldest)) => Some(oldest.job_ref().to_token()),
                _ => None,
            }
        } else {
            None
        };
        debug!(
            "Paging back to {}",
            cursor_at.as_ref().map_or("first page", ContinuationToken::as_str)
        );
        self.cursor.cursor_at = cursor_at;
        self.cursor.direction = Direction::Backward;
        self.next_token = None;
        &self.cursor
    }

    /// Moves to the page before the current one, issuing one reverse lookup.
    pub async fn prev_page(
        &mut self,
        client: &BlockingQueryClient,
        scope: &Scope,
    ) -> WatchResult<&Cursor> {
        let request = self.prev_page_request(scope)?;
        let reverse = client.one_shot(&request).await?;
        Ok(self.resolve_prev_page(&reverse))
    }

    /// Changes the page size. Indexes recorded against the old page size are
    /// meaningless afterwards; callers restart their loops.
    pub fn set_page_size(&mut self, page_size: usize) -> WatchResult<()> {
        if page_size == 0 {
            return Err(WatchError::InvalidPageSize(page_size));
        }
        self.cursor.page_size = page_size;
        Ok(())
    }

    /// Moves to an explicit position, e.g. when a view is entered from a link.
    pub fn reset(&mut self, cursor_at: Option<ContinuationToken>) {
        self.cursor.cursor_at = cursor_at;
        self.cursor.direction = Direction::Forward;
        self.next_token = None;
    }
}
