//! Transport layer abstraction.
//!
//! The engine never speaks HTTP itself. It builds a typed [`RequestSpec`] and
//! hands it to a [`QueryTransport`], which returns already-deserialized job
//! records plus blocking-query metadata. [`crate::http::HttpTransport`] talks
//! to a real cluster; [`mock::MockTransport`] scripts replies for tests.

use crate::error::WatchResult;
use async_trait::async_trait;
use joblist_types::{ConsistencyIndex, ContinuationToken, Cursor, JobIdSet, JobRecord, JobRef, Scope};
use serde::{Deserialize, Serialize};

/// Which logical query a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// "Which jobs are on this page" (cheap, paginated).
    Listing,
    /// Full records for an explicit set of jobs (expensive).
    Details,
    /// Reverse one-shot lookup used to find the previous page's token.
    PreviousPage,
}

impl QueryKind {
    /// Short label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            QueryKind::Listing => "listing",
            QueryKind::Details => "details",
            QueryKind::PreviousPage => "previous-page",
        }
    }
}

/// A fully typed blocking-query request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub kind: QueryKind,
    pub scope: Scope,
    /// Last index seen on this stream; zero returns immediately.
    pub index: ConsistencyIndex,
    pub cursor_at: Option<ContinuationToken>,
    pub page_size: Option<usize>,
    pub reverse: bool,
    /// Jobs to fetch details for; empty for listings.
    pub jobs: Vec<JobRef>,
}

impl RequestSpec {
    /// A page listing at `cursor`.
    pub fn listing(scope: &Scope, cursor: &Cursor, index: ConsistencyIndex) -> Self {
        Self {
            kind: QueryKind::Listing,
            scope: scope.clone(),
            index,
            cursor_at: cursor.cursor_at.clone(),
            page_size: Some(cursor.page_size),
            reverse: false,
            jobs: Vec::new(),
        }
    }

    /// Details for every job in `jobs`.
    pub fn details(scope: &Scope, jobs: &JobIdSet, index: ConsistencyIndex) -> Self {
        Self {
            kind: QueryKind::Details,
            scope: scope.clone(),
            index,
            cursor_at: None,
            page_size: None,
            reverse: false,
            jobs: jobs.iter().cloned().collect(),
        }
    }

    /// A reverse listing anchored at `anchor`, one job longer than a page so
    /// the result reaches the first job of the preceding page.
    pub fn previous_page(scope: &Scope, anchor: &ContinuationToken, page_size: usize) -> Self {
        Self {
            kind: QueryKind::PreviousPage,
            scope: scope.clone(),
            index: ConsistencyIndex::ZERO,
            cursor_at: Some(anchor.clone()),
            page_size: Some(page_size + 1),
            reverse: true,
            jobs: Vec::new(),
        }
    }
}

/// Blocking-query metadata returned with every result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMeta {
    pub index: ConsistencyIndex,
    pub next_token: Option<ContinuationToken>,
}

/// A deserialized query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub items: Vec<JobRecord>,
    pub meta: QueryMeta,
}

impl QueryResult {
    /// Builds a result from records and metadata.
    pub fn new(items: Vec<JobRecord>, index: u64, next_token: Option<ContinuationToken>) -> Self {
        Self {
            items,
            meta: QueryMeta {
                index: ConsistencyIndex::new(index),
                next_token,
            },
        }
    }
}

/// The capability the engine calls into to run one query.
///
/// Implementations must be cancel-safe: the engine drops the returned future
/// to abort a request, and a dropped request must leave no trace.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Issues a request and waits for its result.
    async fn issue(&self, spec: &RequestSpec) -> WatchResult<QueryResult>;
}

/// A scripted transport for testing.
pub mod mock {
    use super::*;
    use crate::error::WatchError;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use tokio::sync::Notify;

    /// A queued reply for one request kind.
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Ok(QueryResult),
        Fail(String),
        Forbidden(String),
    }

    impl From<MockReply> for WatchResult<QueryResult> {
        fn from(reply: MockReply) -> Self {
            match reply {
                MockReply::Ok(result) => Ok(result),
                MockReply::Fail(msg) => Err(WatchError::TransportFailed(msg)),
                MockReply::Forbidden(msg) => Err(WatchError::Forbidden(msg)),
            }
        }
    }

    #[derive(Debug, Default)]
    struct KindState {
        replies: VecDeque<MockReply>,
        in_flight: usize,
        peak_in_flight: usize,
    }

    /// A transport that behaves like a blocking-query server with no new data
    /// until a test queues a reply.
    ///
    /// Each request pops the next reply for its [`QueryKind`]; when none is
    /// queued the request blocks, exactly like a long poll, until one is pushed
    /// or the caller drops it.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        kinds: Mutex<HashMap<QueryKind, KindState>>,
        requests: Mutex<Vec<RequestSpec>>,
        reply_pushed: Notify,
        request_seen: Notify,
    }

    struct InFlight<'a> {
        transport: &'a MockTransport,
        kind: QueryKind,
    }

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            let mut kinds = self.transport.kinds();
            if let Some(state) = kinds.get_mut(&self.kind) {
                state.in_flight -= 1;
            }
        }
    }

    impl MockTransport {
        /// Creates a transport with no queued replies.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues a reply for the next request of `kind`.
        pub fn push(&self, kind: QueryKind, reply: MockReply) {
            self.kinds()
                .entry(kind)
                .or_default()
                .replies
                .push_back(reply);
            self.reply_pushed.notify_waiters();
        }

        /// Queues a successful listing page.
        pub fn push_listing(&self, items: Vec<JobRecord>, index: u64, next_token: Option<&str>) {
            let result = QueryResult::new(items, index, next_token.map(ContinuationToken::from));
            self.push(QueryKind::Listing, MockReply::Ok(result));
        }

        /// Queues a successful details result.
        pub fn push_details(&self, items: Vec<JobRecord>, index: u64) {
            self.push(QueryKind::Details, MockReply::Ok(QueryResult::new(items, index, None)));
        }

        /// Queues a successful reverse lookup.
        pub fn push_previous(&self, items: Vec<JobRecord>, next_token: Option<&str>) {
            let result = QueryResult::new(items, 0, next_token.map(ContinuationToken::from));
            self.push(QueryKind::PreviousPage, MockReply::Ok(result));
        }

        /// Queues a transport failure.
        pub fn push_failure(&self, kind: QueryKind, msg: impl Into<String>) {
            self.push(kind, MockReply::Fail(msg.into()));
        }

        /// Queues an authorization denial.
        pub fn push_forbidden(&self, kind: QueryKind) {
            self.push(kind, MockReply::Forbidden("permission denied".into()));
        }

        /// Every request issued so far, in order.
        pub fn requests(&self) -> Vec<RequestSpec> {
            self.log().clone()
        }

        /// Requests of one kind, in order.
        pub fn requests_of(&self, kind: QueryKind) -> Vec<RequestSpec> {
            self.log()
                .iter()
                .filter(|r| r.kind == kind)
                .cloned()
                .collect()
        }

        /// Number of requests of one kind issued so far.
        pub fn request_count(&self, kind: QueryKind) -> usize {
            self.log().iter().filter(|r| r.kind == kind).count()
        }

        /// Requests of `kind` currently awaiting a reply.
        pub fn in_flight(&self, kind: QueryKind) -> usize {
            self.kinds().get(&kind).map_or(0, |s| s.in_flight)
        }

        /// Highest number of simultaneously outstanding requests of `kind`.
        pub fn peak_in_flight(&self, kind: QueryKind) -> usize {
            self.kinds().get(&kind).map_or(0, |s| s.peak_in_flight)
        }

        /// Waits until at least `count` requests of `kind` have been issued.
        pub async fn wait_for_requests(&self, kind: QueryKind, count: usize) {
            loop {
                let seen = self.request_seen.notified();
                if self.request_count(kind) >= count {
                    return;
                }
                seen.await;
            }
        }

        fn kinds(&self) -> MutexGuard<'_, HashMap<QueryKind, KindState>> {
            self.kinds.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn log(&self) -> MutexGuard<'_, Vec<RequestSpec>> {
            self.requests.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn begin(&self, spec: &RequestSpec) -> InFlight<'_> {
            {
                let mut kinds = self.kinds();
                let state = kinds.entry(spec.kind).or_default();
                state.in_flight += 1;
                state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
            }
            self.log().push(spec.clone());
            self.request_seen.notify_waiters();
            InFlight {
                transport: self,
                kind: spec.kind,
            }
        }

        fn pop(&self, kind: QueryKind) -> Option<MockReply> {
            self.kinds()
                .get_mut(&kind)
                .and_then(|s| s.replies.pop_front())
        }
    }

    #[async_trait]
    impl QueryTransport for MockTransport {
        async fn issue(&self, spec: &RequestSpec) -> WatchResult<QueryResult> {
            let _in_flight = self.begin(spec);
            loop {
                let pushed = self.reply_pushed.notified();
                if let Some(reply) = self.pop(spec.kind) {
                    return reply.into();
                }
                pushed.await;
            }
        }
    }
}
