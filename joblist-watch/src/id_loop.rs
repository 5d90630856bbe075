//! The job listing loop: "which jobs are on this page".
//!
//! Long-polls the listing for the current scope and cursor, re-arming with the
//! index of each result. Reports the continuation token on every cycle and
//! the page membership whenever it changes.

use crate::client::{BlockingQueryClient, QueryChannel};
use crate::error::WatchError;
use crate::event::{IdChange, LoopEvent};
use crate::handle::{LoopState, LoopStatus, WatchHandle};
use crate::throttle::Throttle;
use crate::transport::{QueryKind, RequestSpec};
use joblist_types::{ConsistencyIndex, Cursor, JobIdSet, Scope};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// State carried over from an initial page load so the loop starts blocking
/// instead of re-fetching what is already displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSeed {
    pub index: ConsistencyIndex,
    pub ids: JobIdSet,
}

/// Controller for the listing loop task.
pub struct IdWatchLoop {
    client: BlockingQueryClient,
    channel: Arc<QueryChannel>,
    throttle: Throttle,
    events: mpsc::UnboundedSender<LoopEvent>,
    generation: u64,
    handle: Option<WatchHandle>,
    target: Option<(Scope, Cursor)>,
    last_status: LoopStatus,
}

impl IdWatchLoop {
    /// Creates an idle loop.
    pub fn new(
        client: BlockingQueryClient,
        throttle: Throttle,
        events: mpsc::UnboundedSender<LoopEvent>,
    ) -> Self {
        Self {
            client,
            channel: Arc::new(QueryChannel::new("job-list")),
            throttle,
            events,
            generation: 0,
            handle: None,
            target: None,
            last_status: LoopStatus::default(),
        }
    }

    /// Starts (or restarts) polling `scope` at `cursor`.
    ///
    /// Without a seed the loop starts at index zero and its first result is
    /// flagged `initial`.
    pub fn start(&mut self, scope: Scope, cursor: Cursor, seed: Option<ListingSeed>) {
        self.halt();
        self.generation += 1;

        let (index, last) = match seed {
            Some(seed) => (seed.index, Some(seed.ids)),
            None => (ConsistencyIndex::ZERO, None),
        };
        info!(
            "Starting job list watch (generation {}) for namespace {} at {}",
            self.generation,
            scope.namespace,
            cursor.cursor_at.as_ref().map_or("first page", |t| t.as_str())
        );

        let task = ListingTask {
            client: self.client.clone(),
            channel: self.channel.clone(),
            throttle: self.throttle,
            events: self.events.clone(),
            generation: self.generation,
            spec: RequestSpec::listing(&scope, &cursor, index),
            last,
        };
        let initial = LoopStatus {
            state: LoopState::Running,
            index,
            ..Default::default()
        };
        self.handle = Some(WatchHandle::spawn(self.generation, initial, |cancel, status| {
            task.run(cancel, status)
        }));
        self.target = Some((scope, cursor));
    }

    /// Restarts at index zero if the scope or cursor position changed.
    /// Returns whether a restart happened.
    pub fn retarget(&mut self, scope: &Scope, cursor: &Cursor) -> bool {
        let unchanged = matches!(&self.target, Some((s, c))
            if s == scope && c.cursor_at == cursor.cursor_at && c.page_size == cursor.page_size);
        if unchanged && self.handle.is_some() {
            return false;
        }
        self.start(scope.clone(), cursor.clone(), None);
        true
    }

    /// Cancels the in-flight query and stops polling.
    pub fn stop(&mut self) {
        if self.handle.is_some() {
            debug!("Stopping job list watch (generation {})", self.generation);
        }
        self.halt();
        self.last_status = self.last_status.stopped();
    }

    fn halt(&mut self) {
        self.channel.cancel();
        if let Some(handle) = self.handle.take() {
            self.last_status = handle.status();
        }
    }

    /// Generation of the current (or most recent) task.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Latest status of the loop.
    pub fn status(&self) -> LoopStatus {
        self.handle.as_ref().map_or(self.last_status, WatchHandle::status)
    }
}

impl Drop for IdWatchLoop {
    fn drop(&mut self) {
        self.channel.cancel();
    }
}

struct ListingTask {
    client: BlockingQueryClient,
    channel: Arc<QueryChannel>,
    throttle: Throttle,
    events: mpsc::UnboundedSender<LoopEvent>,
    generation: u64,
    spec: RequestSpec,
    last: Option<JobIdSet>,
}

impl ListingTask {
    async fn run(mut self, cancel: CancellationToken, status: watch::Sender<LoopStatus>) {
        let mut initial = self.last.is_none();

        loop {
            status.send_modify(|s| s.state = LoopState::Running);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.client.query(&self.channel, &self.spec) => outcome,
            };

            match outcome {
                Ok(Some(result)) => {
                    self.spec.index.advance(result.meta.index);
                    let ids = JobIdSet::from_records(&result.items);
                    let changed = self.last.as_ref().is_none_or(|last| !last.same_members(&ids));
                    let change = changed.then(|| IdChange {
                        ids: ids.clone(),
                        records: result.items,
                    });
                    if changed {
                        debug!("Job list changed: {} jobs at index {}", ids.len(), self.spec.index);
                    }
                    self.last = Some(ids);

                    let index = self.spec.index;
                    status.send_modify(|s| {
                        s.state = LoopState::Updated;
                        s.index = index;
                        s.cycles += 1;
                    });

                    let event = LoopEvent::Listing {
                        generation: self.generation,
                        initial,
                        index,
                        next_token: result.meta.next_token,
                        change,
                    };
                    if self.events.send(event).is_err() {
                        break;
                    }
                    initial = false;
                }
                Ok(None) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    debug!("Job list query aborted externally, stalling");
                    status.send_modify(|s| {
                        s.state = LoopState::Stalled;
                        s.stalls += 1;
                    });
                }
                Err(WatchError::Forbidden(reason)) => {
                    warn!("Job list watch forbidden: {}", reason);
                    let _ = self.events.send(LoopEvent::Forbidden {
                        generation: self.generation,
                        kind: QueryKind::Listing,
                        reason,
                    });
                    break;
                }
                Err(e) => {
                    warn!("Error fetching job list at index {}: {}", self.spec.index, e);
                    status.send_modify(|s| {
                        s.state = LoopState::Stalled;
                        s.stalls += 1;
                    });
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.throttle.wait() => {}
            }
        }

        status.send_modify(|s| s.state = LoopState::Stopped);
    }
}
