//! The job details loop: full records for the jobs on the page.
//!
//! Restarted from scratch whenever the applied ID set changes. A restart
//! cancels the outstanding query, resets the index and queries immediately;
//! the throttle only spaces out successive cycles of one run.

use crate::client::{BlockingQueryClient, QueryChannel};
use crate::error::WatchError;
use crate::event::LoopEvent;
use crate::handle::{LoopState, LoopStatus, WatchHandle};
use crate::throttle::Throttle;
use crate::transport::{QueryKind, RequestSpec};
use joblist_types::{ConsistencyIndex, DetailSnapshot, JobIdSet, Scope};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Controller for the details loop task.
pub struct DetailWatchLoop {
    client: BlockingQueryClient,
    channel: Arc<QueryChannel>,
    throttle: Throttle,
    events: mpsc::UnboundedSender<LoopEvent>,
    generation: u64,
    handle: Option<WatchHandle>,
    ids: JobIdSet,
    last_status: LoopStatus,
}

impl DetailWatchLoop {
    /// Creates an idle loop.
    pub fn new(
        client: BlockingQueryClient,
        throttle: Throttle,
        events: mpsc::UnboundedSender<LoopEvent>,
    ) -> Self {
        Self {
            client,
            channel: Arc::new(QueryChannel::new("job-details")),
            throttle,
            events,
            generation: 0,
            handle: None,
            ids: JobIdSet::new(),
            last_status: LoopStatus::default(),
        }
    }

    /// Cancels the current run and starts polling details for `ids` at index
    /// zero. An empty set leaves the loop idle.
    pub fn restart(&mut self, scope: &Scope, ids: JobIdSet) {
        self.channel.cancel();
        self.handle = None;
        self.generation += 1;
        self.ids = ids;
        self.last_status = LoopStatus::default();

        if self.ids.is_empty() {
            debug!("Job details watch idle: no jobs on page");
            return;
        }

        debug!(
            "Restarting job details watch (generation {}) for {} jobs",
            self.generation,
            self.ids.len()
        );
        let task = DetailsTask {
            client: self.client.clone(),
            channel: self.channel.clone(),
            throttle: self.throttle,
            events: self.events.clone(),
            generation: self.generation,
            spec: RequestSpec::details(scope, &self.ids, ConsistencyIndex::ZERO),
            last: None,
        };
        let initial = LoopStatus {
            state: LoopState::Running,
            ..Default::default()
        };
        self.handle = Some(WatchHandle::spawn(self.generation, initial, |cancel, status| {
            task.run(cancel, status)
        }));
    }

    /// Cancels the in-flight query and stops polling.
    pub fn stop(&mut self) {
        self.channel.cancel();
        if let Some(handle) = self.handle.take() {
            debug!("Stopping job details watch (generation {})", self.generation);
            self.last_status = handle.status();
        }
        self.last_status = self.last_status.stopped();
    }

    /// Number of restarts so far; also the generation of the current run.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The ID set currently being watched.
    pub fn ids(&self) -> &JobIdSet {
        &self.ids
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Latest status of the loop.
    pub fn status(&self) -> LoopStatus {
        self.handle.as_ref().map_or(self.last_status, WatchHandle::status)
    }
}

impl Drop for DetailWatchLoop {
    fn drop(&mut self) {
        self.channel.cancel();
    }
}

struct DetailsTask {
    client: BlockingQueryClient,
    channel: Arc<QueryChannel>,
    throttle: Throttle,
    events: mpsc::UnboundedSender<LoopEvent>,
    generation: u64,
    spec: RequestSpec,
    last: Option<DetailSnapshot>,
}

impl DetailsTask {
    async fn run(mut self, cancel: CancellationToken, status: watch::Sender<LoopStatus>) {
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
                    let index = self.spec.index;
                    status.send_modify(|s| {
                        s.state = LoopState::Updated;
                        s.index = index;
                        s.cycles += 1;
                    });

                    let snapshot = DetailSnapshot::from_records(result.items);
                    if self.last.as_ref() != Some(&snapshot) {
                        self.last = Some(snapshot.clone());
                        let event = LoopEvent::Details {
                            generation: self.generation,
                            index,
                            snapshot,
                        };
                        if self.events.send(event).is_err() {
                            break;
                        }
                    }
                }
                Ok(None) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    debug!("Job details query aborted externally, stalling");
                    status.send_modify(|s| {
                        s.state = LoopState::Stalled;
                        s.stalls += 1;
                    });
                }
                Err(WatchError::Forbidden(reason)) => {
                    warn!("Job details watch forbidden: {}", reason);
                    let _ = self.events.send(LoopEvent::Forbidden {
                        generation: self.generation,
                        kind: QueryKind::Details,
                        reason,
                    });
                    break;
                }
                Err(e) => {
                    warn!("Error fetching job details at index {}: {}", self.spec.index, e);
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
