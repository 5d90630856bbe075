//! Watch coordinator: owns the loops, the gate and the read model.
//!
//! Loop tasks never touch shared state. They send [`LoopEvent`]s to a single
//! driver task, which applies them one at a time under the coordinator lock;
//! user actions take the same lock. Detail restarts therefore always happen
//! while handling the listing event that caused them.

use crate::client::BlockingQueryClient;
use crate::config::WatchConfig;
use crate::detail_loop::DetailWatchLoop;
use crate::error::{WatchError, WatchResult};
use crate::event::{IdChange, LoopEvent};
use crate::gate::{GateDecision, LiveUpdateGate};
use crate::handle::LoopStatus;
use crate::id_loop::{IdWatchLoop, ListingSeed};
use crate::paginator::CursorPaginator;
use crate::prefs::{PreferenceStore, WatchPreferences};
use crate::transport::{QueryKind, QueryTransport, RequestSpec};
use joblist_types::{
    ConsistencyIndex, ContinuationToken, Cursor, DetailSnapshot, Direction, JobIdSet, JobRecord,
    JobRef, Scope,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the notification broadcast channel.
const NOTIFICATION_CAPACITY: usize = 64;

/// Change notifications for the rendering layer. Each fires once per applied
/// change, never for a cycle that changed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchNotification {
    /// The displayed page membership changed.
    IdsChanged { ids: JobIdSet },
    /// The displayed job records changed.
    DetailsChanged,
    /// A membership change is waiting for [`WatchCoordinator::apply_pending`].
    PendingAvailable { ids: JobIdSet },
    /// The backend denied access; all loops have stopped.
    Forbidden { reason: String },
}

/// One displayed row: the job and the best record known for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRow {
    pub job: JobRef,
    pub record: Option<JobRecord>,
    /// Whether `record` comes from the details loop rather than the listing.
    pub detailed: bool,
}

/// Read model handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub ids: JobIdSet,
    pub rows: Vec<PageRow>,
    pub details: DetailSnapshot,
    pub has_next: bool,
    pub has_prev: bool,
    pub pending: Option<JobIdSet>,
    pub forbidden: bool,
    pub cursor: Cursor,
    /// Index of the latest listing cycle.
    pub index: ConsistencyIndex,
    /// Index of the details currently shown.
    pub details_index: ConsistencyIndex,
}

struct Session {
    scope: Scope,
    id_loop: IdWatchLoop,
    detail_loop: DetailWatchLoop,
    driver: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

struct CoordinatorState {
    session: Option<Session>,
    paginator: CursorPaginator,
    gate: LiveUpdateGate,
    active: JobIdSet,
    stubs: BTreeMap<JobRef, JobRecord>,
    details: DetailSnapshot,
    forbidden: Option<String>,
    listing_index: ConsistencyIndex,
    details_index: ConsistencyIndex,
    /// Bumped whenever the cursor moves, so a late reverse lookup can tell
    /// it was overtaken.
    nav_epoch: u64,
}

impl CoordinatorState {
    fn new(page_size: usize) -> Self {
        Self {
            session: None,
            paginator: CursorPaginator::new(page_size),
            gate: LiveUpdateGate::new(true),
            active: JobIdSet::new(),
            stubs: BTreeMap::new(),
            details: DetailSnapshot::new(),
            forbidden: None,
            listing_index: ConsistencyIndex::ZERO,
            details_index: ConsistencyIndex::ZERO,
            nav_epoch: 0,
        }
    }

    fn session(&mut self) -> WatchResult<&mut Session> {
        self.session.as_mut().ok_or(WatchError::NotEntered)
    }

    /// The session, provided its loops were not stopped by a denial.
    fn watching(&mut self) -> WatchResult<&mut Session> {
        if self.session.is_none() {
            return Err(WatchError::NotEntered);
        }
        if let Some(reason) = &self.forbidden {
            return Err(WatchError::Forbidden(reason.clone()));
        }
        self.session()
    }

    fn handle_event(&mut self, event: LoopEvent) -> Vec<WatchNotification> {
        let (id_generation, detail_generation) = match &self.session {
            Some(session) => (session.id_loop.generation(), session.detail_loop.generation()),
            None => return Vec::new(),
        };

        match event {
            LoopEvent::Listing {
                generation,
                initial,
                index,
                next_token,
                change,
            } => {
                if generation != id_generation {
                    debug!("Dropping stale job list event (generation {})", generation);
                    return Vec::new();
                }
                self.listing_index = index;
                self.paginator.observe_next_token(next_token);
                let Some(change) = change else {
                    return Vec::new();
                };
                if initial {
                    // First page after navigation: shown regardless of the gate.
                    self.gate.clear();
                    return self.apply_change(change);
                }
                match self.gate.offer(&self.active, change) {
                    GateDecision::Apply(change) => self.apply_change(change),
                    GateDecision::Buffered => {
                        let ids = self.gate.pending_ids().cloned().unwrap_or_default();
                        debug!("Buffering job list change of {} jobs", ids.len());
                        vec![WatchNotification::PendingAvailable { ids }]
                    }
                    GateDecision::Unchanged => Vec::new(),
                }
            }
            LoopEvent::Details {
                generation,
                index,
                snapshot,
            } => {
                if generation != detail_generation {
                    debug!("Dropping stale job details event (generation {})", generation);
                    return Vec::new();
                }
                if snapshot == self.details {
                    return Vec::new();
                }
                self.details = snapshot;
                self.details_index = index;
                vec![WatchNotification::DetailsChanged]
            }
            LoopEvent::Forbidden {
                generation,
                kind,
                reason,
            } => {
                let current = match kind {
                    QueryKind::Details => detail_generation,
                    _ => id_generation,
                };
                if generation != current {
                    return Vec::new();
                }
                self.forbid(reason)
            }
        }
    }

    /// Swaps in a new active set and restarts the details loop once.
    fn apply_change(&mut self, change: IdChange) -> Vec<WatchNotification> {
        let IdChange { ids, records } = change;
        self.active = ids.clone();
        self.stubs = records.into_iter().map(|r| (r.job_ref(), r)).collect();
        if let Some(session) = self.session.as_mut() {
            session.detail_loop.restart(&session.scope, ids.clone());
        }
        vec![WatchNotification::IdsChanged { ids }]
    }

    /// Stops every loop for the scope after an authorization denial.
    fn forbid(&mut self, reason: String) -> Vec<WatchNotification> {
        warn!("Job list access forbidden, stopping watches: {}", reason);
        if let Some(session) = self.session.as_mut() {
            session.id_loop.stop();
            session.detail_loop.stop();
        }
        self.forbidden = Some(reason.clone());
        vec![WatchNotification::Forbidden { reason }]
    }

    /// Points the listing loop at the paginator's cursor. A pending change
    /// belongs to the old position, so it is dropped only when the loop
    /// actually restarts.
    fn retarget_listing(&mut self) -> WatchResult<()> {
        let cursor = self.paginator.cursor().clone();
        let session = self.watching()?;
        let scope = session.scope.clone();
        if session.id_loop.retarget(&scope, &cursor) {
            self.gate.clear();
        }
        Ok(())
    }

    fn view(&self) -> PageView {
        let rows = self
            .active
            .iter()
            .map(|job| match self.details.get(job) {
                Some(record) => PageRow {
                    job: job.clone(),
                    record: Some(record.clone()),
                    detailed: true,
                },
                None => PageRow {
                    job: job.clone(),
                    record: self.stubs.get(job).cloned(),
                    detailed: false,
                },
            })
            .collect();

        PageView {
            ids: self.active.clone(),
            rows,
            details: self.details.clone(),
            has_next: self.paginator.has_next(),
            has_prev: self.paginator.has_prev(),
            pending: self
                .gate
                .has_pending_diff(&self.active)
                .then(|| self.gate.pending_ids().cloned())
                .flatten(),
            forbidden: self.forbidden.is_some(),
            cursor: self.paginator.cursor().clone(),
            index: self.listing_index,
            details_index: self.details_index,
        }
    }
}

/// Root of the watch engine.
///
/// `enter` starts watching a scope, `leave` stops everything; in between the
/// coordinator keeps [`current_page`](Self::current_page) fresh and publishes
/// [`WatchNotification`]s.
pub struct WatchCoordinator {
    client: BlockingQueryClient,
    prefs: Arc<dyn PreferenceStore>,
    config: WatchConfig,
    state: Arc<Mutex<CoordinatorState>>,
    notifications: broadcast::Sender<WatchNotification>,
}

impl WatchCoordinator {
    /// Creates a coordinator. Nothing is polled until [`enter`](Self::enter).
    pub fn new(
        transport: Arc<dyn QueryTransport>,
        prefs: Arc<dyn PreferenceStore>,
        config: WatchConfig,
    ) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            client: BlockingQueryClient::new(transport),
            prefs,
            state: Arc::new(Mutex::new(CoordinatorState::new(config.default_page_size))),
            config,
            notifications,
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchNotification> {
        self.notifications.subscribe()
    }

    /// Starts watching `scope`, positioned at `cursor_at` (`None` for the
    /// first page).
    ///
    /// Loads the first page before returning, so an authorization denial or
    /// transport failure reaches the caller and no loop is started.
    pub async fn enter(
        &self,
        scope: Scope,
        cursor_at: Option<ContinuationToken>,
    ) -> WatchResult<()> {
        self.leave().await;

        let prefs = WatchPreferences::load(self.prefs.as_ref(), self.config.default_page_size);
        let cursor = Cursor::at(cursor_at, prefs.page_size);
        info!(
            "Entering job list for namespace {} (page size {}, live updates {})",
            scope.namespace, prefs.page_size, prefs.live_updates_enabled
        );

        let spec = RequestSpec::listing(&scope, &cursor, ConsistencyIndex::ZERO);
        let initial = match self.client.one_shot(&spec).await {
            Ok(result) => result,
            Err(WatchError::Forbidden(reason)) => {
                let notes = {
                    let mut state = self.state.lock().await;
                    state.forbid(reason.clone())
                };
                self.publish(notes);
                return Err(WatchError::Forbidden(reason));
            }
            Err(e) => return Err(e),
        };

        let ids = JobIdSet::from_records(&initial.items);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        {
            let mut state = self.state.lock().await;
            state.paginator = CursorPaginator::at(cursor.cursor_at.clone(), cursor.page_size);
            state.paginator.observe_next_token(initial.meta.next_token.clone());
            state.gate = LiveUpdateGate::new(prefs.live_updates_enabled);
            state.forbidden = None;
            state.details = DetailSnapshot::new();
            state.listing_index = initial.meta.index;
            state.details_index = ConsistencyIndex::ZERO;
            state.nav_epoch += 1;
            state.active = ids.clone();
            state.stubs = initial.items.iter().map(|r| (r.job_ref(), r.clone())).collect();

            let mut id_loop = IdWatchLoop::new(
                self.client.clone(),
                self.config.id_throttle(),
                events_tx.clone(),
            );
            let mut detail_loop = DetailWatchLoop::new(
                self.client.clone(),
                self.config.detail_throttle(),
                events_tx,
            );
            detail_loop.restart(&scope, ids.clone());
            id_loop.start(
                scope.clone(),
                cursor,
                Some(ListingSeed {
                    index: initial.meta.index,
                    ids: ids.clone(),
                }),
            );

            let driver = tokio::spawn(drive(
                Arc::downgrade(&self.state),
                events_rx,
                self.notifications.clone(),
            ));
            state.session = Some(Session {
                scope,
                id_loop,
                detail_loop,
                driver,
            });
        }

        self.publish(vec![WatchNotification::IdsChanged { ids }]);
        Ok(())
    }

    /// Stops both loops and releases every handle. The read model is cleared.
    pub async fn leave(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut session) = state.session.take() {
            info!("Leaving job list for namespace {}", session.scope.namespace);
            session.id_loop.stop();
            session.detail_loop.stop();
        }
        state.gate.clear();
        state.active = JobIdSet::new();
        state.stubs.clear();
        state.details = DetailSnapshot::new();
        state.forbidden = None;
        state.listing_index = ConsistencyIndex::ZERO;
        state.details_index = ConsistencyIndex::ZERO;
        state.nav_epoch += 1;
    }

    /// Moves one page in `direction` and restarts the listing loop there.
    ///
    /// Boundary errors ([`WatchError::NoNextPage`], [`WatchError::NoPrevPage`])
    /// leave the cursor and loops untouched. After a denial the scope stays
    /// stopped and paging returns [`WatchError::Forbidden`].
    pub async fn change_page(&self, direction: Direction) -> WatchResult<Cursor> {
        match direction {
            Direction::Forward => {
                let mut state = self.state.lock().await;
                state.watching()?;
                state.paginator.next_page()?;
                state.nav_epoch += 1;
                state.retarget_listing()?;
                Ok(state.paginator.cursor().clone())
            }
            Direction::Backward => {
                let (epoch, request) = {
                    let mut state = self.state.lock().await;
                    let scope = state.watching()?.scope.clone();
                    let request = state.paginator.prev_page_request(&scope)?;
                    (state.nav_epoch, request)
                };

                // The reverse lookup is awaited without holding the lock so
                // loop events keep flowing meanwhile.
                let reverse = self.client.one_shot(&request).await;

                let mut state = self.state.lock().await;
                if state.nav_epoch != epoch {
                    debug!("Cursor moved during previous-page lookup, ignoring result");
                    return match reverse {
                        Err(e @ WatchError::Forbidden(_)) => Err(e),
                        _ => Ok(state.paginator.cursor().clone()),
                    };
                }
                let reverse = match reverse {
                    Ok(reverse) => reverse,
                    Err(WatchError::Forbidden(reason)) => {
                        let notes = state.forbid(reason.clone());
                        drop(state);
                        self.publish(notes);
                        return Err(WatchError::Forbidden(reason));
                    }
                    Err(e) => return Err(e),
                };
                state.watching()?;
                state.paginator.resolve_prev_page(&reverse);
                state.nav_epoch += 1;
                state.retarget_listing()?;
                Ok(state.paginator.cursor().clone())
            }
        }
    }

    /// Changes and persists the page size; restarts the listing at index zero.
    ///
    /// After a denial the new size is only remembered; the loops stay stopped.
    pub async fn set_page_size(&self, page_size: usize) -> WatchResult<()> {
        let mut state = self.state.lock().await;
        let previous = state.paginator.page_size();
        state.paginator.set_page_size(page_size)?;
        if previous != page_size {
            state.nav_epoch += 1;
        }
        if let Err(e) = WatchPreferences::save_page_size(self.prefs.as_ref(), page_size) {
            warn!("Failed to persist page size: {}", e);
        }
        if state.session.is_some() && state.forbidden.is_none() {
            state.retarget_listing()?;
        }
        Ok(())
    }

    /// Turns live updates on or off and persists the choice. Turning them on
    /// applies any pending change immediately.
    pub async fn set_live_updates(&self, enabled: bool) {
        if let Err(e) = WatchPreferences::save_live_updates(self.prefs.as_ref(), enabled) {
            warn!("Failed to persist live update preference: {}", e);
        }
        let notes = {
            let mut state = self.state.lock().await;
            match state.gate.set_live(enabled) {
                Some(change) if state.session.is_some() => state.apply_change(change),
                _ => Vec::new(),
            }
        };
        self.publish(notes);
    }

    /// Applies the buffered membership change. Returns false when nothing was
    /// pending.
    pub async fn apply_pending(&self) -> bool {
        let notes = {
            let mut state = self.state.lock().await;
            if state.session.is_none() {
                return false;
            }
            match state.gate.apply_pending() {
                Some(change) => state.apply_change(change),
                None => return false,
            }
        };
        self.publish(notes);
        true
    }

    /// Snapshot of what should be displayed.
    pub async fn current_page(&self) -> PageView {
        self.state.lock().await.view()
    }

    pub async fn cursor(&self) -> Cursor {
        self.state.lock().await.paginator.cursor().clone()
    }

    pub async fn is_entered(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    pub async fn live_updates_enabled(&self) -> bool {
        self.state.lock().await.gate.is_live()
    }

    /// Status of the listing loop, if entered.
    pub async fn id_loop_status(&self) -> Option<LoopStatus> {
        let state = self.state.lock().await;
        state.session.as_ref().map(|s| s.id_loop.status())
    }

    /// Status of the details loop, if entered.
    pub async fn detail_loop_status(&self) -> Option<LoopStatus> {
        let state = self.state.lock().await;
        state.session.as_ref().map(|s| s.detail_loop.status())
    }

    /// Number of details loop restarts in the current session.
    pub async fn detail_restarts(&self) -> u64 {
        let state = self.state.lock().await;
        state.session.as_ref().map_or(0, |s| s.detail_loop.generation())
    }

    fn publish(&self, notes: Vec<WatchNotification>) {
        for note in notes {
            // No subscribers is fine.
            let _ = self.notifications.send(note);
        }
    }
}

async fn drive(
    state: Weak<Mutex<CoordinatorState>>,
    mut events: mpsc::UnboundedReceiver<LoopEvent>,
    notifications: broadcast::Sender<WatchNotification>,
) {
    while let Some(event) = events.recv().await {
        let Some(state) = state.upgrade() else {
            break;
        };
        let notes = state.lock().await.handle_event(event);
        for note in notes {
            let _ = notifications.send(note);
        }
    }
}
