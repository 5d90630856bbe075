//! Running-loop handles and loop status.

use joblist_types::ConsistencyIndex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a long-poll loop.
///
/// ```text
/// Idle ──start──▶ Running ──result──▶ Updated ──throttle──▶ Running ...
///                    │                                        ▲
///                    └──failure──▶ Stalled ──throttle─────────┘
/// any ──stop──▶ Stopped
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    #[default]
    Idle,
    Running,
    Updated,
    Stalled,
    Stopped,
}

/// Point-in-time view of a loop, published by the loop task itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStatus {
    pub state: LoopState,
    /// Index the next query will carry.
    pub index: ConsistencyIndex,
    /// Successful cycles since the loop started.
    pub cycles: u64,
    /// Failed or externally aborted cycles since the loop started.
    pub stalls: u64,
}

impl LoopStatus {
    pub(crate) fn stopped(self) -> Self {
        Self {
            state: LoopState::Stopped,
            ..self
        }
    }
}

/// One running loop task.
///
/// Dropping the handle cancels the loop; the task is aborted at its next
/// suspension point and any event it still emits is stale by generation.
#[derive(Debug)]
pub struct WatchHandle {
    generation: u64,
    cancel: CancellationToken,
    status: watch::Receiver<LoopStatus>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Spawns `body` as a loop task. The body receives the cancellation token
    /// and the status sender it must keep current.
    pub(crate) fn spawn<F, Fut>(generation: u64, initial: LoopStatus, body: F) -> Self
    where
        F: FnOnce(CancellationToken, watch::Sender<LoopStatus>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let (status_tx, status) = watch::channel(initial);
        let task = tokio::spawn(body(cancel.clone(), status_tx));
        Self {
            generation,
            cancel,
            status,
            task,
        }
    }

    /// Generation this handle was started with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Latest status published by the task.
    pub fn status(&self) -> LoopStatus {
        *self.status.borrow()
    }

    /// Whether the task has exited on its own (e.g. after a forbidden reply).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}
