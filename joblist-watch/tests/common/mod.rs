//! Shared test helpers for watch engine tests.

#![allow(dead_code)]

use joblist_types::{JobIdSet, JobRecord, JobRef};
use joblist_watch::{
    LoopEvent, MemoryPreferences, MockTransport, QueryKind, WatchConfig, WatchCoordinator,
    WatchNotification,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

/// Upper bound for anything a test waits on.
pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn job(id: &str) -> JobRecord {
    JobRecord::new(id, "default")
}

pub fn jobs(ids: &[&str]) -> Vec<JobRecord> {
    ids.iter().map(|id| job(id)).collect()
}

/// Detail records carry a status so they are distinguishable from listing stubs.
pub fn detailed(ids: &[&str], status: &str) -> Vec<JobRecord> {
    ids.iter().map(|id| job(id).with_status(status)).collect()
}

pub fn refs(ids: &[&str]) -> JobIdSet {
    ids.iter().map(|id| JobRef::new(*id, "default")).collect()
}

pub fn make_coordinator(mock: &Arc<MockTransport>) -> (WatchCoordinator, Arc<MemoryPreferences>) {
    let prefs = Arc::new(MemoryPreferences::new());
    let coordinator = WatchCoordinator::new(mock.clone(), prefs.clone(), WatchConfig::headless());
    (coordinator, prefs)
}

pub async fn wait_for_requests(mock: &MockTransport, kind: QueryKind, count: usize) {
    timeout(TIMEOUT, mock.wait_for_requests(kind, count))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {count} {} requests", kind.label()));
}

pub async fn next_note(rx: &mut broadcast::Receiver<WatchNotification>) -> WatchNotification {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed")
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<LoopEvent>) -> LoopEvent {
    timeout(TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for loop event")
        .expect("event channel closed")
}

/// Polls `condition` until it holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition never became true");
}
