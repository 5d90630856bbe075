mod common;

use common::{detailed, eventually, jobs, next_event, refs, wait_for_requests};
use joblist_types::{ConsistencyIndex, ContinuationToken, Cursor, Scope};
use joblist_watch::{
    BlockingQueryClient, DetailWatchLoop, IdWatchLoop, ListingSeed, LoopEvent, LoopState,
    MockTransport, QueryKind, Throttle,
};
use std::sync::Arc;
use tokio::sync::mpsc;

fn make_id_loop() -> (Arc<MockTransport>, IdWatchLoop, mpsc::UnboundedReceiver<LoopEvent>) {
    let mock = Arc::new(MockTransport::new());
    let (tx, rx) = mpsc::unbounded_channel();
    let id_loop = IdWatchLoop::new(BlockingQueryClient::new(mock.clone()), Throttle::zero(), tx);
    (mock, id_loop, rx)
}

fn make_detail_loop() -> (Arc<MockTransport>, DetailWatchLoop, mpsc::UnboundedReceiver<LoopEvent>) {
    let mock = Arc::new(MockTransport::new());
    let (tx, rx) = mpsc::unbounded_channel();
    let detail_loop =
        DetailWatchLoop::new(BlockingQueryClient::new(mock.clone()), Throttle::zero(), tx);
    (mock, detail_loop, rx)
}

fn listing_indexes(mock: &MockTransport) -> Vec<u64> {
    mock.requests_of(QueryKind::Listing)
        .iter()
        .map(|r| r.index.get())
        .collect()
}

// ── Listing loop ────────────────────────────────────────────────

#[tokio::test]
async fn listing_loop_starts_at_zero_and_rearms_with_result_index() {
    let (mock, mut id_loop, mut rx) = make_id_loop();
    id_loop.start(Scope::all(), Cursor::first_page(10), None);

    wait_for_requests(&mock, QueryKind::Listing, 1).await;
    mock.push_listing(jobs(&["a", "b"]), 5, Some("default.c"));

    match next_event(&mut rx).await {
        LoopEvent::Listing {
            generation,
            initial,
            index,
            next_token,
            change,
        } => {
            assert_eq!(generation, id_loop.generation());
            assert!(initial);
            assert_eq!(index, ConsistencyIndex::new(5));
            assert_eq!(next_token, Some(ContinuationToken::from("default.c")));
            assert_eq!(change.unwrap().ids, refs(&["a", "b"]));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    wait_for_requests(&mock, QueryKind::Listing, 2).await;
    assert_eq!(listing_indexes(&mock), vec![0, 5]);
    assert_eq!(id_loop.status().cycles, 1);
}

#[tokio::test]
async fn listing_index_never_decreases() {
    let (mock, mut id_loop, mut rx) = make_id_loop();
    id_loop.start(Scope::all(), Cursor::first_page(10), None);

    mock.push_listing(jobs(&["a"]), 9, None);
    next_event(&mut rx).await;
    mock.push_listing(jobs(&["a"]), 4, None);
    next_event(&mut rx).await;

    wait_for_requests(&mock, QueryKind::Listing, 3).await;
    assert_eq!(listing_indexes(&mock), vec![0, 9, 9]);
    assert_eq!(id_loop.status().index, ConsistencyIndex::new(9));
}

#[tokio::test]
async fn unchanged_membership_reports_no_change() {
    let (mock, mut id_loop, mut rx) = make_id_loop();
    id_loop.start(Scope::all(), Cursor::first_page(10), None);

    mock.push_listing(jobs(&["a", "b"]), 1, Some("default.c"));
    next_event(&mut rx).await;
    mock.push_listing(jobs(&["a", "b"]), 2, None);

    match next_event(&mut rx).await {
        LoopEvent::Listing {
            initial,
            change,
            next_token,
            ..
        } => {
            assert!(!initial);
            assert!(change.is_none());
            assert!(next_token.is_none());
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn seeded_loop_blocks_at_seed_index() {
    let (mock, mut id_loop, mut rx) = make_id_loop();
    let seed = ListingSeed {
        index: ConsistencyIndex::new(12),
        ids: refs(&["a", "b"]),
    };
    id_loop.start(Scope::all(), Cursor::first_page(10), Some(seed));

    wait_for_requests(&mock, QueryKind::Listing, 1).await;
    assert_eq!(listing_indexes(&mock), vec![12]);

    mock.push_listing(jobs(&["a", "c"]), 13, None);
    match next_event(&mut rx).await {
        LoopEvent::Listing { initial, change, .. } => {
            assert!(!initial);
            assert_eq!(change.unwrap().ids, refs(&["a", "c"]));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn failure_stalls_without_advancing_index() {
    let (mock, mut id_loop, mut rx) = make_id_loop();
    id_loop.start(Scope::all(), Cursor::first_page(10), None);

    mock.push_listing(jobs(&["a"]), 7, None);
    next_event(&mut rx).await;
    mock.push_failure(QueryKind::Listing, "503 service unavailable");

    wait_for_requests(&mock, QueryKind::Listing, 3).await;
    assert_eq!(listing_indexes(&mock), vec![0, 7, 7]);

    let status = id_loop.status();
    assert_eq!(status.stalls, 1);
    assert_eq!(status.cycles, 1);
    assert_eq!(status.index, ConsistencyIndex::new(7));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn forbidden_stops_listing_loop() {
    let (mock, mut id_loop, mut rx) = make_id_loop();
    id_loop.start(Scope::all(), Cursor::first_page(10), None);
    mock.push_forbidden(QueryKind::Listing);

    match next_event(&mut rx).await {
        LoopEvent::Forbidden { kind, reason, .. } => {
            assert_eq!(kind, QueryKind::Listing);
            assert_eq!(reason, "permission denied");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    eventually(|| !id_loop.is_running()).await;
    assert_eq!(id_loop.status().state, LoopState::Stopped);
    assert_eq!(mock.request_count(QueryKind::Listing), 1);
}

#[tokio::test]
async fn retarget_restarts_only_on_position_change() {
    let (mock, mut id_loop, _rx) = make_id_loop();
    let scope = Scope::all();
    let cursor = Cursor::first_page(10);
    id_loop.start(scope.clone(), cursor.clone(), None);
    wait_for_requests(&mock, QueryKind::Listing, 1).await;
    let generation = id_loop.generation();

    assert!(!id_loop.retarget(&scope, &cursor));
    assert_eq!(id_loop.generation(), generation);

    let moved = Cursor::at(Some(ContinuationToken::from("abc")), 10);
    assert!(id_loop.retarget(&scope, &moved));
    assert_eq!(id_loop.generation(), generation + 1);

    wait_for_requests(&mock, QueryKind::Listing, 2).await;
    let latest = mock.requests_of(QueryKind::Listing).pop().unwrap();
    assert_eq!(latest.cursor_at, Some(ContinuationToken::from("abc")));
    assert!(latest.index.is_zero());

    eventually(|| mock.in_flight(QueryKind::Listing) == 1).await;
    assert_eq!(mock.peak_in_flight(QueryKind::Listing), 1);
}

#[tokio::test]
async fn stop_cancels_in_flight_listing() {
    let (mock, mut id_loop, _rx) = make_id_loop();
    id_loop.start(Scope::all(), Cursor::first_page(10), None);
    wait_for_requests(&mock, QueryKind::Listing, 1).await;

    id_loop.stop();
    assert!(!id_loop.is_running());
    assert_eq!(id_loop.status().state, LoopState::Stopped);
    eventually(|| mock.in_flight(QueryKind::Listing) == 0).await;
}

// ── Details loop ────────────────────────────────────────────────

#[tokio::test]
async fn empty_id_set_issues_no_details_query() {
    let (mock, mut detail_loop, _rx) = make_detail_loop();
    detail_loop.restart(&Scope::all(), refs(&[]));

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(mock.request_count(QueryKind::Details), 0);
    assert!(!detail_loop.is_running());
    assert_eq!(detail_loop.status().state, LoopState::Idle);
}

#[tokio::test]
async fn details_loop_queries_exact_ids_immediately() {
    let (mock, mut detail_loop, mut rx) = make_detail_loop();
    detail_loop.restart(&Scope::all(), refs(&["a", "b"]));

    wait_for_requests(&mock, QueryKind::Details, 1).await;
    let issued = mock.requests_of(QueryKind::Details);
    let first = &issued[0];
    assert!(first.index.is_zero());
    assert_eq!(first.jobs, refs(&["a", "b"]).as_slice());

    mock.push_details(detailed(&["a", "b"], "running"), 4);
    match next_event(&mut rx).await {
        LoopEvent::Details {
            generation,
            index,
            snapshot,
        } => {
            assert_eq!(generation, 1);
            assert_eq!(index, ConsistencyIndex::new(4));
            assert_eq!(snapshot.len(), 2);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    wait_for_requests(&mock, QueryKind::Details, 2).await;
    assert_eq!(mock.requests_of(QueryKind::Details)[1].index, ConsistencyIndex::new(4));
}

#[tokio::test]
async fn identical_snapshot_emits_no_event() {
    let (mock, mut detail_loop, mut rx) = make_detail_loop();
    detail_loop.restart(&Scope::all(), refs(&["a"]));

    mock.push_details(detailed(&["a"], "running"), 4);
    next_event(&mut rx).await;
    mock.push_details(detailed(&["a"], "running"), 6);

    wait_for_requests(&mock, QueryKind::Details, 3).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(detail_loop.status().cycles, 2);
}

#[tokio::test]
async fn restart_resets_index_and_replaces_query() {
    let (mock, mut detail_loop, mut rx) = make_detail_loop();
    let scope = Scope::all();
    detail_loop.restart(&scope, refs(&["a"]));
    mock.push_details(detailed(&["a"], "running"), 8);
    next_event(&mut rx).await;
    wait_for_requests(&mock, QueryKind::Details, 2).await;

    detail_loop.restart(&scope, refs(&["b", "c"]));
    assert_eq!(detail_loop.generation(), 2);
    assert_eq!(detail_loop.ids(), &refs(&["b", "c"]));

    wait_for_requests(&mock, QueryKind::Details, 3).await;
    let latest = mock.requests_of(QueryKind::Details).pop().unwrap();
    assert!(latest.index.is_zero());
    assert_eq!(latest.jobs, refs(&["b", "c"]).as_slice());

    eventually(|| mock.in_flight(QueryKind::Details) == 1).await;
    assert_eq!(mock.peak_in_flight(QueryKind::Details), 1);
}

#[tokio::test]
async fn forbidden_stops_details_loop() {
    let (mock, mut detail_loop, mut rx) = make_detail_loop();
    detail_loop.restart(&Scope::all(), refs(&["a"]));
    mock.push_forbidden(QueryKind::Details);

    assert!(matches!(
        next_event(&mut rx).await,
        LoopEvent::Forbidden {
            kind: QueryKind::Details,
            ..
        }
    ));
    eventually(|| !detail_loop.is_running()).await;
    assert_eq!(detail_loop.status().state, LoopState::Stopped);
}
