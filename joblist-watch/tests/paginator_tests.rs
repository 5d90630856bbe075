mod common;

use common::jobs;
use joblist_types::{ContinuationToken, Direction, Scope};
use joblist_watch::{
    BlockingQueryClient, CursorPaginator, MockTransport, QueryKind, QueryResult, WatchError,
};
use std::sync::Arc;

fn token(s: &str) -> ContinuationToken {
    ContinuationToken::from(s)
}

fn reverse_result(ids: &[&str], next_token: Option<&str>) -> QueryResult {
    QueryResult::new(jobs(ids), 0, next_token.map(token))
}

// ── Forward ─────────────────────────────────────────────────────

#[test]
fn starts_on_first_page_without_neighbours() {
    let paginator = CursorPaginator::new(10);
    assert!(paginator.cursor().is_first_page());
    assert_eq!(paginator.page_size(), 10);
    assert!(!paginator.has_next());
    assert!(!paginator.has_prev());
}

#[test]
fn next_page_moves_to_observed_token() {
    let mut paginator = CursorPaginator::new(10);
    paginator.observe_next_token(Some(token("abc")));
    assert!(paginator.has_next());

    let cursor = paginator.next_page().unwrap();
    assert_eq!(cursor.cursor_at, Some(token("abc")));
    assert_eq!(cursor.page_size, 10);
    assert_eq!(cursor.direction, Direction::Forward);

    // The token is consumed until the new page's listing reports one.
    assert!(!paginator.has_next());
    assert!(paginator.has_prev());
}

#[test]
fn next_page_without_token_is_boundary() {
    let mut paginator = CursorPaginator::new(10);
    let err = paginator.next_page().unwrap_err();
    assert!(matches!(err, WatchError::NoNextPage));
    assert!(err.is_boundary());
    assert!(paginator.cursor().is_first_page());
}

#[test]
fn last_page_clears_next_token() {
    let mut paginator = CursorPaginator::new(10);
    paginator.observe_next_token(Some(token("abc")));
    paginator.observe_next_token(None);
    assert!(!paginator.has_next());
}

// ── Backward ────────────────────────────────────────────────────

#[test]
fn prev_page_on_first_page_is_boundary() {
    let paginator = CursorPaginator::new(10);
    let err = paginator.prev_page_request(&Scope::all()).unwrap_err();
    assert!(matches!(err, WatchError::NoPrevPage));
}

#[test]
fn prev_page_request_is_reverse_and_one_longer() {
    let paginator = CursorPaginator::at(Some(token("default.k")), 3);
    let request = paginator.prev_page_request(&Scope::namespace("default")).unwrap();

    assert_eq!(request.kind, QueryKind::PreviousPage);
    assert!(request.reverse);
    assert_eq!(request.page_size, Some(4));
    assert_eq!(request.cursor_at, Some(token("default.k")));
    assert!(request.index.is_zero());
    assert_eq!(request.scope.namespace, "default");
}

#[test]
fn single_item_reverse_result_returns_to_first_page() {
    let mut paginator = CursorPaginator::at(Some(token("default.b")), 3);
    let cursor = paginator.resolve_prev_page(&reverse_result(&["b"], Some("default.a")));
    assert_eq!(cursor.cursor_at, None);
    assert_eq!(cursor.direction, Direction::Backward);
}

#[test]
fn empty_reverse_result_returns_to_first_page() {
    let mut paginator = CursorPaginator::at(Some(token("default.b")), 3);
    let cursor = paginator.resolve_prev_page(&reverse_result(&[], None));
    assert!(cursor.is_first_page());
}

#[test]
fn reverse_result_uses_last_item_as_cursor() {
    let mut paginator = CursorPaginator::at(Some(token("default.k")), 3);
    let cursor =
        paginator.resolve_prev_page(&reverse_result(&["k", "j", "i", "h"], Some("default.g")));
    assert_eq!(cursor.cursor_at, Some(token("default.h")));
}

#[test]
fn reverse_result_without_token_reaches_first_page() {
    let mut paginator = CursorPaginator::at(Some(token("default.d")), 3);
    let cursor = paginator.resolve_prev_page(&reverse_result(&["d", "c", "b", "a"], None));
    assert_eq!(cursor.cursor_at, None);
}

#[test]
fn resolving_previous_page_forgets_next_token() {
    let mut paginator = CursorPaginator::at(Some(token("default.k")), 3);
    paginator.observe_next_token(Some(token("default.n")));
    paginator.resolve_prev_page(&reverse_result(&["k", "j", "i", "h"], Some("default.g")));
    assert!(!paginator.has_next());
}

#[tokio::test]
async fn prev_page_after_next_page_returns_to_same_cursor() {
    let mock = Arc::new(MockTransport::new());
    let client = BlockingQueryClient::new(mock.clone());
    let scope = Scope::namespace("default");

    // Page 2 starts at "d"; page 3 starts at "g".
    let mut paginator = CursorPaginator::at(Some(token("default.d")), 3);
    let before = paginator.cursor().cursor_at.clone();
    paginator.observe_next_token(Some(token("default.g")));
    paginator.next_page().unwrap();

    mock.push_previous(jobs(&["g", "f", "e", "d"]), Some("default.c"));
    let cursor = paginator.prev_page(&client, &scope).await.unwrap();

    assert_eq!(cursor.cursor_at, before);
    assert_eq!(mock.request_count(QueryKind::PreviousPage), 1);
}

#[tokio::test]
async fn prev_page_propagates_lookup_failure() {
    let mock = Arc::new(MockTransport::new());
    let client = BlockingQueryClient::new(mock.clone());
    mock.push_failure(QueryKind::PreviousPage, "timeout");

    let mut paginator = CursorPaginator::at(Some(token("default.d")), 3);
    let err = paginator.prev_page(&client, &Scope::all()).await.unwrap_err();
    assert!(matches!(err, WatchError::TransportFailed(_)));
    assert_eq!(paginator.cursor().cursor_at, Some(token("default.d")));
}

// ── Page size & reset ───────────────────────────────────────────

#[test]
fn zero_page_size_is_rejected() {
    let mut paginator = CursorPaginator::new(10);
    let err = paginator.set_page_size(0).unwrap_err();
    assert!(matches!(err, WatchError::InvalidPageSize(0)));
    assert_eq!(paginator.page_size(), 10);
}

#[test]
fn page_size_change_keeps_position() {
    let mut paginator = CursorPaginator::at(Some(token("default.d")), 3);
    paginator.set_page_size(25).unwrap();
    assert_eq!(paginator.page_size(), 25);
    assert_eq!(paginator.cursor().cursor_at, Some(token("default.d")));
}

#[test]
fn reset_moves_to_explicit_position() {
    let mut paginator = CursorPaginator::new(10);
    paginator.observe_next_token(Some(token("abc")));
    paginator.reset(Some(token("default.x")));
    assert_eq!(paginator.cursor().cursor_at, Some(token("default.x")));
    assert!(!paginator.has_next());
}
