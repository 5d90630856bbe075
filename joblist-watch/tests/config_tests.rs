use joblist_watch::{
    Throttle, WatchConfig, WatchError, DEFAULT_PAGE_SIZE, JOB_DETAILS_THROTTLE_MS,
    JOB_LIST_THROTTLE_MS,
};
use std::time::{Duration, Instant};

// ── WatchConfig ─────────────────────────────────────────────────

#[test]
fn default_config_uses_production_throttles() {
    let config = WatchConfig::default();
    assert_eq!(config.id_throttle_ms, JOB_LIST_THROTTLE_MS);
    assert_eq!(config.detail_throttle_ms, JOB_DETAILS_THROTTLE_MS);
    assert_eq!(config.default_page_size, DEFAULT_PAGE_SIZE);
    assert_eq!(config.id_throttle().delay(), Duration::from_secs(5));
    assert_eq!(config.detail_throttle().delay(), Duration::from_secs(1));
}

#[test]
fn headless_config_has_no_throttle() {
    let config = WatchConfig::headless();
    assert!(config.id_throttle().is_zero());
    assert!(config.detail_throttle().is_zero());
    assert_eq!(config.default_page_size, DEFAULT_PAGE_SIZE);
}

#[test]
fn config_deserializes_partial_json() {
    let config: WatchConfig = serde_json::from_str(r#"{"default_page_size":25}"#).unwrap();
    assert_eq!(config.default_page_size, 25);
    assert_eq!(config.id_throttle_ms, JOB_LIST_THROTTLE_MS);
}

// ── Throttle ────────────────────────────────────────────────────

#[tokio::test]
async fn zero_throttle_returns_promptly() {
    let throttle = Throttle::default();
    assert!(throttle.is_zero());

    let start = Instant::now();
    throttle.wait().await;
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn throttle_waits_out_delay() {
    let throttle = Throttle::new(Duration::from_millis(20));
    let start = Instant::now();
    throttle.wait().await;
    assert!(start.elapsed() >= Duration::from_millis(20));
}

// ── Errors ──────────────────────────────────────────────────────

#[test]
fn error_classification() {
    assert!(WatchError::TransportFailed("x".into()).is_transient());
    assert!(!WatchError::Forbidden("x".into()).is_transient());
    assert!(WatchError::NoNextPage.is_boundary());
    assert!(WatchError::NoPrevPage.is_boundary());
    assert!(!WatchError::NotEntered.is_boundary());
}

#[test]
fn error_display() {
    assert_eq!(WatchError::NoNextPage.to_string(), "no next page");
    assert_eq!(WatchError::InvalidPageSize(0).to_string(), "invalid page size: 0");
    assert_eq!(
        WatchError::Forbidden("ACL token not found".into()).to_string(),
        "forbidden: ACL token not found"
    );
}
