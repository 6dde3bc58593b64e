//! Retry executor behavior with the per-dependency profiles.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use rust_db_backup::errors::{classify, ErrorHistory, ErrorKind, ServiceError};
use rust_db_backup::retry::{
    execute_with_retry, is_timeout, with_timeout, RetryConfig, RetryFailed, RetryProfiles,
};

async fn flaky(calls: &AtomicU32, failures: u32, error: fn() -> anyhow::Error) -> Result<&'static str> {
    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
    if n <= failures {
        Err(error())
    } else {
        Ok("done")
    }
}

#[tokio::test]
async fn test_object_store_profile_rides_out_throttling() {
    let profiles = RetryProfiles::immediate();
    let calls = AtomicU32::new(0);
    let calls_ref = &calls;

    let outcome = execute_with_retry(
        move || flaky(calls_ref, 3, || anyhow::Error::new(ServiceError::new("throttled").with_status(503))),
        &profiles.object_store,
        "upload shop.sql.gz",
    )
    .await;

    assert!(outcome.success());
    assert_eq!(outcome.attempts, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_database_profile_stops_on_permanent_error() {
    let profiles = RetryProfiles::immediate();
    let calls = AtomicU32::new(0);
    let calls_ref = &calls;

    let outcome = execute_with_retry(
        move || flaky(calls_ref, 10, || anyhow!("relation \"orders\" does not exist")),
        &profiles.database,
        "sql export",
    )
    .await;

    assert!(!outcome.success());
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.last_error().unwrap().to_string().contains("does not exist"));
}

#[tokio::test]
async fn test_budget_exhaustion_reports_attempts() {
    let config = RetryConfig::immediate(3);
    let calls = AtomicU32::new(0);
    let calls_ref = &calls;

    let outcome = execute_with_retry(
        move || flaky(calls_ref, 10, || anyhow!("connection reset")),
        &config,
        "discovery",
    )
    .await;
    assert_eq!(outcome.attempts, 3);

    let err = outcome.into_result().unwrap_err();
    let failed = err.downcast_ref::<RetryFailed>().unwrap();
    assert_eq!(failed.attempts, 3);
    assert_eq!(err.to_string(), "discovery failed after 3 attempt(s)");
    assert!(format!("{:#}", err).contains("connection reset"));
}

#[tokio::test]
async fn test_timed_out_attempts_are_retried_and_classified() {
    let config = RetryConfig::database().with_delays(Duration::ZERO, Duration::ZERO);
    let calls = Arc::new(AtomicU32::new(0));

    let outcome = execute_with_retry(
        || {
            let calls = Arc::clone(&calls);
            with_timeout(
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                },
                Duration::from_millis(10),
                "discovery",
            )
        },
        &config,
        "discovery",
    )
    .await;

    assert_eq!(outcome.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let err = outcome.result.unwrap_err();
    assert!(is_timeout(&err));

    let mut history = ErrorHistory::default();
    let classified = classify(&err, "discovery", &mut history);
    assert_eq!(classified.kind, ErrorKind::Timeout);
    assert!(classified.retryable);
    assert_eq!(history.len(), 1);
}

#[test]
fn test_configured_backoff_is_capped() {
    let config = RetryConfig::object_store();
    assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
    assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
    assert_eq!(config.delay_for_attempt(5), Duration::from_secs(16));
    assert_eq!(config.delay_for_attempt(6), Duration::from_secs(20));
    assert_eq!(config.delay_for_attempt(30), Duration::from_secs(20));
}
