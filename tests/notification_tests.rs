//! Notification routing through the public dispatch entry point.

use std::fs;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;

use rust_db_backup::config::NotificationConfig;
use rust_db_backup::errors::ErrorKind;
use rust_db_backup::models::{ArtifactMetadata, ExportFormat};
use rust_db_backup::notify::{
    dispatch_notification, render_message, NotificationDispatch, NotificationPath, Notifier,
    NotifyOptions, OutboxNotifier,
};
use rust_db_backup::retry::RetryConfig;
use rust_db_backup::utils::summary::{ArtifactOutcome, RunHeader, RunStatus, RunSummary};

mock! {
    pub Transport {}

    #[async_trait]
    impl Notifier for Transport {
        async fn verify_connection(&self) -> Result<()>;
        async fn notify_success(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()>;
        async fn notify_partial(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()>;
        async fn notify_failure(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()>;
    }
}

const TIMEOUT: Duration = Duration::from_secs(5);

fn retry() -> RetryConfig {
    RetryConfig::notification().with_delays(Duration::ZERO, Duration::ZERO)
}

fn metadata(name: &str, format: ExportFormat) -> ArtifactMetadata {
    ArtifactMetadata {
        name: name.to_string(),
        format,
        original_size: 4096,
        compressed_size: Some(1024),
        compression_ratio: 4.0,
        checksum: "ab".repeat(32),
        compressed: true,
        created_at: Utc::now(),
    }
}

/// A run with one uploaded and `failed` failed artifacts.
fn summary_with(failed: usize) -> RunSummary {
    let header = RunHeader::new("shop");
    let mut outcomes = vec![ArtifactOutcome::uploaded(
        &metadata("shop.sql.gz", ExportFormat::Sql),
        "backups/shop.sql.gz".to_string(),
        "s3://db-backups/backups/shop.sql.gz".to_string(),
        1,
    )];
    let mut errors = Vec::new();
    for i in 0..failed {
        let message = format!("upload shop-{}.json.gz failed after 4 attempt(s)", i);
        outcomes.push(ArtifactOutcome::failed(
            &metadata(&format!("shop-{}.json.gz", i), ExportFormat::Json),
            message.clone(),
            4,
        ));
        errors.push(message);
    }
    RunSummary::aggregate(&header, outcomes, errors, false, Utc::now())
}

fn recipients() -> NotificationConfig {
    NotificationConfig {
        recipients: vec!["ops@example.com".to_string(), "dba@example.com".to_string()],
        ..NotificationConfig::default()
    }
}

#[tokio::test]
async fn test_partial_run_uses_partial_path() {
    let summary = summary_with(1);
    assert_eq!(summary.status, RunStatus::Partial);

    let mut transport = MockTransport::new();
    transport
        .expect_notify_partial()
        .withf(|s: &RunSummary, o: &NotifyOptions| s.failed == 1 && o.recipients.len() == 2)
        .times(1)
        .returning(|_, _| Ok(()));
    transport.expect_notify_success().never();
    transport.expect_notify_failure().never();

    let dispatch = dispatch_notification(&summary, &recipients(), &transport, &retry(), TIMEOUT).await;
    assert_eq!(dispatch, NotificationDispatch::Sent { path: NotificationPath::Partial, attempts: 1 });
    assert!(dispatch.was_sent());
}

#[tokio::test]
async fn test_transient_failure_is_retried_then_sent() {
    let summary = summary_with(0);
    let mut seq = mockall::Sequence::new();

    let mut transport = MockTransport::new();
    transport
        .expect_notify_success()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(anyhow!("connection reset by peer")));
    transport
        .expect_notify_success()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let dispatch = dispatch_notification(&summary, &recipients(), &transport, &retry(), TIMEOUT).await;
    assert_eq!(dispatch, NotificationDispatch::Sent { path: NotificationPath::Success, attempts: 2 });
}

#[tokio::test]
async fn test_rejected_login_fails_without_retry() {
    let summary = summary_with(0);

    let mut transport = MockTransport::new();
    transport
        .expect_notify_success()
        .times(1)
        .returning(|_, _| Err(anyhow!("535 5.7.8 Username and Password not accepted")));

    let dispatch = dispatch_notification(&summary, &recipients(), &transport, &retry(), TIMEOUT).await;
    match dispatch {
        NotificationDispatch::Failed { path, attempts, error } => {
            assert_eq!(path, NotificationPath::Success);
            assert_eq!(attempts, 1);
            assert_eq!(error.operation, "success notification");
        }
        other => panic!("unexpected dispatch: {:?}", other),
    }
}

#[tokio::test]
async fn test_failure_path_disabled() {
    let header = RunHeader::new("shop");
    let summary = RunSummary::aborted(&header, vec!["database check failed".to_string()], Utc::now());
    let config = NotificationConfig {
        on_failure: false,
        ..recipients()
    };

    let transport = MockTransport::new();
    let dispatch = dispatch_notification(&summary, &config, &transport, &retry(), TIMEOUT).await;
    assert_eq!(dispatch, NotificationDispatch::Disabled { path: NotificationPath::Failure });
}

#[tokio::test]
async fn test_outbox_spools_one_message() {
    let dir = tempfile::tempdir().unwrap();
    let outbox = OutboxNotifier::new(dir.path().join("outbox"));
    outbox.verify_connection().await.unwrap();

    let summary = summary_with(1);
    let dispatch = dispatch_notification(&summary, &recipients(), &outbox, &retry(), TIMEOUT).await;
    assert!(dispatch.was_sent());

    let files: Vec<_> = fs::read_dir(outbox.dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.ends_with("_partial.msg"));
    assert!(name.contains(&summary.run_id.to_string()));

    let contents = fs::read_to_string(&files[0]).unwrap();
    let expected = render_message(NotificationPath::Partial, &summary, "[db-backup]");
    assert!(contents.starts_with("To: ops@example.com, dba@example.com\n"));
    assert!(contents.contains(&format!("Subject: {}", expected.subject)));
    assert!(contents.contains("shop-0.json.gz"));
}

#[tokio::test]
async fn test_unwritable_outbox_is_classified() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"x").unwrap();

    let outbox = OutboxNotifier::new(blocker.join("outbox"));
    let summary = summary_with(0);
    let dispatch = dispatch_notification(&summary, &recipients(), &outbox, &retry(), TIMEOUT).await;

    match dispatch {
        NotificationDispatch::Failed { attempts, error, .. } => {
            assert_eq!(attempts, 1);
            assert_eq!(error.kind, ErrorKind::Unknown);
            assert!(error.message.contains("Failed to create outbox directory"));
        }
        other => panic!("unexpected dispatch: {:?}", other),
    }
}
