//! The backup pipeline.
//!
//! [`BackupOrchestrator`] runs one backup end to end:
//!
//! ```text
//! Idle -> Initializing -> Exporting -> Uploading -> Aggregating
//!      -> Notifying -> CleaningUp -> Done
//!
//! Initializing | Exporting --(fatal)--> Aborted
//! ```
//!
//! Every external call goes through the retry profile of its dependency
//! class, with the stage timeout applied to each attempt. Failures are
//! classified into the run's [`ErrorHistory`].
//!
//! Exports are all-or-nothing: one format failing aborts the run. Uploads
//! are not: a failed upload is recorded against its artifact and the next
//! one is attempted. An aborted run still sends its failure notification
//! and removes whatever it had persisted.

pub mod state;

use std::borrow::Cow;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, warn};

use crate::cloud::{RemoteObject, RemoteStore, UploadOptions};
use crate::config::BackupConfig;
use crate::errors::{classify, record, ErrorHistory, ServiceError};
use crate::export::Exporter;
use crate::localfs::LocalFs;
use crate::models::{DatabaseMetadata, ExportFormat};
use crate::notify::{dispatch_notification, NotificationDispatch, Notifier};
use crate::packaging::{ArtifactPackager, PackagedArtifact};
use crate::retry::{execute_with_retry, with_timeout, RetryConfig, RetryFailed, RetryOutcome, RetryProfiles};
use crate::utils::summary::{ArtifactOutcome, RunHeader, RunStatus, RunSummary};

pub use state::{PipelineState, StateTracker};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub notification: NotificationDispatch,
    pub final_state: PipelineState,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        self.summary.status
    }

    pub fn exit_code(&self) -> i32 {
        self.summary.status.exit_code()
    }
}

/// A packaged artifact and where it was written locally.
#[derive(Debug)]
struct PersistedArtifact {
    artifact: PackagedArtifact,
    path: PathBuf,
}

/// Run `operation` under `retry`, bounding each attempt by `timeout`.
async fn run_step<T, F, Fut>(
    mut operation: F,
    retry: &RetryConfig,
    timeout: Duration,
    label: &str,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    execute_with_retry(|| with_timeout(operation(), timeout, label), retry, label).await
}

pub struct BackupOrchestrator {
    config: BackupConfig,
    packager: ArtifactPackager,
    retry: RetryProfiles,
    upload_options: UploadOptions,
    exporter: Arc<dyn Exporter>,
    store: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    fs: Arc<dyn LocalFs>,
    history: ErrorHistory,
    state: StateTracker,
}

impl BackupOrchestrator {
    pub fn new(
        config: BackupConfig,
        exporter: Arc<dyn Exporter>,
        store: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
        fs: Arc<dyn LocalFs>,
    ) -> Self {
        let packager = ArtifactPackager::new(config.compression.clone(), config.naming.clone());
        let retry = config.retry_profiles();
        let upload_options =
            UploadOptions::new(&config.storage.prefix).with_encryption(config.storage.encrypt);

        Self {
            config,
            packager,
            retry,
            upload_options,
            exporter,
            store,
            notifier,
            fs,
            history: ErrorHistory::default(),
            state: StateTracker::new(),
        }
    }

    /// Replace the retry profiles derived from the configuration.
    pub fn with_retry_profiles(mut self, retry: RetryProfiles) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Classified failures of this orchestrator's runs, oldest first.
    pub fn history(&self) -> &ErrorHistory {
        &self.history
    }

    pub fn state(&self) -> PipelineState {
        self.state.current()
    }

    pub fn visited_states(&self) -> &[PipelineState] {
        self.state.visited()
    }

    /// Classify the last error of a failed step and render it for the summary.
    fn record_failure(&mut self, err: &anyhow::Error, label: &str, attempts: u32) -> String {
        let classified = classify(err, label, &mut self.history);
        let failed = RetryFailed {
            label: label.to_string(),
            attempts,
        };
        format!("{}: {}", failed, classified.with_remediation())
    }

    /// Execute the whole pipeline once.
    ///
    /// Only an internal state machine violation is returned as `Err`; every
    /// backup failure ends up in the report's summary instead.
    pub async fn run(&mut self) -> Result<RunReport> {
        self.state = StateTracker::new();
        let database = self.config.database.name.clone().unwrap_or_else(|| "database".to_string());
        let mut header = RunHeader::new(&database);
        let mut errors = Vec::new();

        info!("Starting backup run {} on {}", header.run_id, header.host);

        self.state.transition(PipelineState::Initializing)?;
        if let Err(message) = self.initialize().await {
            errors.push(message);
            return self.abort(&header, errors, Vec::new()).await;
        }

        self.state.transition(PipelineState::Exporting)?;
        let metadata = match self.discover().await {
            Ok(metadata) => metadata,
            Err(message) => {
                errors.push(message);
                return self.abort(&header, errors, Vec::new()).await;
            }
        };
        header.database = metadata.database_name.clone();
        for skipped in &metadata.skipped_tables {
            record(skipped.classified.clone(), &mut self.history);
            errors.push(format!("skipped table {}: {}", skipped.table, skipped.error));
        }

        let mut persisted = Vec::with_capacity(self.config.formats.len());
        let formats = self.config.formats.clone();
        for format in formats {
            match self.export_one(format, &metadata, &header, &mut errors).await {
                Ok(artifact) => persisted.push(artifact),
                Err(message) => {
                    errors.push(message);
                    return self.abort(&header, errors, persisted).await;
                }
            }
        }

        self.state.transition(PipelineState::Uploading)?;
        let mut outcomes = Vec::with_capacity(persisted.len());
        for item in &persisted {
            let outcome = self.upload_one(item).await;
            if let Some(message) = &outcome.error {
                errors.push(message.clone());
            }
            outcomes.push(outcome);
        }

        self.state.transition(PipelineState::Aggregating)?;
        let summary = RunSummary::aggregate(&header, outcomes, errors, false, Utc::now());
        info!(
            "Backup {}: {}/{} artifacts uploaded, {} raw bytes, ratio {:.2}",
            summary.status,
            summary.succeeded,
            summary.total_artifacts,
            summary.total_raw_bytes,
            summary.compression_ratio
        );

        self.state.transition(PipelineState::Notifying)?;
        let notification = self.notify(&summary).await;

        self.state.transition(PipelineState::CleaningUp)?;
        self.cleanup(&persisted).await;

        self.state.transition(PipelineState::Done)?;
        Ok(RunReport {
            summary,
            notification,
            final_state: PipelineState::Done,
        })
    }

    /// Check the database, the object store and the mail transport, in
    /// that order. The first unreachable one stops the run.
    async fn initialize(&mut self) -> std::result::Result<(), String> {
        let timeout = self.config.timeouts.connect();

        let exporter = Arc::clone(&self.exporter);
        let outcome = run_step(
            || exporter.verify_connection(),
            &self.retry.database,
            timeout,
            "database check",
        )
        .await;
        self.check_step(outcome, "database check")?;

        let store = Arc::clone(&self.store);
        let outcome = run_step(
            || store.verify_connection(),
            &self.retry.object_store,
            timeout,
            "object store check",
        )
        .await;
        self.check_step(outcome, "object store check")?;

        let notifier = Arc::clone(&self.notifier);
        let outcome = run_step(
            || notifier.verify_connection(),
            &self.retry.notification,
            timeout,
            "mail transport check",
        )
        .await;
        self.check_step(outcome, "mail transport check")?;

        info!("All dependencies reachable");
        Ok(())
    }

    fn check_step<T>(&mut self, outcome: RetryOutcome<T>, label: &str) -> std::result::Result<T, String> {
        let attempts = outcome.attempts;
        match outcome.result {
            Ok(value) => Ok(value),
            Err(err) => Err(self.record_failure(&err, label, attempts)),
        }
    }

    async fn discover(&mut self) -> std::result::Result<DatabaseMetadata, String> {
        let exporter = Arc::clone(&self.exporter);
        let outcome = run_step(
            || exporter.discover(),
            &self.retry.database,
            self.config.timeouts.export(),
            "discovery",
        )
        .await;
        self.check_step(outcome, "discovery")
    }

    /// Export, package and persist one format.
    async fn export_one(
        &mut self,
        format: ExportFormat,
        metadata: &DatabaseMetadata,
        header: &RunHeader,
        errors: &mut Vec<String>,
    ) -> std::result::Result<PersistedArtifact, String> {
        let label = format!("{} export", format);
        let exporter = Arc::clone(&self.exporter);
        let outcome = run_step(
            || exporter.export_format(format, metadata),
            &self.retry.database,
            self.config.timeouts.export(),
            &label,
        )
        .await;
        let output = self.check_step(outcome, &label)?;

        for skipped in output.skipped_tables {
            record(skipped.classified, &mut self.history);
            errors.push(format!("{}: skipped table {}: {}", label, skipped.table, skipped.error));
        }

        let artifact = match self.packager.package(output.bytes, format, header.started_at).await {
            Ok(artifact) => artifact,
            Err(err) => return Err(self.record_failure(&err, &format!("{} packaging", format), 1)),
        };

        let path = self.config.output_dir.join(&artifact.metadata.name);
        if let Err(err) = self.fs.write(&path, &artifact.bytes).await {
            // a short write may leave a partial file that cleanup never sees
            if let Err(delete_err) = self.fs.delete(&path).await {
                debug!("Nothing to remove at {}: {:#}", path.display(), delete_err);
            }
            return Err(self.record_failure(&err, &format!("{} persist", format), 1));
        }

        info!(
            "Exported {} ({} bytes, {} packaged) to {}",
            format,
            artifact.metadata.original_size,
            artifact.metadata.packaged_size(),
            path.display()
        );
        Ok(PersistedArtifact { artifact, path })
    }

    /// Bytes to upload for `item`: the persisted file when it still
    /// validates, otherwise the in-memory copy, which is written back.
    async fn upload_payload<'a>(&self, item: &'a PersistedArtifact) -> Cow<'a, [u8]> {
        let metadata = &item.artifact.metadata;

        let problems = match self.fs.read(&item.path).await {
            Ok(bytes) => {
                let report = ArtifactPackager::validate(&bytes, metadata).await;
                if report.valid {
                    return Cow::Owned(bytes);
                }
                report.errors.join("; ")
            }
            Err(err) => format!("{:#}", err),
        };

        warn!(
            "Persisted copy of {} is unusable ({}), rewriting it from memory",
            metadata.name, problems
        );
        if let Err(err) = self.fs.write(&item.path, &item.artifact.bytes).await {
            warn!("Could not rewrite {}: {:#}", item.path.display(), err);
        }
        Cow::Borrowed(&item.artifact.bytes)
    }

    async fn upload_one(&mut self, item: &PersistedArtifact) -> ArtifactOutcome {
        let metadata = &item.artifact.metadata;
        let payload = self.upload_payload(item).await;
        let label = format!("upload {}", metadata.name);

        let store: &dyn RemoteStore = self.store.as_ref();
        let options = &self.upload_options;
        let bytes: &[u8] = &payload;
        let expected = metadata.packaged_size();

        let outcome = run_step(
            move || async move {
                let remote: RemoteObject = store.upload(bytes, metadata, options).await?;
                if remote.size != expected {
                    return Err(anyhow::Error::new(ServiceError::new(format!(
                        "stored size mismatch: expected {} bytes, store reports {}",
                        expected, remote.size
                    ))));
                }
                Ok(remote)
            },
            &self.retry.object_store,
            self.config.timeouts.upload(),
            &label,
        )
        .await;

        let attempts = outcome.attempts;
        match outcome.result {
            Ok(remote) => {
                debug!("{} stored as {}", metadata.name, remote.remote_id);
                ArtifactOutcome::uploaded(metadata, remote.remote_id, remote.remote_url, attempts)
            }
            Err(err) => {
                let message = self.record_failure(&err, &label, attempts);
                error!("Upload of {} failed: {}", metadata.name, message);
                ArtifactOutcome::failed(metadata, message, attempts)
            }
        }
    }

    /// Send the one notification for `summary`. Never fails the run.
    async fn notify(&mut self, summary: &RunSummary) -> NotificationDispatch {
        let dispatch = dispatch_notification(
            summary,
            &self.config.notifications,
            self.notifier.as_ref(),
            &self.retry.notification,
            self.config.timeouts.notify(),
        )
        .await;

        if let NotificationDispatch::Failed { error, .. } = &dispatch {
            record(error.clone(), &mut self.history);
        }
        dispatch
    }

    /// Best-effort removal of local artifact files.
    async fn cleanup(&self, persisted: &[PersistedArtifact]) {
        for item in persisted {
            match self.fs.delete(&item.path).await {
                Ok(()) => debug!("Removed {}", item.path.display()),
                Err(err) => warn!("Could not remove {}: {:#}", item.path.display(), err),
            }
        }
    }

    async fn abort(
        &mut self,
        header: &RunHeader,
        errors: Vec<String>,
        persisted: Vec<PersistedArtifact>,
    ) -> Result<RunReport> {
        let stage = self.state.current();
        self.state.transition(PipelineState::Aborted)?;
        if let Some(last) = errors.last() {
            error!("Backup aborted during {}: {}", stage, last);
        }

        let summary = RunSummary::aborted(header, errors, Utc::now());
        let notification = self.notify(&summary).await;
        self.cleanup(&persisted).await;

        Ok(RunReport {
            summary,
            notification,
            final_state: PipelineState::Aborted,
        })
    }
}
