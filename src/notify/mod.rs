//! Run notifications.
//!
//! Exactly one of three paths fires per run, chosen by the run status. Each
//! path has its own on/off switch, and an empty recipient list turns
//! notification off entirely. Delivery goes through the notification retry
//! profile; a delivery that still fails is reported back as
//! [`NotificationDispatch::Failed`] and never turns into an error of the
//! run itself.

pub mod log_notifier;
pub mod message;
pub mod outbox;

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;
use crate::errors::ClassifiedError;
use crate::retry::{execute_with_retry, with_timeout, RetryConfig};
use crate::utils::summary::{RunStatus, RunSummary};

pub use log_notifier::LogNotifier;
pub use message::{render_message, NotificationMessage};
pub use outbox::OutboxNotifier;

/// Delivery settings handed to every notifier call.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyOptions {
    pub recipients: Vec<String>,
    pub subject_prefix: String,
}

impl NotifyOptions {
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            recipients: config.recipients.clone(),
            subject_prefix: config.subject_prefix.clone(),
        }
    }
}

/// Sends run reports somewhere a human will see them.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Check the transport before the run starts.
    async fn verify_connection(&self) -> Result<()>;

    async fn notify_success(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()>;

    async fn notify_partial(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()>;

    async fn notify_failure(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPath {
    Success,
    Partial,
    Failure,
}

impl NotificationPath {
    pub fn for_status(status: RunStatus) -> Self {
        match status {
            RunStatus::Success => NotificationPath::Success,
            RunStatus::Partial => NotificationPath::Partial,
            RunStatus::Failure => NotificationPath::Failure,
        }
    }

    pub fn is_enabled(&self, config: &NotificationConfig) -> bool {
        match self {
            NotificationPath::Success => config.on_success,
            NotificationPath::Partial => config.on_partial,
            NotificationPath::Failure => config.on_failure,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPath::Success => "success",
            NotificationPath::Partial => "partial",
            NotificationPath::Failure => "failure",
        }
    }

    async fn send(
        self,
        notifier: &dyn Notifier,
        summary: &RunSummary,
        options: &NotifyOptions,
    ) -> Result<()> {
        match self {
            NotificationPath::Success => notifier.notify_success(summary, options).await,
            NotificationPath::Partial => notifier.notify_partial(summary, options).await,
            NotificationPath::Failure => notifier.notify_failure(summary, options).await,
        }
    }
}

impl fmt::Display for NotificationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the one notification of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationDispatch {
    Sent { path: NotificationPath, attempts: u32 },
    /// The switch for this path is off.
    Disabled { path: NotificationPath },
    NoRecipients { path: NotificationPath },
    Failed {
        path: NotificationPath,
        attempts: u32,
        error: ClassifiedError,
    },
}

impl NotificationDispatch {
    pub fn path(&self) -> NotificationPath {
        match self {
            NotificationDispatch::Sent { path, .. }
            | NotificationDispatch::Disabled { path }
            | NotificationDispatch::NoRecipients { path }
            | NotificationDispatch::Failed { path, .. } => *path,
        }
    }

    pub fn was_sent(&self) -> bool {
        matches!(self, NotificationDispatch::Sent { .. })
    }
}

/// Route `summary` to the notification path its status selects.
///
/// A disabled path or an empty recipient list sends nothing. Delivery
/// failures are classified and returned, never raised.
///
/// # Arguments
///
/// * `summary` - The finished run
/// * `config` - Per-path switches and recipients
/// * `notifier` - Transport to send through
/// * `retry` - Retry profile for the transport
/// * `timeout` - Limit for each attempt
///
/// # Returns
///
/// What happened to the notification
pub async fn dispatch_notification(
    summary: &RunSummary,
    config: &NotificationConfig,
    notifier: &dyn Notifier,
    retry: &RetryConfig,
    timeout: Duration,
) -> NotificationDispatch {
    let path = NotificationPath::for_status(summary.status);

    if !path.is_enabled(config) {
        info!("Notifications for {} runs are disabled", path);
        return NotificationDispatch::Disabled { path };
    }
    if config.recipients.is_empty() {
        info!("No notification recipients configured, skipping {} notification", path);
        return NotificationDispatch::NoRecipients { path };
    }

    let options = NotifyOptions::from_config(config);
    let label = format!("{} notification", path);

    let outcome = execute_with_retry(
        || with_timeout(path.send(notifier, summary, &options), timeout, &label),
        retry,
        &label,
    )
    .await;

    let attempts = outcome.attempts;
    match outcome.result {
        Ok(()) => {
            info!(
                "Sent {} notification to {} recipient(s)",
                path,
                options.recipients.len()
            );
            NotificationDispatch::Sent { path, attempts }
        }
        Err(err) => {
            let error = ClassifiedError::from_error(&err, &label);
            warn!("Notification not delivered after {} attempt(s): {}", attempts, error);
            NotificationDispatch::Failed { path, attempts, error }
        }
    }
}
