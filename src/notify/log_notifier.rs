use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};

use crate::notify::message::render_message;
use crate::notify::{NotificationPath, Notifier, NotifyOptions};
use crate::utils::summary::RunSummary;

/// Writes notifications to the application log.
///
/// Used when no outbox is configured, so every run still leaves a report
/// somewhere an operator can find it.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        LogNotifier
    }

    fn emit(&self, path: NotificationPath, summary: &RunSummary, options: &NotifyOptions) {
        let message = render_message(path, summary, &options.subject_prefix);
        let to = options.recipients.join(", ");
        match path {
            NotificationPath::Success => info!("To: {}\nSubject: {}\n\n{}", to, message.subject, message.body),
            NotificationPath::Partial => warn!("To: {}\nSubject: {}\n\n{}", to, message.subject, message.body),
            NotificationPath::Failure => error!("To: {}\nSubject: {}\n\n{}", to, message.subject, message.body),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn verify_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn notify_success(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()> {
        self.emit(NotificationPath::Success, summary, options);
        Ok(())
    }

    async fn notify_partial(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()> {
        self.emit(NotificationPath::Partial, summary, options);
        Ok(())
    }

    async fn notify_failure(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()> {
        self.emit(NotificationPath::Failure, summary, options);
        Ok(())
    }
}
