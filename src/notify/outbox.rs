use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use uuid::Uuid;

use crate::notify::message::render_message;
use crate::notify::{NotificationPath, Notifier, NotifyOptions};
use crate::utils::summary::RunSummary;

/// Spools each notification as a message file for an external mail relay
/// to pick up.
///
/// Files are named `<finished>_<run id>_<path>.msg` and contain `To:` and
/// `Subject:` headers followed by the plain-text body.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(path: NotificationPath, summary: &RunSummary) -> String {
        format!(
            "{}_{}_{}.msg",
            summary.finished_at.format("%Y%m%dT%H%M%SZ"),
            summary.run_id,
            path
        )
    }

    async fn spool(
        &self,
        path: NotificationPath,
        summary: &RunSummary,
        options: &NotifyOptions,
    ) -> Result<()> {
        let message = render_message(path, summary, &options.subject_prefix);
        let contents = format!(
            "To: {}\nSubject: {}\n\n{}",
            options.recipients.join(", "),
            message.subject,
            message.body
        );

        tokio::fs::create_dir_all(&self.dir)
            .await
            .context(format!("Failed to create outbox directory {}", self.dir.display()))?;

        // relays only ever see complete .msg files
        let target = self.dir.join(Self::file_name(path, summary));
        let partial = target.with_extension("part");
        tokio::fs::write(&partial, contents.as_bytes())
            .await
            .context(format!("Failed to write {}", partial.display()))?;
        tokio::fs::rename(&partial, &target)
            .await
            .context(format!("Failed to move message into place at {}", target.display()))?;

        info!("Spooled {} notification to {}", path, target.display());
        Ok(())
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn verify_connection(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context(format!("Failed to create outbox directory {}", self.dir.display()))?;

        let probe = self.dir.join(format!(".probe-{}", Uuid::new_v4()));
        tokio::fs::write(&probe, b"probe")
            .await
            .context(format!("Outbox directory {} is not writable", self.dir.display()))?;
        tokio::fs::remove_file(&probe)
            .await
            .context(format!("Failed to remove {}", probe.display()))?;

        debug!("Outbox {} is writable", self.dir.display());
        Ok(())
    }

    async fn notify_success(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()> {
        self.spool(NotificationPath::Success, summary, options).await
    }

    async fn notify_partial(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()> {
        self.spool(NotificationPath::Partial, summary, options).await
    }

    async fn notify_failure(&self, summary: &RunSummary, options: &NotifyOptions) -> Result<()> {
        self.spool(NotificationPath::Failure, summary, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::summary::RunHeader;
    use chrono::Utc;
    use tempfile::TempDir;

    fn options() -> NotifyOptions {
        NotifyOptions {
            recipients: vec!["ops@example.com".to_string(), "dba@example.com".to_string()],
            subject_prefix: "[db-backup]".to_string(),
        }
    }

    #[tokio::test]
    async fn test_verify_creates_directory_and_leaves_it_empty() {
        let temp = TempDir::new().unwrap();
        let outbox = OutboxNotifier::new(temp.path().join("outbox"));

        outbox.verify_connection().await.unwrap();

        assert!(outbox.dir().is_dir());
        assert_eq!(std::fs::read_dir(outbox.dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_spooled_as_one_file() {
        let temp = TempDir::new().unwrap();
        let outbox = OutboxNotifier::new(temp.path());
        let summary = RunSummary::aborted(
            &RunHeader::new("shop"),
            vec!["database check: denied".to_string()],
            Utc::now(),
        );

        outbox.notify_failure(&summary, &options()).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);

        let name = entries[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_failure.msg"));
        assert!(name.contains(&summary.run_id.to_string()));

        let contents = std::fs::read_to_string(&entries[0]).unwrap();
        assert!(contents.starts_with("To: ops@example.com, dba@example.com\nSubject: [db-backup] Backup failed: shop"));
        assert!(contents.contains("database check: denied"));
    }
}
