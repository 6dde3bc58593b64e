use std::fmt::Write;

use crate::notify::NotificationPath;
use crate::utils::summary::RunSummary;

/// Rendered notification, ready for any text transport.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
}

/// Human-readable byte count: 512 B, 1.5 KiB, 3.2 MiB.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

fn headline(path: NotificationPath) -> &'static str {
    match path {
        NotificationPath::Success => "Backup completed",
        NotificationPath::Partial => "Backup partially completed",
        NotificationPath::Failure => "Backup failed",
    }
}

pub fn render_message(
    path: NotificationPath,
    summary: &RunSummary,
    subject_prefix: &str,
) -> NotificationMessage {
    let subject = format!(
        "{} {}: {} ({}/{} artifacts uploaded)",
        subject_prefix,
        headline(path),
        summary.database,
        summary.succeeded,
        summary.total_artifacts
    )
    .trim_start()
    .to_string();

    // write! into a String cannot fail
    let mut body = String::new();
    let _ = writeln!(body, "{} for database '{}'.", headline(path), summary.database);
    let _ = writeln!(body);
    let _ = writeln!(body, "Status:      {}", summary.status);
    let _ = writeln!(body, "Run id:      {}", summary.run_id);
    let _ = writeln!(body, "Host:        {}", summary.host);
    let _ = writeln!(body, "Started:     {}", summary.started_at.to_rfc3339());
    let _ = writeln!(body, "Finished:    {}", summary.finished_at.to_rfc3339());
    let _ = writeln!(body, "Duration:    {} ms", summary.duration_ms);
    let _ = writeln!(
        body,
        "Artifacts:   {} total, {} uploaded, {} failed",
        summary.total_artifacts, summary.succeeded, summary.failed
    );
    let _ = writeln!(
        body,
        "Size:        {} raw, {} packaged (ratio {:.2})",
        format_bytes(summary.total_raw_bytes),
        format_bytes(summary.total_packaged_bytes),
        summary.compression_ratio
    );

    let _ = writeln!(body);
    if summary.outcomes.is_empty() {
        let _ = writeln!(body, "No artifacts were produced.");
    } else {
        let _ = writeln!(body, "Artifacts:");
        for outcome in &summary.outcomes {
            if outcome.success {
                let _ = writeln!(
                    body,
                    "  [ok]     {} -> {} ({}, {} attempt(s))",
                    outcome.artifact,
                    outcome.remote_location.as_deref().unwrap_or("-"),
                    format_bytes(outcome.packaged_size),
                    outcome.attempts
                );
            } else {
                let _ = writeln!(
                    body,
                    "  [failed] {}: {}",
                    outcome.artifact,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    if !summary.errors.is_empty() {
        let _ = writeln!(body);
        let _ = writeln!(body, "Errors:");
        for error in &summary.errors {
            let _ = writeln!(body, "  - {}", error);
        }
    }

    NotificationMessage { subject, body }
}
