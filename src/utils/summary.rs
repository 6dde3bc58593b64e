use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ArtifactMetadata, ExportFormat};

/// Overall verdict of one run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failure,
}

impl RunStatus {
    /// Status from upload counts.
    ///
    /// An aborted run is always a failure. Otherwise no failures means
    /// success (a run with nothing to upload included), no successes means
    /// failure, and anything in between is partial.
    pub fn derive(succeeded: usize, failed: usize, aborted: bool) -> Self {
        if aborted {
            RunStatus::Failure
        } else if failed == 0 {
            RunStatus::Success
        } else if succeeded == 0 {
            RunStatus::Failure
        } else {
            RunStatus::Partial
        }
    }

    /// Process exit code for the binary: only a failure is non-zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Failure => 1,
            RunStatus::Success | RunStatus::Partial => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of shipping one artifact.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtifactOutcome {
    pub artifact: String,
    pub format: ExportFormat,
    pub success: bool,
    /// Set iff `success`
    pub remote_location: Option<String>,
    pub remote_id: Option<String>,
    /// Set iff not `success`
    pub error: Option<String>,
    pub attempts: u32,
    pub raw_size: u64,
    pub packaged_size: u64,
    pub compressed: bool,
    pub checksum: String,
}

impl ArtifactOutcome {
    pub fn uploaded(
        metadata: &ArtifactMetadata,
        remote_id: String,
        remote_location: String,
        attempts: u32,
    ) -> Self {
        Self {
            artifact: metadata.name.clone(),
            format: metadata.format,
            success: true,
            remote_location: Some(remote_location),
            remote_id: Some(remote_id),
            error: None,
            attempts,
            raw_size: metadata.original_size,
            packaged_size: metadata.packaged_size(),
            compressed: metadata.compressed,
            checksum: metadata.checksum.clone(),
        }
    }

    pub fn failed(metadata: &ArtifactMetadata, error: String, attempts: u32) -> Self {
        Self {
            artifact: metadata.name.clone(),
            format: metadata.format,
            success: false,
            remote_location: None,
            remote_id: None,
            error: Some(error),
            attempts,
            raw_size: metadata.original_size,
            packaged_size: metadata.packaged_size(),
            compressed: metadata.compressed,
            checksum: metadata.checksum.clone(),
        }
    }
}

/// Fixed facts about a run, known before it starts.
#[derive(Debug, Clone)]
pub struct RunHeader {
    pub run_id: Uuid,
    pub host: String,
    pub database: String,
    pub started_at: DateTime<Utc>,
}

impl RunHeader {
    pub fn new(database: &str) -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            run_id: Uuid::new_v4(),
            host,
            database: database.to_string(),
            started_at: Utc::now(),
        }
    }
}

/// Aggregate record of one execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub host: String,
    pub database: String,
    pub status: RunStatus,
    /// The run stopped before the upload stage
    pub aborted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_artifacts: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_raw_bytes: u64,
    pub total_packaged_bytes: u64,
    /// `total_raw_bytes / total_packaged_bytes`, 1.0 when nothing was packaged
    pub compression_ratio: f64,
    pub outcomes: Vec<ArtifactOutcome>,
    pub errors: Vec<String>,
}

impl RunSummary {
    /// Build the summary from per-artifact outcomes, in upload order.
    pub fn aggregate(
        header: &RunHeader,
        outcomes: Vec<ArtifactOutcome>,
        errors: Vec<String>,
        aborted: bool,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let total_artifacts = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let failed = total_artifacts - succeeded;

        let total_raw_bytes: u64 = outcomes.iter().map(|o| o.raw_size).sum();
        let total_packaged_bytes: u64 = outcomes.iter().map(|o| o.packaged_size).sum();
        let compression_ratio = if total_packaged_bytes == 0 {
            1.0
        } else {
            total_raw_bytes as f64 / total_packaged_bytes as f64
        };

        let duration_ms = (finished_at - header.started_at).num_milliseconds().max(0) as u64;

        Self {
            run_id: header.run_id,
            host: header.host.clone(),
            database: header.database.clone(),
            status: RunStatus::derive(succeeded, failed, aborted),
            aborted,
            started_at: header.started_at,
            finished_at,
            duration_ms,
            total_artifacts,
            succeeded,
            failed,
            total_raw_bytes,
            total_packaged_bytes,
            compression_ratio,
            outcomes,
            errors,
        }
    }

    /// Summary of a run that stopped before producing anything uploadable.
    pub fn aborted(header: &RunHeader, errors: Vec<String>, finished_at: DateTime<Utc>) -> Self {
        Self::aggregate(header, Vec::new(), errors, true, finished_at)
    }

    pub fn successful_outcomes(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    pub fn failed_outcomes(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run summary to JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn metadata(name: &str, format: ExportFormat, raw: u64, packed: Option<u64>) -> ArtifactMetadata {
        ArtifactMetadata {
            name: name.to_string(),
            format,
            original_size: raw,
            compressed_size: packed,
            compression_ratio: packed.map(|p| raw as f64 / p as f64).unwrap_or(1.0),
            checksum: "ab".repeat(32),
            compressed: packed.is_some(),
            created_at: Utc::now(),
        }
    }

    fn header() -> RunHeader {
        RunHeader {
            run_id: Uuid::new_v4(),
            host: "db-host".to_string(),
            database: "app".to_string(),
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_derivation_table() {
        assert_eq!(RunStatus::derive(0, 0, false), RunStatus::Success);
        assert_eq!(RunStatus::derive(3, 0, false), RunStatus::Success);
        assert_eq!(RunStatus::derive(0, 2, false), RunStatus::Failure);
        assert_eq!(RunStatus::derive(1, 1, false), RunStatus::Partial);
        assert_eq!(RunStatus::derive(0, 0, true), RunStatus::Failure);
        assert_eq!(RunStatus::derive(2, 0, true), RunStatus::Failure);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::Partial.exit_code(), 0);
        assert_eq!(RunStatus::Failure.exit_code(), 1);
    }

    #[test]
    fn test_aggregate_counts_and_ratio() {
        let h = header();
        let sql = metadata("b.sql.gz", ExportFormat::Sql, 1000, Some(250));
        let json = metadata("b.json.gz", ExportFormat::Json, 600, Some(150));
        let outcomes = vec![
            ArtifactOutcome::uploaded(&sql, "k1".into(), "s3://bucket/k1".into(), 1),
            ArtifactOutcome::failed(&json, "upload b.json.gz: rate limit".into(), 4),
        ];
        let finished = h.started_at + Duration::milliseconds(1500);

        let summary = RunSummary::aggregate(&h, outcomes, vec!["upload b.json.gz: rate limit".into()], false, finished);

        assert_eq!(summary.status, RunStatus::Partial);
        assert_eq!(summary.total_artifacts, 2);
        assert_eq!(summary.succeeded + summary.failed, summary.total_artifacts);
        assert_eq!(summary.total_raw_bytes, 1600);
        assert_eq!(summary.total_packaged_bytes, 400);
        assert!((summary.compression_ratio - 4.0).abs() < f64::EPSILON);
        assert_eq!(summary.duration_ms, 1500);
        assert_eq!(summary.successful_outcomes().count(), 1);
        assert_eq!(summary.failed_outcomes().next().unwrap().attempts, 4);
    }

    #[test]
    fn test_ratio_is_one_without_compression() {
        let h = header();
        let xlsx = metadata("b.xlsx", ExportFormat::Xlsx, 2048, None);
        let outcomes = vec![ArtifactOutcome::uploaded(&xlsx, "k".into(), "s3://b/k".into(), 1)];

        let summary = RunSummary::aggregate(&h, outcomes, Vec::new(), false, Utc::now());
        assert!((summary.compression_ratio - 1.0).abs() < f64::EPSILON);
        assert_eq!(summary.status, RunStatus::Success);
    }

    #[test]
    fn test_aborted_summary_has_zero_totals() {
        let h = header();
        let summary = RunSummary::aborted(&h, vec!["database check: authentication failed".into()], Utc::now());

        assert_eq!(summary.status, RunStatus::Failure);
        assert!(summary.aborted);
        assert_eq!(summary.total_artifacts, 0);
        assert_eq!(summary.total_raw_bytes, 0);
        assert!((summary.compression_ratio - 1.0).abs() < f64::EPSILON);
        assert_eq!(summary.errors.len(), 1);
    }

    #[test]
    fn test_json_output() {
        let h = header();
        let summary = RunSummary::aborted(&h, Vec::new(), Utc::now());
        let json = summary.to_json_pretty().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["host"], "db-host");
        assert_eq!(value["run_id"], h.run_id.to_string());
        assert!(value["outcomes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_run_header_has_host() {
        let h = RunHeader::new("app");
        assert!(!h.host.is_empty());
        assert_eq!(h.database, "app");
    }
}
