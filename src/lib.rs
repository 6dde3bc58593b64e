//! # rust-db-backup
//!
//! Scheduled snapshots of a relational database, packaged, shipped to an
//! object store and reported.
//!
//! ## Overview
//!
//! One run exports every configured format (SQL, JSON, spreadsheet),
//! packages each export (optional gzip, SHA-256 checksum, deterministic
//! name), uploads the artifacts one by one and sends exactly one
//! notification whose path follows the run status.
//!
//! ## Features
//!
//! - **Per-dependency retry profiles**: database, object store and mail
//!   transport each get their own attempt budget, backoff bounds and
//!   retryability predicate
//! - **Error taxonomy**: every failure is classified into a fixed kind with
//!   severity and remediation hints, kept in a bounded history
//! - **Partial success**: a failed upload only affects the run status; the
//!   remaining artifacts are still shipped
//! - **Integrity checks**: persisted artifacts are re-validated before
//!   upload, and the stored object size is compared after it
//! - **YAML configuration** with `${VAR}` expansion for secrets
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rust_db_backup::cloud::{client::create_s3_client, S3Store};
//! use rust_db_backup::config::BackupConfig;
//! use rust_db_backup::export::{postgres::{PostgresConfig, PostgresSource}, TableExporter};
//! use rust_db_backup::localfs::DiskFs;
//! use rust_db_backup::notify::LogNotifier;
//! use rust_db_backup::orchestrator::BackupOrchestrator;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut config = BackupConfig::default();
//! config.process_environment_variables()?;
//!
//! let source = PostgresSource::connect_lazy(PostgresConfig::new(&config.database.url))?;
//! let client = create_s3_client(config.storage.region.as_deref(), None)?;
//! let store = S3Store::new(client, &config.storage.bucket);
//!
//! let mut orchestrator = BackupOrchestrator::new(
//!     config,
//!     Arc::new(TableExporter::new(source)),
//!     Arc::new(store),
//!     Arc::new(LogNotifier::new()),
//!     Arc::new(DiskFs::new()),
//! );
//! let report = orchestrator.run().await?;
//! println!("{} ({} artifacts)", report.summary.status, report.summary.total_artifacts);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: YAML configuration and environment expansion
//! - [`models`]: Export formats, artifact and database metadata
//! - [`errors`]: Failure classification and error history
//! - [`retry`]: Bounded retry with backoff, timeouts, named profiles
//! - [`packaging`]: Compression, checksums and artifact naming
//! - [`export`]: Database discovery and format rendering
//! - [`cloud`]: Object store uploads (S3)
//! - [`notify`]: Notification routing and built-in notifiers
//! - [`localfs`]: Local persistence between packaging and upload
//! - [`orchestrator`]: The pipeline state machine
//! - [`utils`]: Compression, hashing and run summaries
//! - [`security`]: Credential scrubbing
//! - [`constants`]: Application-wide constants
//!
//! ## Feature Flags
//!
//! - `postgres` (default): built-in PostgreSQL table source

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Configuration management
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Core data models and structures used throughout the application
pub mod models;

/// Failure classification and bounded error history
pub mod errors;

/// Retry executor, timeouts and per-dependency profiles
pub mod retry;

/// Artifact packaging
pub mod packaging;

/// Utility functions for compression, hashing, and run summaries
pub mod utils;

/// Database export
pub mod export;

/// Cloud storage integration (S3)
pub mod cloud;

/// Run notifications
pub mod notify;

/// Local artifact persistence
pub mod localfs;

/// Backup pipeline state machine
pub mod orchestrator;

/// Security utilities for credential protection
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
