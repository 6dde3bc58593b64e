//! Global constants for the rust-db-backup application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Retry profile constants
/// Database profile: attempts per operation
pub const DATABASE_MAX_ATTEMPTS: u32 = 3;

/// Database profile: first backoff delay (2s)
pub const DATABASE_BASE_DELAY_MS: u64 = 2_000;

/// Database profile: backoff cap (15s)
pub const DATABASE_MAX_DELAY_MS: u64 = 15_000;

/// Object-store profile: attempts per upload
pub const STORAGE_MAX_ATTEMPTS: u32 = 4;

/// Object-store profile: first backoff delay (1s)
pub const STORAGE_BASE_DELAY_MS: u64 = 1_000;

/// Object-store profile: backoff cap (20s)
pub const STORAGE_MAX_DELAY_MS: u64 = 20_000;

/// Notification profile: attempts per message
pub const NOTIFICATION_MAX_ATTEMPTS: u32 = 3;

/// Notification profile: first backoff delay (3s)
pub const NOTIFICATION_BASE_DELAY_MS: u64 = 3_000;

/// Notification profile: backoff cap (10s)
pub const NOTIFICATION_MAX_DELAY_MS: u64 = 10_000;

/// Multiplier applied to the delay after every failed attempt
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;

/// HTTP statuses the object store treats as transient
pub const RETRYABLE_HTTP_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

// Timeout constants
/// Connectivity checks during initialization
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Discovery and per-format export
pub const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 600;

/// Single artifact upload
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 300;

/// Single notification send
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 60;

// Error history
/// Classified errors kept in memory, oldest evicted first
pub const ERROR_HISTORY_CAPACITY: usize = 100;

// Packaging constants
/// Balanced gzip level
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Highest level gzip accepts
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Timestamp embedded in artifact names (second precision)
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Extension appended to compressed artifacts
pub const COMPRESSED_EXTENSION: &str = "gz";

/// Name tag marking compressed artifacts
pub const COMPRESSED_TAG: &str = "compressed";

// Default names
pub const DEFAULT_BASE_NAME: &str = "database_backup";
pub const DEFAULT_CONFIG_NAME: &str = "backup_config.yaml";
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "db-backup";
pub const DEFAULT_STORAGE_PREFIX: &str = "backups";
pub const DEFAULT_SUBJECT_PREFIX: &str = "[db-backup]";

// Content types
pub const CONTENT_TYPE_SQL: &str = "application/sql";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_XLSX: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const CONTENT_TYPE_GZIP: &str = "application/gzip";

/// Longest worksheet name a workbook accepts
pub const MAX_SHEET_NAME_LEN: usize = 31;
