use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{CONTENT_TYPE_JSON, CONTENT_TYPE_SQL, CONTENT_TYPE_XLSX};
use crate::errors::ClassifiedError;

/// Snapshot formats a run can produce.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Sql,
    Json,
    Xlsx,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Sql, ExportFormat::Json, ExportFormat::Xlsx];

    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Sql => "sql",
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    /// Whether packaging may gzip this format.
    ///
    /// A workbook is already a deflated zip container; gzipping it again
    /// gains nothing and some readers reject the result.
    pub fn is_compressible(&self) -> bool {
        match self {
            ExportFormat::Sql | ExportFormat::Json => true,
            ExportFormat::Xlsx => false,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Sql => CONTENT_TYPE_SQL,
            ExportFormat::Json => CONTENT_TYPE_JSON,
            ExportFormat::Xlsx => CONTENT_TYPE_XLSX,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sql" => Ok(ExportFormat::Sql),
            "json" => Ok(ExportFormat::Json),
            "xlsx" | "excel" | "spreadsheet" => Ok(ExportFormat::Xlsx),
            other => Err(anyhow!("Unknown export format: {}", other)),
        }
    }
}

/// Everything known about one packaged artifact.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtifactMetadata {
    pub name: String,
    pub format: ExportFormat,
    pub original_size: u64,
    /// Present only when compression was applied.
    pub compressed_size: Option<u64>,
    pub compression_ratio: f64,
    /// Hex SHA-256 of the packaged bytes.
    pub checksum: String,
    pub compressed: bool,
    pub created_at: DateTime<Utc>,
}

impl ArtifactMetadata {
    /// Size of the bytes that are persisted and uploaded.
    pub fn packaged_size(&self) -> u64 {
        self.compressed_size.unwrap_or(self.original_size)
    }

    pub fn content_type(&self) -> &'static str {
        if self.compressed {
            crate::constants::CONTENT_TYPE_GZIP
        } else {
            self.format.content_type()
        }
    }
}

/// One table found during discovery.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub row_count: u64,
}

/// Result of discovering the database before export.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DatabaseMetadata {
    pub database_name: String,
    pub tables: Vec<TableInfo>,
    /// Tables discovery had to leave out, with the reason.
    #[serde(default)]
    pub skipped_tables: Vec<TableFailure>,
}

impl DatabaseMetadata {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.row_count).sum()
    }
}

/// Column names plus rows, values positionally aligned with the columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableData {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// A table that was skipped because of a continuable failure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
    pub classified: ClassifiedError,
}
