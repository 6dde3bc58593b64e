//! Database export.
//!
//! The orchestrator only sees [`Exporter`]. The built-in implementation,
//! [`TableExporter`], reads tables from any [`TableSource`] and renders
//! them into each requested format.

pub mod render;
pub mod table_exporter;

#[cfg(feature = "postgres")]
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DatabaseMetadata, ExportFormat, TableData, TableFailure};

pub use table_exporter::TableExporter;

#[cfg(feature = "postgres")]
pub use postgres::PostgresSource;

/// Raw output of one format export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    /// Tables left out because of a continuable failure
    pub skipped_tables: Vec<TableFailure>,
}

impl ExportOutput {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            skipped_tables: Vec::new(),
        }
    }
}

/// Produces raw snapshot bytes for one format at a time.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Cheap round trip proving the database is reachable with our credentials.
    async fn verify_connection(&self) -> Result<()>;

    /// Tables and row counts to export.
    async fn discover(&self) -> Result<DatabaseMetadata>;

    async fn export_format(
        &self,
        format: ExportFormat,
        metadata: &DatabaseMetadata,
    ) -> Result<ExportOutput>;
}

/// Table-level read access to a database.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn verify_connection(&self) -> Result<()>;

    async fn database_name(&self) -> Result<String>;

    async fn list_tables(&self) -> Result<Vec<String>>;

    async fn count_rows(&self, table: &str) -> Result<u64>;

    async fn fetch_table(&self, table: &str) -> Result<TableData>;
}
