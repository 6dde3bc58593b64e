use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};

use crate::errors::{should_continue_operation, ClassifiedError};
use crate::export::render::render;
use crate::export::{ExportOutput, Exporter, TableSource};
use crate::models::{DatabaseMetadata, ExportFormat, TableFailure, TableInfo};

/// [`Exporter`] over any [`TableSource`].
///
/// A failing table is classified on the spot. Continuable failures skip
/// the table and report it; anything else fails the whole call.
pub struct TableExporter<S> {
    source: S,
}

impl<S: TableSource> TableExporter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

fn skip_or_fail(
    err: anyhow::Error,
    table: &str,
    operation: &str,
    skipped: &mut Vec<TableFailure>,
) -> Result<()> {
    let classified = ClassifiedError::from_error(&err, operation);
    if should_continue_operation(&classified) {
        warn!("Skipping table {}: {}", table, classified);
        skipped.push(TableFailure {
            table: table.to_string(),
            error: classified.with_remediation(),
            classified,
        });
        Ok(())
    } else {
        Err(err.context(format!("Table {} could not be read", table)))
    }
}

#[async_trait]
impl<S: TableSource> Exporter for TableExporter<S> {
    async fn verify_connection(&self) -> Result<()> {
        self.source.verify_connection().await
    }

    async fn discover(&self) -> Result<DatabaseMetadata> {
        let database_name = self
            .source
            .database_name()
            .await
            .context("Failed to read database name")?;
        let names = self.source.list_tables().await.context("Failed to list tables")?;

        let mut tables = Vec::with_capacity(names.len());
        let mut skipped_tables = Vec::new();

        for name in names {
            match self.source.count_rows(&name).await {
                Ok(row_count) => {
                    debug!("Table {} has {} rows", name, row_count);
                    tables.push(TableInfo { name, row_count });
                }
                Err(err) => {
                    let operation = format!("count rows of {}", name);
                    skip_or_fail(err, &name, &operation, &mut skipped_tables)?;
                }
            }
        }

        let metadata = DatabaseMetadata {
            database_name,
            tables,
            skipped_tables,
        };
        info!(
            "Discovered {} tables ({} rows) in {}",
            metadata.tables.len(),
            metadata.total_rows(),
            metadata.database_name
        );
        Ok(metadata)
    }

    async fn export_format(
        &self,
        format: ExportFormat,
        metadata: &DatabaseMetadata,
    ) -> Result<ExportOutput> {
        let mut data = Vec::with_capacity(metadata.tables.len());
        let mut skipped_tables = Vec::new();

        for table in &metadata.tables {
            match self.source.fetch_table(&table.name).await {
                Ok(mut fetched) => {
                    if fetched.name.is_empty() {
                        fetched.name = table.name.clone();
                    }
                    data.push(fetched);
                }
                Err(err) => {
                    let operation = format!("{} export of {}", format, table.name);
                    skip_or_fail(err, &table.name, &operation, &mut skipped_tables)?;
                }
            }
        }

        let bytes = render(format, &metadata.database_name, &data, Utc::now())?;
        debug!("Rendered {} export: {} tables, {} bytes", format, data.len(), bytes.len());

        Ok(ExportOutput {
            bytes,
            skipped_tables,
        })
    }
}
