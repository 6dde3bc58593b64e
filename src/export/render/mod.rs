//! Format renderers. Layouts are readable snapshots, not a restore format.

pub mod json;
pub mod sql;
pub mod xlsx;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{ExportFormat, TableData};

pub fn render(
    format: ExportFormat,
    database: &str,
    tables: &[TableData],
    exported_at: DateTime<Utc>,
) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Sql => Ok(sql::render_sql(database, tables, exported_at)),
        ExportFormat::Json => json::render_json(database, tables, exported_at),
        ExportFormat::Xlsx => xlsx::render_xlsx(tables),
    }
}
