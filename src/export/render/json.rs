use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::models::TableData;

fn row_object(columns: &[String], row: &[Value]) -> Value {
    let mut object = Map::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        object.insert(column.clone(), row.get(i).cloned().unwrap_or(Value::Null));
    }
    Value::Object(object)
}

/// Pretty JSON document `{database, exported_at, tables: {name: [rows]}}`.
pub fn render_json(database: &str, tables: &[TableData], exported_at: DateTime<Utc>) -> Result<Vec<u8>> {
    let mut table_map = Map::with_capacity(tables.len());
    for table in tables {
        let rows: Vec<Value> = table
            .rows
            .iter()
            .map(|row| row_object(&table.columns, row))
            .collect();
        table_map.insert(table.name.clone(), Value::Array(rows));
    }

    let document = json!({
        "database": database,
        "exported_at": exported_at.to_rfc3339(),
        "tables": table_map,
    });

    serde_json::to_vec_pretty(&document).context("Failed to write JSON export")
}
