use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::TableData;

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Render one value as a SQL literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_string(s),
        // nested values are stored as JSON text
        Value::Array(_) | Value::Object(_) => quote_string(&value.to_string()),
    }
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// One `INSERT INTO` statement per row, grouped by table.
pub fn render_sql(database: &str, tables: &[TableData], exported_at: DateTime<Utc>) -> Vec<u8> {
    let mut out = String::new();

    // writes into a String cannot fail
    let _ = writeln!(out, "-- Database backup: {}", database);
    let _ = writeln!(out, "-- Exported at: {}", exported_at.to_rfc3339());
    let _ = writeln!(out, "-- Tables: {}", tables.len());

    for table in tables {
        let _ = writeln!(out);
        let _ = writeln!(out, "-- Table: {} ({} rows)", table.name, table.rows.len());

        if table.columns.is_empty() {
            continue;
        }

        let columns = table
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let name = quote_ident(&table.name);

        for row in &table.rows {
            let values = table
                .columns
                .iter()
                .enumerate()
                .map(|(i, _)| row.get(i).map(sql_literal).unwrap_or_else(|| "NULL".to_string()))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "INSERT INTO {} ({}) VALUES ({});", name, columns, values);
        }
    }

    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_literals() {
        assert_eq!(sql_literal(&Value::Null), "NULL");
        assert_eq!(sql_literal(&json!(true)), "TRUE");
        assert_eq!(sql_literal(&json!(42)), "42");
        assert_eq!(sql_literal(&json!(1.5)), "1.5");
        assert_eq!(sql_literal(&json!("O'Brien")), "'O''Brien'");
        assert_eq!(sql_literal(&json!({"a": 1})), "'{\"a\":1}'");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_render_tables() {
        let tables = vec![
            TableData {
                name: "users".to_string(),
                columns: vec!["id".to_string(), "name".to_string()],
                rows: vec![vec![json!(1), json!("ann")], vec![json!(2), Value::Null]],
            },
            TableData {
                name: "audit".to_string(),
                columns: vec!["id".to_string()],
                rows: Vec::new(),
            },
        ];
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let sql = String::from_utf8(render_sql("app", &tables, at)).unwrap();

        assert!(sql.starts_with("-- Database backup: app\n"));
        assert!(sql.contains("-- Tables: 2"));
        assert!(sql.contains("INSERT INTO \"users\" (\"id\", \"name\") VALUES (1, 'ann');"));
        assert!(sql.contains("INSERT INTO \"users\" (\"id\", \"name\") VALUES (2, NULL);"));
        assert!(sql.contains("-- Table: audit (0 rows)"));
        assert_eq!(sql.matches("INSERT INTO").count(), 2);
    }

    #[test]
    fn test_short_rows_are_padded_with_null() {
        let tables = vec![TableData {
            name: "t".to_string(),
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec![json!(1)]],
        }];
        let sql = String::from_utf8(render_sql("db", &tables, Utc::now())).unwrap();
        assert!(sql.contains("VALUES (1, NULL);"));
    }
}
