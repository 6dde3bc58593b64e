use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::errors::ServiceError;
use crate::export::render::sql::quote_ident;
use crate::export::TableSource;
use crate::models::TableData;

/// PostgreSQL connection settings
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Reported instead of `current_database()` when set
    pub name_override: Option<String>,
}

impl PostgresConfig {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            max_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            name_override: None,
        }
    }
}

/// Reads base tables of the `public` schema.
pub struct PostgresSource {
    pool: PgPool,
    name_override: Option<String>,
}

/// Turn a sqlx error into a [`ServiceError`] carrying the SQLSTATE.
fn map_sqlx_error(err: sqlx::Error) -> anyhow::Error {
    let service = match &err {
        sqlx::Error::Database(db) => {
            let service = ServiceError::new(db.message());
            match db.code() {
                Some(code) => service.with_code(code.to_string()),
                None => service,
            }
        }
        sqlx::Error::PoolTimedOut => {
            ServiceError::new("timed out waiting for a database connection")
        }
        sqlx::Error::Io(io) => ServiceError::new(format!("network error: {}", io)),
        sqlx::Error::Tls(tls) => ServiceError::new(format!("network error during TLS: {}", tls)),
        other => ServiceError::new(other.to_string()),
    };
    anyhow::Error::new(service)
}

impl PostgresSource {
    /// Build the pool without connecting; the first query opens a connection,
    /// so connectivity problems surface in `verify_connection`.
    pub fn connect_lazy(config: PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(&config.database_url)
            .map_err(map_sqlx_error)
            .context("Invalid PostgreSQL URL")?;

        Ok(Self {
            pool,
            name_override: config.name_override,
        })
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
        .context(format!("Failed to read columns of {}", table))?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

#[async_trait]
impl TableSource for PostgresSource {
    async fn verify_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn database_name(&self) -> Result<String> {
        if let Some(name) = &self.name_override {
            return Ok(name.clone());
        }
        let (name,): (String,) = sqlx::query_as("SELECT current_database()::text")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(name)
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let (count,): (i64,) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_table(&self, table: &str) -> Result<TableData> {
        let columns = self.columns(table).await?;

        let sql = format!("SELECT row_to_json(t) FROM {} AS t", quote_ident(table));
        let rows: Vec<(Value,)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        // row_to_json keys follow column names; reorder into column order
        let rows = rows
            .into_iter()
            .map(|(row,)| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(TableData {
            name: table.to_string(),
            columns,
            rows,
        })
    }
}
