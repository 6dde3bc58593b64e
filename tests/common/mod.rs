//! Shared in-memory collaborators for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use rust_db_backup::cloud::{RemoteObject, RemoteStore, UploadOptions};
use rust_db_backup::config::BackupConfig;
use rust_db_backup::errors::ServiceError;
use rust_db_backup::export::render::render;
use rust_db_backup::export::{ExportOutput, Exporter};
use rust_db_backup::localfs::LocalFs;
use rust_db_backup::models::{ArtifactMetadata, DatabaseMetadata, ExportFormat, TableData, TableInfo};

/// `orders` with 10 rows, `coupons` with none.
pub fn two_tables() -> Vec<TableData> {
    vec![
        TableData {
            name: "orders".to_string(),
            columns: vec!["id".to_string(), "sku".to_string(), "quantity".to_string()],
            rows: (0..10)
                .map(|i| vec![json!(i), json!(format!("SKU-{:04}", i)), json!(i % 3)])
                .collect(),
        },
        TableData {
            name: "coupons".to_string(),
            columns: vec!["code".to_string()],
            rows: Vec::new(),
        },
    ]
}

/// Config for sql + json with compression on and one recipient.
pub fn pipeline_config(output_dir: &Path) -> BackupConfig {
    let mut config = BackupConfig::default();
    config.formats = vec![ExportFormat::Sql, ExportFormat::Json];
    config.database.url = "postgres://localhost/shop".to_string();
    config.storage.bucket = "db-backups".to_string();
    config.output_dir = output_dir.to_path_buf();
    config.notifications.recipients = vec!["ops@example.com".to_string()];
    config
}

/// Exporter over fixed tables; connectivity can be made to fail.
pub struct TableFake {
    tables: Vec<TableData>,
    connect_error: Option<ServiceError>,
    calls: Mutex<Vec<String>>,
}

impl TableFake {
    pub fn new(tables: Vec<TableData>) -> Self {
        Self {
            tables,
            connect_error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_connect(mut self, error: ServiceError) -> Self {
        self.connect_error = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Exporter for TableFake {
    async fn verify_connection(&self) -> Result<()> {
        self.calls.lock().unwrap().push("verify".to_string());
        match &self.connect_error {
            Some(err) => Err(anyhow::Error::new(err.clone())),
            None => Ok(()),
        }
    }

    async fn discover(&self) -> Result<DatabaseMetadata> {
        self.calls.lock().unwrap().push("discover".to_string());
        Ok(DatabaseMetadata {
            database_name: "shop".to_string(),
            tables: self
                .tables
                .iter()
                .map(|t| TableInfo {
                    name: t.name.clone(),
                    row_count: t.rows.len() as u64,
                })
                .collect(),
            skipped_tables: Vec::new(),
        })
    }

    async fn export_format(
        &self,
        format: ExportFormat,
        metadata: &DatabaseMetadata,
    ) -> Result<ExportOutput> {
        self.calls.lock().unwrap().push(format!("export {}", format));
        let bytes = render(format, &metadata.database_name, &self.tables, Utc::now())?;
        Ok(ExportOutput::new(bytes))
    }
}

/// Object store that can reject every upload of one format.
#[derive(Default)]
pub struct BucketFake {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
    attempts: Mutex<HashMap<String, u32>>,
    rejected: Option<(ExportFormat, ServiceError)>,
}

impl BucketFake {
    pub fn rejecting(format: ExportFormat, error: ServiceError) -> Self {
        Self {
            rejected: Some((format, error)),
            ..Self::default()
        }
    }

    pub fn stored_names(&self) -> Vec<String> {
        self.objects.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn stored(&self, name: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.clone())
    }

    pub fn attempts_for(&self, name: &str) -> u32 {
        self.attempts.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl RemoteStore for BucketFake {
    async fn verify_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn upload(
        &self,
        bytes: &[u8],
        metadata: &ArtifactMetadata,
        options: &UploadOptions,
    ) -> Result<RemoteObject> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(metadata.name.clone())
            .or_insert(0) += 1;

        if let Some((format, error)) = &self.rejected {
            if *format == metadata.format {
                return Err(anyhow::Error::new(error.clone()));
            }
        }

        let key = options.object_key(&metadata.name);
        self.objects
            .lock()
            .unwrap()
            .push((metadata.name.clone(), bytes.to_vec()));
        Ok(RemoteObject {
            remote_url: format!("s3://db-backups/{}", key),
            remote_id: key,
            size: bytes.len() as u64,
        })
    }
}

/// Local filesystem in a map.
#[derive(Default)]
pub struct MapFs {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    deleted: Mutex<Vec<PathBuf>>,
}

impl MapFs {
    pub fn files(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn deleted(&self) -> Vec<PathBuf> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalFs for MapFs {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.deleted.lock().unwrap().push(path.to_path_buf());
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))
    }
}
