//! Test utilities for rust-db-backup
//!
//! In-memory stand-ins for the pipeline's collaborators, plus sample data.

#![cfg(test)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::cloud::{RemoteObject, RemoteStore, UploadOptions};
use crate::export::render::render;
use crate::export::{ExportOutput, Exporter};
use crate::localfs::LocalFs;
use crate::models::{ArtifactMetadata, DatabaseMetadata, ExportFormat, TableData, TableInfo};

/// Two tables: `orders` with 10 rows and `coupons` with none.
pub fn sample_tables() -> Vec<TableData> {
    vec![
        TableData {
            name: "orders".to_string(),
            columns: vec!["id".to_string(), "customer".to_string(), "total".to_string()],
            rows: (0..10)
                .map(|i| vec![json!(i), json!(format!("customer-{}", i)), json!(i * 250)])
                .collect(),
        },
        TableData {
            name: "coupons".to_string(),
            columns: vec!["code".to_string(), "discount".to_string()],
            rows: Vec::new(),
        },
    ]
}

/// Exporter over fixed tables, with per-format failures on demand.
pub struct FakeExporter {
    tables: Vec<TableData>,
    format_errors: HashMap<ExportFormat, String>,
}

impl FakeExporter {
    pub fn new(tables: Vec<TableData>) -> Self {
        Self {
            tables,
            format_errors: HashMap::new(),
        }
    }

    pub fn fail_format(mut self, format: ExportFormat, message: &str) -> Self {
        self.format_errors.insert(format, message.to_string());
        self
    }
}

#[async_trait]
impl Exporter for FakeExporter {
    async fn verify_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn discover(&self) -> Result<DatabaseMetadata> {
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
        if let Some(message) = self.format_errors.get(&format) {
            return Err(anyhow!("{}", message));
        }
        let bytes = render(format, &metadata.database_name, &self.tables, Utc::now())?;
        Ok(ExportOutput::new(bytes))
    }
}

/// Object store keeping every upload in memory.
#[derive(Default)]
pub struct FakeStore {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
    truncate: bool,
}

impl FakeStore {
    /// Report one byte less than was stored.
    pub fn truncating(mut self) -> Self {
        self.truncate = true;
        self
    }

    pub fn uploaded(&self) -> Vec<(String, Vec<u8>)> {
        self.objects.lock().unwrap().clone()
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploaded().into_iter().map(|(name, _)| name).collect()
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn verify_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn upload(
        &self,
        bytes: &[u8],
        metadata: &ArtifactMetadata,
        options: &UploadOptions,
    ) -> Result<RemoteObject> {
        let key = options.object_key(&metadata.name);
        self.objects
            .lock()
            .unwrap()
            .push((metadata.name.clone(), bytes.to_vec()));

        let size = if self.truncate {
            bytes.len().saturating_sub(1)
        } else {
            bytes.len()
        };
        Ok(RemoteObject {
            remote_url: format!("memory://{}", key),
            remote_id: key,
            size: size as u64,
        })
    }
}

/// Filesystem held in a map.
#[derive(Default)]
pub struct MemoryFs {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    corrupt_reads: bool,
    short_writes: Option<String>,
}

impl MemoryFs {
    /// Every read returns the stored bytes with the first byte flipped.
    pub fn corrupt_reads(mut self) -> Self {
        self.corrupt_reads = true;
        self
    }

    /// Writes to paths containing `marker` keep half the bytes, then fail
    /// as if the disk filled up.
    pub fn short_writes(mut self, marker: &str) -> Self {
        self.short_writes = Some(marker.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().unwrap().is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl LocalFs for MemoryFs {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let short = match &self.short_writes {
            Some(marker) => path.to_string_lossy().contains(marker.as_str()),
            None => false,
        };
        let kept = if short { &bytes[..bytes.len() / 2] } else { bytes };
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), kept.to_vec());
        if short {
            return Err(anyhow!("No space left on device (os error 28)"));
        }
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let mut bytes = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))?;
        if self.corrupt_reads {
            if let Some(first) = bytes.first_mut() {
                *first ^= 0xff;
            }
        }
        Ok(bytes)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))
    }
}

mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_fs_round_trip() {
        let fs = MemoryFs::default();
        let path = Path::new("/out/a.sql");
        fs.write(path, b"abc").await.unwrap();
        assert_eq!(fs.read(path).await.unwrap(), b"abc");
        assert_eq!(fs.paths(), vec![path.to_path_buf()]);
        fs.delete(path).await.unwrap();
        assert!(fs.is_empty());
    }
}
