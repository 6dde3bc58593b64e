use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::{CompressionConfig, NamingConfig};
use crate::models::{ArtifactMetadata, ExportFormat};
use crate::packaging::naming::artifact_name;
use crate::utils::compress::{gunzip_bytes, gzip_bytes};
use crate::utils::hash::sha256_hex;

/// Packaged bytes plus the metadata describing them.
#[derive(Debug, Clone, PartialEq)]
pub struct PackagedArtifact {
    pub bytes: Vec<u8>,
    pub metadata: ArtifactMetadata,
}

/// Outcome of re-checking a packaged artifact. Problems are collected, not
/// raised.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Turns raw export output into uploadable artifacts.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPackager {
    compression: CompressionConfig,
    naming: NamingConfig,
}

impl ArtifactPackager {
    pub fn new(compression: CompressionConfig, naming: NamingConfig) -> Self {
        Self { compression, naming }
    }

    pub fn compression(&self) -> &CompressionConfig {
        &self.compression
    }

    pub fn naming(&self) -> &NamingConfig {
        &self.naming
    }

    /// Whether `format` gets gzipped under this packager's settings.
    pub fn compresses(&self, format: ExportFormat) -> bool {
        self.compression.enabled && format.is_compressible()
    }

    /// Optionally compress, checksum and name `raw`.
    ///
    /// The spreadsheet format is never compressed regardless of settings.
    ///
    /// # Arguments
    ///
    /// * `raw` - Rendered export bytes
    /// * `format` - Format the bytes were rendered in
    /// * `created_at` - Instant stamped into the name and metadata
    ///
    /// # Returns
    ///
    /// The bytes to persist with their metadata, or an error if
    /// compression failed
    pub async fn package(
        &self,
        raw: Vec<u8>,
        format: ExportFormat,
        created_at: DateTime<Utc>,
    ) -> Result<PackagedArtifact> {
        let original_size = raw.len() as u64;
        let compress = self.compresses(format);

        let (bytes, compressed_size) = if compress {
            let packed = gzip_bytes(&raw, self.compression.level)
                .await
                .context(format!("Failed to compress {} export", format))?;
            let size = packed.len() as u64;
            (packed, Some(size))
        } else {
            (raw, None)
        };

        let compression_ratio = match compressed_size {
            Some(size) if size > 0 => original_size as f64 / size as f64,
            _ => 1.0,
        };

        let metadata = ArtifactMetadata {
            name: artifact_name(&self.naming, format, compress, created_at),
            format,
            original_size,
            compressed_size,
            compression_ratio,
            checksum: sha256_hex(&bytes),
            compressed: compress,
            created_at,
        };

        debug!(
            "Packaged {}: {} -> {} bytes (ratio {:.2})",
            metadata.name,
            original_size,
            metadata.packaged_size(),
            compression_ratio
        );

        Ok(PackagedArtifact { bytes, metadata })
    }

    /// Re-check checksum and size, and probe decompression for compressed
    /// artifacts. The decompressed output is only measured, then dropped.
    pub async fn validate(bytes: &[u8], metadata: &ArtifactMetadata) -> ValidationReport {
        let mut errors = Vec::new();

        let actual_checksum = sha256_hex(bytes);
        if !actual_checksum.eq_ignore_ascii_case(&metadata.checksum) {
            errors.push(format!(
                "checksum mismatch for {}: expected {}, got {}",
                metadata.name, metadata.checksum, actual_checksum
            ));
        }

        let expected_size = metadata.packaged_size();
        if bytes.len() as u64 != expected_size {
            errors.push(format!(
                "size mismatch for {}: expected {} bytes, got {}",
                metadata.name,
                expected_size,
                bytes.len()
            ));
        }

        if metadata.compressed {
            match gunzip_bytes(bytes).await {
                Ok(inflated) if inflated.len() as u64 != metadata.original_size => {
                    errors.push(format!(
                        "decompressed size mismatch for {}: expected {} bytes, got {}",
                        metadata.name,
                        metadata.original_size,
                        inflated.len()
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    errors.push(format!("decompression probe failed for {}: {:#}", metadata.name, e));
                }
            }
        }

        if !errors.is_empty() {
            warn!("Validation of {} found {} problem(s)", metadata.name, errors.len());
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }
}
