use async_compression::tokio::bufread::GzipDecoder;
use async_compression::tokio::write::GzipEncoder;
use async_compression::Level;
use anyhow::{Context, Result};
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::constants::MAX_COMPRESSION_LEVEL;

/// First two bytes of every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Gzip `data` in memory at `level` (clamped to 0-9).
pub async fn gzip_bytes(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let level = level.min(MAX_COMPRESSION_LEVEL);
    let mut encoder =
        GzipEncoder::with_quality(Vec::with_capacity(data.len() / 2 + 64), Level::Precise(level));

    encoder
        .write_all(data)
        .await
        .context("Failed to compress data")?;
    encoder
        .shutdown()
        .await
        .context("Failed to finalize compression")?;

    let compressed = encoder.into_inner();
    debug!("Compressed {} bytes to {} bytes at level {}", data.len(), compressed.len(), level);
    Ok(compressed)
}

/// Inflate a gzip buffer produced by [`gzip_bytes`].
pub async fn gunzip_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzipDecoder::new(data);
    let mut decompressed = Vec::with_capacity(data.len() * 2);
    decoder
        .read_to_end(&mut decompressed)
        .await
        .context("Failed to decompress data")?;
    Ok(decompressed)
}

pub fn looks_like_gzip(data: &[u8]) -> bool {
    data.len() >= GZIP_MAGIC.len() && data[..2] == GZIP_MAGIC
}
