//! Remote object storage for packaged artifacts.
//!
//! The orchestrator only talks to [`RemoteStore`]. The built-in
//! implementation is [`S3Store`], which works against Amazon S3 and
//! S3-compatible endpoints.
//!
//! ## Integrity
//!
//! After a put, the store reads back the stored object size and returns it
//! in [`RemoteObject::size`]. Object stores do not agree on a digest
//! algorithm (multipart ETags are not MD5s), so the orchestrator compares
//! sizes rather than checksums.
//!
//! ## Usage Example
//!
//! ```no_run
//! use rust_db_backup::cloud::{client::create_s3_client, S3Store, UploadOptions};
//!
//! # fn example() -> anyhow::Result<()> {
//! let client = create_s3_client(Some("eu-west-1"), None)?;
//! let store = S3Store::new(client, "db-backups");
//! let options = UploadOptions::new("nightly/shop");
//! assert_eq!(options.object_key("shop.sql.gz"), "nightly/shop/shop.sql.gz");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod s3;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::ArtifactMetadata;

pub use s3::S3Store;

/// Where an upload ended up.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteObject {
    /// Store-specific identifier (the object key for S3).
    pub remote_id: String,
    pub remote_url: String,
    /// Size of the stored object as reported by the store.
    pub size: u64,
}

/// Per-run placement settings.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    /// Key prefix, without leading or trailing slashes.
    pub prefix: String,
    /// Ask the store to encrypt the object at rest.
    pub encrypt: bool,
}

impl UploadOptions {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
            encrypt: false,
        }
    }

    pub fn with_encryption(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Key of an artifact named `name` under this prefix.
    pub fn object_key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

/// Destination for packaged artifacts.
///
/// Implementations must surface HTTP failures as
/// [`ServiceError`](crate::errors::ServiceError)s carrying the status, so
/// retry and classification can see it.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Confirm the destination exists and accepts our credentials.
    async fn verify_connection(&self) -> Result<()>;

    /// Store `bytes` as the artifact described by `metadata`.
    async fn upload(
        &self,
        bytes: &[u8],
        metadata: &ArtifactMetadata,
        options: &UploadOptions,
    ) -> Result<RemoteObject>;
}
