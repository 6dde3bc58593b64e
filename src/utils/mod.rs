//! Utility functions for artifact packaging and reporting.
//!
//! ## Components
//!
//! - **Compression**: in-memory gzip with a configurable level
//! - **Hashing**: SHA-256 digests for integrity checks
//! - **Summary**: run summary aggregation and JSON reporting
//!
//! ## Common Use Cases
//!
//! ### Hashing a Packaged Artifact
//!
//! ```
//! use rust_db_backup::utils::hash::{sha256_hex, verify_sha256};
//!
//! let digest = sha256_hex(b"INSERT INTO t VALUES (1);");
//! assert_eq!(digest.len(), 64);
//! assert!(verify_sha256(b"INSERT INTO t VALUES (1);", &digest));
//! ```
//!
//! ### Deriving a Run Status
//!
//! ```
//! use rust_db_backup::utils::summary::RunStatus;
//!
//! assert_eq!(RunStatus::derive(2, 0, false), RunStatus::Success);
//! assert_eq!(RunStatus::derive(1, 1, false), RunStatus::Partial);
//! assert_eq!(RunStatus::derive(0, 0, true), RunStatus::Failure);
//! ```

/// Run summary aggregation and reporting
pub mod summary;

/// In-memory gzip compression
pub mod compress;

/// Cryptographic hash calculation utilities
pub mod hash;
