//! Artifact packaging: optional gzip, SHA-256 checksum and a deterministic
//! file name applied to raw export bytes.

pub mod naming;
pub mod packager;

pub use naming::{artifact_name, sanitize_base_name};
pub use packager::{ArtifactPackager, PackagedArtifact, ValidationReport};
