use chrono::{DateTime, Utc};

use crate::config::NamingConfig;
use crate::constants::{ARTIFACT_TIMESTAMP_FORMAT, COMPRESSED_EXTENSION, COMPRESSED_TAG};
use crate::models::ExportFormat;

/// Replace anything outside `[A-Za-z0-9_-]` so the name is safe as both a
/// local file name and an object key segment.
pub fn sanitize_base_name(base_name: &str) -> String {
    let cleaned: String = base_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    if cleaned.is_empty() {
        "backup".to_string()
    } else {
        cleaned
    }
}

/// Deterministic artifact file name.
///
/// Layout: `{base}[_{timestamp}][_{format}][_compressed].{ext}[.gz]`. The
/// instant is passed in, so the same inputs always give the same name and a
/// re-run of a failed stage overwrites its earlier output.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use rust_db_backup::config::NamingConfig;
/// use rust_db_backup::models::ExportFormat;
/// use rust_db_backup::packaging::artifact_name;
///
/// let naming = NamingConfig::default();
/// let at = Utc.with_ymd_and_hms(2026, 10, 14, 3, 0, 0).unwrap();
/// let name = artifact_name(&naming, ExportFormat::Sql, true, at);
/// assert!(name.ends_with(".sql.gz"));
/// ```
pub fn artifact_name(
    naming: &NamingConfig,
    format: ExportFormat,
    compressed: bool,
    at: DateTime<Utc>,
) -> String {
    let mut parts = vec![sanitize_base_name(&naming.base_name)];

    if naming.include_timestamp {
        parts.push(at.format(ARTIFACT_TIMESTAMP_FORMAT).to_string());
    }
    if naming.include_format {
        parts.push(format.extension().to_string());
    }
    if compressed && naming.include_compression_tag {
        parts.push(COMPRESSED_TAG.to_string());
    }

    let mut name = format!("{}.{}", parts.join("_"), format.extension());
    if compressed {
        name.push('.');
        name.push_str(COMPRESSED_EXTENSION);
    }
    name
}
