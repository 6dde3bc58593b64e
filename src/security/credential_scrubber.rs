//! Credential scrubbing for error text.
//!
//! Failure messages from database drivers and cloud SDKs routinely echo
//! connection strings or request headers. Everything that ends up in logs,
//! run summaries or notification bodies goes through [`scrub_credentials`].

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CREDENTIAL_PATTERNS: Vec<(Regex, &'static str)> = vec![
        // Database connection strings
        (Regex::new(r"(?i)(postgres|postgresql|mysql|mariadb|mongodb(?:\+srv)?|redis|mssql|sqlserver)://([^:/@\s]+):([^@\s]+)@").unwrap(),
         "$1://<REDACTED_USER>:<REDACTED_PASS>@"),

        // Basic auth in URLs
        (Regex::new(r"(https?://)([^:/@\s]+):([^@\s]+)@").unwrap(),
         "$1<REDACTED_USER>:<REDACTED_PASS>@"),

        // AWS Access Key ID
        (Regex::new(r"(?i)(aws[_-]?access[_-]?key[_-]?id|access[_-]?key[_-]?id)\s*[:=]\s*([A-Z0-9]{16,32})").unwrap(),
         "$1=<REDACTED_AWS_KEY>"),

        // AWS Secret Access Key
        (Regex::new(r"(?i)(aws[_-]?secret[_-]?access[_-]?key|secret[_-]?access[_-]?key|secret[_-]?key)\s*[:=]\s*([A-Za-z0-9/+=]{16,})").unwrap(),
         "$1=<REDACTED_AWS_SECRET>"),

        // libpq keyword/value connection strings and generic passwords
        (Regex::new(r"(?i)\b(password|passwd|pwd)\s*[:=]\s*([^\s;]+)").unwrap(),
         "$1=<REDACTED_PASSWORD>"),

        // Bearer tokens
        (Regex::new(r"(?i)(bearer|authorization)\s*[:=]?\s*(bearer\s+)?([A-Za-z0-9\-._~+/]{8,}=*)").unwrap(),
         "$1=<REDACTED_TOKEN>"),

        // Generic tokens
        (Regex::new(r"(?i)\b(token|access[_-]?token|auth[_-]?token|api[_-]?key)\s*[:=]\s*([A-Za-z0-9\-._~+/]{8,})").unwrap(),
         "$1=<REDACTED_TOKEN>"),
    ];
}

/// Scrub credentials from a string.
///
/// # Example
///
/// ```
/// use rust_db_backup::security::credential_scrubber::scrub_credentials;
///
/// let input = "connect failed for postgres://backup:hunter2@db:5432/app";
/// assert_eq!(
///     scrub_credentials(input),
///     "connect failed for postgres://<REDACTED_USER>:<REDACTED_PASS>@db:5432/app"
/// );
/// ```
pub fn scrub_credentials(input: &str) -> String {
    let mut result = input.to_string();

    for (pattern, replacement) in CREDENTIAL_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }

    result
}

/// Format `context: error` (with the full cause chain) and scrub it.
pub fn safe_error_message(context: &str, error: &anyhow::Error) -> String {
    scrub_credentials(&format!("{}: {:#}", context, error))
}
