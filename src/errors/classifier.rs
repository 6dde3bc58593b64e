use std::fmt;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::history::ErrorHistory;
use crate::errors::service::ServiceError;
use crate::retry::TimeoutError;
use crate::security::scrub_credentials;

/// Failure taxonomy shared by every stage of a run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Authentication,
    Permission,
    Data,
    Timeout,
    RateLimit,
    Storage,
    Validation,
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorKind {
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::Connection => Severity::High,
            ErrorKind::Authentication => Severity::Critical,
            ErrorKind::Permission => Severity::High,
            ErrorKind::Timeout => Severity::Medium,
            ErrorKind::RateLimit => Severity::Medium,
            ErrorKind::Storage => Severity::High,
            ErrorKind::Data => Severity::Low,
            ErrorKind::Validation => Severity::Low,
            ErrorKind::Unknown => Severity::Medium,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::RateLimit
        )
    }

    pub fn suggested_actions(&self) -> &'static [&'static str] {
        match self {
            ErrorKind::Connection => &[
                "Check that the host is reachable and the port is open",
                "Verify DNS resolution and firewall rules",
                "Retry once the network is stable",
            ],
            ErrorKind::Authentication => &[
                "Verify the configured credentials",
                "Rotate or refresh expired tokens and keys",
            ],
            ErrorKind::Permission => &[
                "Grant the backup account read access to the resource",
                "Check bucket or folder policies for the upload target",
            ],
            ErrorKind::Timeout => &[
                "Increase the configured timeout for this stage",
                "Check server load during the backup window",
            ],
            ErrorKind::RateLimit => &[
                "Reduce backup frequency or request volume",
                "Check the provider quota for this account",
            ],
            ErrorKind::Storage => &[
                "Free space in the local output directory",
                "Check the remote storage quota",
            ],
            ErrorKind::Data => &[
                "Inspect the affected table for malformed or unsupported values",
            ],
            ErrorKind::Validation => &[
                "Review the configuration and the artifact that failed validation",
            ],
            ErrorKind::Unknown => &["Check the logs for the full error chain"],
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Permission => "permission",
            ErrorKind::Data => "data",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Storage => "storage",
            ErrorKind::Validation => "validation",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

const CONNECTION_KEYWORDS: &[&str] = &[
    "econnrefused", "econnreset", "enotfound", "ehostunreach", "connection refused",
    "connection reset", "connection closed", "connection terminated", "connection lost",
    "could not connect", "failed to connect", "error connecting", "network",
    "host unreachable", "broken pipe", "socket hang up", "dns error",
];
const CONNECTION_CODES: &[&str] = &[
    "ECONNREFUSED", "ECONNRESET", "ENOTFOUND", "EHOSTUNREACH", "08000", "08001", "08003",
    "08004", "08006",
];

const AUTH_KEYWORDS: &[&str] = &[
    "authentication", "unauthorized", "unauthenticated", "invalid credentials",
    "invalid_grant", "invalid token", "token expired", "expiredtoken", "invalid api key",
    "login failed", "invalidaccesskeyid", "signaturedoesnotmatch",
];
const AUTH_CODES: &[&str] = &[
    "28000", "28P01", "EAUTH", "INVALIDACCESSKEYID", "SIGNATUREDOESNOTMATCH", "EXPIREDTOKEN",
];

const PERMISSION_KEYWORDS: &[&str] = &[
    "permission denied", "forbidden", "access denied", "accessdenied",
    "insufficient privilege", "not permitted", "not authorized",
];
const PERMISSION_CODES: &[&str] = &["42501", "ACCESSDENIED", "EACCES", "EPERM"];

const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "timed out", "deadline exceeded"];
const TIMEOUT_CODES: &[&str] = &["ETIMEDOUT", "ESOCKETTIMEDOUT", "57014", "REQUESTTIMEOUT"];

const RATE_LIMIT_KEYWORDS: &[&str] = &[
    "rate limit", "ratelimit", "rate exceeded", "too many requests", "quota", "throttl",
    "slow down", "slowdown",
];
const RATE_LIMIT_CODES: &[&str] = &["SLOWDOWN", "THROTTLING", "TOOMANYREQUESTS"];

const STORAGE_KEYWORDS: &[&str] = &[
    "no space left", "disk full", "enospc", "insufficient storage", "storage full",
    "entitytoolarge",
];
const STORAGE_CODES: &[&str] = &["ENOSPC", "53100", "ENTITYTOOLARGE"];

const DATA_KEYWORDS: &[&str] = &[
    "syntax error", "constraint", "duplicate key", "violates", "invalid input syntax",
    "malformed", "corrupt", "deserializ", "serializ", "encoding", "out of range",
];

const VALIDATION_KEYWORDS: &[&str] = &[
    "validation", "invalid", "missing required", "must be", "not allowed",
    "checksum mismatch", "size mismatch",
];

/// The raw facts classification looks at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorFacts {
    /// Full cause chain, kept for display.
    pub message: String,
    /// Text the keyword rules match: the innermost failure, without the
    /// labels and context lines callers wrap around it.
    pub cause: String,
    pub code: Option<String>,
    pub status: Option<u16>,
    pub timed_out: bool,
}

impl ErrorFacts {
    pub fn from_error(err: &anyhow::Error) -> Self {
        let service = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<ServiceError>());
        let timed_out = err
            .chain()
            .any(|cause| cause.downcast_ref::<TimeoutError>().is_some());

        let cause = match service {
            Some(service) => service.message.clone(),
            None if timed_out => "timed out".to_string(),
            None => err.root_cause().to_string(),
        };

        Self {
            message: format!("{:#}", err),
            cause,
            code: service.and_then(|s| s.code.clone()),
            status: service.and_then(|s| s.status),
            timed_out,
        }
    }

    /// Facts for a bare message with no structured fields.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            cause: message.clone(),
            message,
            ..Self::default()
        }
    }

    fn code_in(&self, codes: &[&str]) -> bool {
        match &self.code {
            Some(code) => {
                let code = code.to_uppercase();
                codes.iter().any(|c| *c == code)
            }
            None => false,
        }
    }

    fn is_data_sqlstate(&self) -> bool {
        // SQLSTATE classes 22 (data exception) and 23 (integrity violation)
        match &self.code {
            Some(code) if code.len() == 5 => code.starts_with("22") || code.starts_with("23"),
            _ => false,
        }
    }
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| message.contains(k))
}

/// Map facts to exactly one kind. First match wins.
pub fn classify_kind(facts: &ErrorFacts) -> ErrorKind {
    let msg = facts.cause.to_lowercase();

    if contains_any(&msg, CONNECTION_KEYWORDS) || facts.code_in(CONNECTION_CODES) {
        ErrorKind::Connection
    } else if contains_any(&msg, AUTH_KEYWORDS)
        || matches!(facts.status, Some(401) | Some(403))
        || facts.code_in(AUTH_CODES)
    {
        ErrorKind::Authentication
    } else if contains_any(&msg, PERMISSION_KEYWORDS)
        || facts.status == Some(403)
        || facts.code_in(PERMISSION_CODES)
    {
        ErrorKind::Permission
    } else if contains_any(&msg, TIMEOUT_KEYWORDS)
        || facts.timed_out
        || facts.code_in(TIMEOUT_CODES)
    {
        ErrorKind::Timeout
    } else if contains_any(&msg, RATE_LIMIT_KEYWORDS)
        || facts.status == Some(429)
        || facts.code_in(RATE_LIMIT_CODES)
    {
        ErrorKind::RateLimit
    } else if contains_any(&msg, STORAGE_KEYWORDS)
        || facts.status == Some(507)
        || facts.code_in(STORAGE_CODES)
    {
        ErrorKind::Storage
    } else if contains_any(&msg, DATA_KEYWORDS) || facts.is_data_sqlstate() {
        ErrorKind::Data
    } else if contains_any(&msg, VALIDATION_KEYWORDS) {
        ErrorKind::Validation
    } else {
        ErrorKind::Unknown
    }
}

/// Normalized view of one failure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub retryable: bool,
    pub operation: String,
    /// Scrubbed error text including the cause chain.
    pub message: String,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub suggested_actions: Vec<String>,
}

impl ClassifiedError {
    /// Classify without recording anything.
    pub fn from_error(err: &anyhow::Error, operation: &str) -> Self {
        Self::from_facts(ErrorFacts::from_error(err), operation)
    }

    pub fn from_facts(facts: ErrorFacts, operation: &str) -> Self {
        let kind = classify_kind(&facts);
        Self {
            kind,
            severity: kind.severity(),
            retryable: kind.is_retryable(),
            operation: operation.to_string(),
            message: scrub_credentials(&facts.message),
            status: facts.status,
            code: facts.code,
            timestamp: Utc::now(),
            suggested_actions: kind.suggested_actions().iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ClassifiedError {
    /// The suggested actions as one line, e.g. `try: a; b`.
    pub fn remediation(&self) -> String {
        format!("try: {}", self.suggested_actions.join("; "))
    }

    /// Display form with the remediation appended, for run summaries and
    /// notification bodies.
    pub fn with_remediation(&self) -> String {
        format!("{} ({})", self, self.remediation())
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}: {}", self.kind, self.severity, self.operation, self.message)
    }
}

/// Classify an error and record it in the run's history.
///
/// Emits one structured log line per call, at a level matching the
/// severity of the resulting kind.
///
/// # Arguments
///
/// * `err` - The failure, with whatever context the caller attached
/// * `operation` - Label of the step that failed, e.g. `upload x.sql.gz`
/// * `history` - The run's bounded error history
///
/// # Returns
///
/// The classified error, also appended to `history`
pub fn classify(err: &anyhow::Error, operation: &str, history: &mut ErrorHistory) -> ClassifiedError {
    let classified = ClassifiedError::from_error(err, operation);
    record(classified.clone(), history);
    classified
}

/// Log and record an error classified elsewhere.
pub fn record(classified: ClassifiedError, history: &mut ErrorHistory) {
    log_classified(&classified);
    history.record(classified);
}

fn log_classified(c: &ClassifiedError) {
    let line = format!(
        "kind={} severity={} retryable={} operation=\"{}\" actions={:?} error=\"{}\"",
        c.kind, c.severity, c.retryable, c.operation, c.suggested_actions, c.message
    );
    match c.severity {
        Severity::Critical | Severity::High => error!(target: "classifier", "{}", line),
        Severity::Medium => warn!(target: "classifier", "{}", line),
        Severity::Low => info!(target: "classifier", "{}", line),
    }
}

/// Whether the surrounding stage may carry on after this failure.
///
/// Critical failures and access failures stop the stage; everything else
/// (a bad table, a flaky read) can be skipped.
pub fn should_continue_operation(classified: &ClassifiedError) -> bool {
    if classified.severity == Severity::Critical {
        return false;
    }
    !matches!(
        classified.kind,
        ErrorKind::Authentication | ErrorKind::Permission
    )
}
