//! Named retry profiles, one per external dependency class.
//!
//! The database, the object store and the mail transport fail in different
//! ways, so each gets its own attempt budget, delay bounds and
//! retryability predicate.

use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DATABASE_BASE_DELAY_MS, DATABASE_MAX_ATTEMPTS, DATABASE_MAX_DELAY_MS,
    NOTIFICATION_BASE_DELAY_MS, NOTIFICATION_MAX_ATTEMPTS, NOTIFICATION_MAX_DELAY_MS,
    RETRYABLE_HTTP_STATUSES, STORAGE_BASE_DELAY_MS, STORAGE_MAX_ATTEMPTS, STORAGE_MAX_DELAY_MS,
};
use crate::errors::{ErrorFacts, ServiceError};
use crate::retry::{is_timeout, RetryConfig};

const DATABASE_TRANSIENT_KEYWORDS: &[&str] = &[
    "connection", "timeout", "timed out", "network", "econnreset", "econnrefused",
    "etimedout", "rate limit", "too many connections", "too many requests",
    "server closed the connection", "terminating connection",
];

const STORAGE_TRANSIENT_KEYWORDS: &[&str] = &[
    "rate limit", "ratelimitexceeded", "userratelimitexceeded", "quota", "backenderror",
    "backend error", "internalerror", "internal error", "service unavailable", "slowdown",
    "slow down", "timeout", "timed out", "connection reset", "connection refused",
    "connection closed", "network error", "error trying to connect", "dns error",
    "broken pipe",
];

const NOTIFICATION_TRANSIENT_KEYWORDS: &[&str] = &[
    "timeout", "timed out", "connection", "network", "econnreset", "econnrefused",
    "etimedout", "rate limit", "too many", "temporarily", "try again", "unavailable",
];

/// Messages that mean the mail transport rejected our credentials.
const NOTIFICATION_AUTH_KEYWORDS: &[&str] = &[
    "auth", "invalid login", "credentials", "unauthorized", "forbidden", "535",
];

/// Same text the classifier matches, so a verdict here agrees with the
/// `retryable` flag recorded for the error.
fn message_of(err: &anyhow::Error) -> String {
    ErrorFacts::from_error(err).cause.to_lowercase()
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| message.contains(k))
}

fn http_status(err: &anyhow::Error) -> Option<u16> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ServiceError>())
        .and_then(|s| s.status)
}

pub fn database_retryable(err: &anyhow::Error) -> bool {
    is_timeout(err) || contains_any(&message_of(err), DATABASE_TRANSIENT_KEYWORDS)
}

pub fn object_store_retryable(err: &anyhow::Error) -> bool {
    if let Some(status) = http_status(err) {
        if RETRYABLE_HTTP_STATUSES.contains(&status) {
            return true;
        }
    }
    is_timeout(err) || contains_any(&message_of(err), STORAGE_TRANSIENT_KEYWORDS)
}

/// Auth failures never retry: they burn the budget and cannot succeed.
pub fn notification_retryable(err: &anyhow::Error) -> bool {
    let message = message_of(err);
    if contains_any(&message, NOTIFICATION_AUTH_KEYWORDS) {
        return false;
    }
    is_timeout(err) || contains_any(&message, NOTIFICATION_TRANSIENT_KEYWORDS)
}

impl RetryConfig {
    /// 3 attempts, 2s base, 15s cap.
    pub fn database() -> Self {
        RetryConfig::new(
            DATABASE_MAX_ATTEMPTS,
            Duration::from_millis(DATABASE_BASE_DELAY_MS),
            Duration::from_millis(DATABASE_MAX_DELAY_MS),
            Arc::new(database_retryable),
        )
    }

    /// 4 attempts, 1s base, 20s cap.
    pub fn object_store() -> Self {
        RetryConfig::new(
            STORAGE_MAX_ATTEMPTS,
            Duration::from_millis(STORAGE_BASE_DELAY_MS),
            Duration::from_millis(STORAGE_MAX_DELAY_MS),
            Arc::new(object_store_retryable),
        )
    }

    /// 3 attempts, 3s base, 10s cap.
    pub fn notification() -> Self {
        RetryConfig::new(
            NOTIFICATION_MAX_ATTEMPTS,
            Duration::from_millis(NOTIFICATION_BASE_DELAY_MS),
            Duration::from_millis(NOTIFICATION_MAX_DELAY_MS),
            Arc::new(notification_retryable),
        )
    }
}

/// The three profiles a run uses, built once up front.
#[derive(Debug, Clone)]
pub struct RetryProfiles {
    pub database: RetryConfig,
    pub object_store: RetryConfig,
    pub notification: RetryConfig,
}

impl Default for RetryProfiles {
    fn default() -> Self {
        Self {
            database: RetryConfig::database(),
            object_store: RetryConfig::object_store(),
            notification: RetryConfig::notification(),
        }
    }
}

impl RetryProfiles {
    /// Standard profiles with configured attempt counts.
    pub fn with_attempts(database: u32, object_store: u32, notification: u32) -> Self {
        Self {
            database: RetryConfig::database().with_max_attempts(database),
            object_store: RetryConfig::object_store().with_max_attempts(object_store),
            notification: RetryConfig::notification().with_max_attempts(notification),
        }
    }

    /// Same predicates and attempt counts, no sleeping.
    pub fn immediate() -> Self {
        Self::default().without_delays()
    }

    pub fn without_delays(self) -> Self {
        Self {
            database: self.database.with_delays(Duration::ZERO, Duration::ZERO),
            object_store: self.object_store.with_delays(Duration::ZERO, Duration::ZERO),
            notification: self.notification.with_delays(Duration::ZERO, Duration::ZERO),
        }
    }
}
