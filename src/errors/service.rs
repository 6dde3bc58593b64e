use thiserror::Error;

/// Failure reported by an external service, carrying whatever structured
/// facts the adapter could extract.
///
/// Adapters wrap driver/SDK errors into this so the classifier can see an
/// HTTP status or a vendor code instead of guessing from text alone.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
    /// Vendor error code (SQLSTATE, S3 error code, errno name).
    pub code: Option<String>,
    /// HTTP status when the failure came from an HTTP API.
    pub status: Option<u16>,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_message() {
        let err = ServiceError::new("SlowDown: reduce your request rate").with_status(503);
        assert_eq!(err.to_string(), "SlowDown: reduce your request rate");
        assert_eq!(err.status, Some(503));
        assert_eq!(err.code, None);
    }

    #[test]
    fn test_downcast_through_context() {
        let err = anyhow::Error::new(ServiceError::new("denied").with_code("28P01"))
            .context("checking database");
        let inner = err.downcast_ref::<ServiceError>().unwrap();
        assert_eq!(inner.code.as_deref(), Some("28P01"));
    }
}
