//! Error taxonomy for remote access and the orchestrated operations.
//!
//! [`ConnectorError`] classifies what went wrong at the I/O boundary;
//! [`ActivityError`] wraps it with the operation and step that failed.
//! Nothing here is retried or treated as fatal: the caller decides.

use thiserror::Error;

/// Failure of a single remote fetch or store call.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Connection, TLS, or timeout failure reaching the Confluence API.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("confluence API error: status={status} body={body}")]
    RemoteApi { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The batch store rejected the batch. Nothing from it was stored.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),

    /// The caller's cancellation or deadline fired while a call was outstanding.
    #[error("operation cancelled")]
    Cancelled,
}

impl ConnectorError {
    /// HTTP status for [`ConnectorError::RemoteApi`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            ConnectorError::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Step of an operation at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Store,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Fetch => "fetch",
            Step::Store => "store",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A [`ConnectorError`] annotated with the failing operation and step.
#[derive(Debug, Error)]
#[error("{operation}: {step}: {source}")]
pub struct ActivityError {
    pub operation: &'static str,
    pub step: Step,
    pub source: ConnectorError,
}

impl ActivityError {
    pub fn new(operation: &'static str, step: Step, source: ConnectorError) -> Self {
        Self {
            operation,
            step,
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, ConnectorError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_error_message_names_operation_and_step() {
        let err = ActivityError::new(
            "fetch-pages",
            Step::Fetch,
            ConnectorError::RemoteApi {
                status: 404,
                body: "{\"message\":\"No space\"}".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "fetch-pages: fetch: confluence API error: status=404 body={\"message\":\"No space\"}"
        );
        assert_eq!(err.source.status(), Some(404));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_flag() {
        let err = ActivityError::new("search-by-query", Step::Store, ConnectorError::Cancelled);
        assert!(err.is_cancelled());
        assert_eq!(err.source.status(), None);
    }
}
