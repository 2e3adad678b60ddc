use crate::retry::RetryFailure;

/// Failure reported by a remote collaborator for a single call attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Seconds requested by a `Retry-After` header, if any.
        retry_after: Option<u64>,
    },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The call succeeded but the body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401/403: the credentials are wrong for every call, not just this one.
    pub fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

/// A raw row that could not be turned into a descriptor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("no recognized columns (found: {}; expected one of: {})", .found.join(", "), .expected.join(", "))]
    UnrecognizedColumns {
        found: Vec<String>,
        expected: Vec<String>,
    },
}

/// Input that cannot be read at all. Always run-fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("input is empty")]
    Empty,
    #[error("CSV input has no header row")]
    MissingHeader,
    #[error("invalid CSV: {0}")]
    Csv(String),
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("JSON input must be an object or an array of objects ({0})")]
    NotRows(String),
    #[error("no '{column}' column (found: {})", .found.join(", "))]
    MissingIdColumn { column: String, found: Vec<String> },
    #[error("no non-empty values in '{column}' column")]
    NoIds { column: String },
}

/// Conditions that abort a whole pipeline run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("authentication rejected: {0}")]
    Fatal(RemoteError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("confidence threshold must be between 0 and 1, got {0}")]
    InvalidThreshold(f64),
    #[error("target record count must be positive")]
    InvalidTarget,
    #[error("first page failed after {attempts} attempt(s): {error}")]
    FirstPage { error: RemoteError, attempts: u32 },
    #[error("cancelled before any work was dispatched")]
    Cancelled,
}

impl PipelineError {
    /// Map a terminal retry failure on a required call.
    pub(crate) fn from_first_page(failure: RetryFailure) -> Self {
        if failure.error.is_auth() {
            Self::Fatal(failure.error)
        } else {
            Self::FirstPage {
                error: failure.error,
                attempts: failure.attempts,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses() {
        let e = |status| RemoteError::Status { status, message: String::new(), retry_after: None };
        assert!(e(401).is_auth());
        assert!(e(403).is_auth());
        assert!(!e(404).is_auth());
        assert!(!RemoteError::Timeout("t".into()).is_auth());
    }

    #[test]
    fn unrecognized_columns_message() {
        let err = NormalizeError::UnrecognizedColumns {
            found: vec!["foo".into(), "bar".into()],
            expected: vec!["name".into(), "domain".into()],
        };
        assert_eq!(
            err.to_string(),
            "no recognized columns (found: foo, bar; expected one of: name, domain)"
        );
    }
}
