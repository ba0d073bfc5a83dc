use thiserror::Error;

/// Transport-level failures from the remote table backend.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("request to table backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("table backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed table payload: {0}")]
    Malformed(String),
}

impl TableError {
    /// Whether the retry policy may re-issue the operation. Network-level
    /// failures, 429s and 5xx responses are transient; client errors and
    /// malformed payloads will fail the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            TableError::Transport(_) => true,
            TableError::Status { status, .. } => *status == 429 || *status >= 500,
            TableError::Malformed(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = TableError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(err.is_transient());

        let err = TableError::Status {
            status: 429,
            body: "slow down".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = TableError::Status {
            status: 404,
            body: "no such table".to_string(),
        };
        assert!(!err.is_transient());

        assert!(!TableError::Malformed("not json".to_string()).is_transient());
    }
}
