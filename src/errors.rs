use thiserror::Error;

use crate::store::errors::TableError;
use crate::workflow::state::{CaseStatus, Stage};

/// Error taxonomy for case submissions and store access.
///
/// Everything except `StoreUnavailable` is local and non-retryable: it is
/// raised before any write reaches the remote table, so the caller can report
/// it and retry the whole submission without cleanup. `StoreUnavailable` is
/// only produced once the retry policy has been exhausted, at which point the
/// operation must be treated as not applied.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no case found for '{name}' on {date}")]
    NotFound { name: String, date: String },

    #[error("natural key ('{name}', {date}) matches {count} rows")]
    AmbiguousKey {
        name: String,
        date: String,
        count: usize,
    },

    #[error("a case for '{name}' on {date} already exists")]
    DuplicateKey { name: String, date: String },

    #[error("case is {actual}, expected {expected} for this stage")]
    InvalidState {
        expected: CaseStatus,
        actual: CaseStatus,
    },

    #[error("'{actor}' is not authorized to act at the {stage} stage")]
    Unauthorized { actor: String, stage: Stage },

    #[error("table store unavailable after {attempts} attempt(s): {source}")]
    StoreUnavailable {
        attempts: u32,
        #[source]
        source: TableError,
    },
}
