//! Bounded retry with incremental backoff around remote table operations.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::errors::WorkflowError;
use crate::store::errors::TableError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Wraps every leaf read/write against the remote table. Transient failures
/// are re-attempted with a delay of `base_delay * attempt`; permanent
/// failures and exhausted budgets surface as `StoreUnavailable`, after which
/// the caller must treat the whole logical operation as not applied.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, WorkflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TableError>>,
    {
        let operation_id = uuid::Uuid::new_v4();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    debug!(%operation_id, operation, attempt, "table operation succeeded");
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    warn!(
                        %operation_id,
                        operation,
                        attempt,
                        error = %err,
                        "table operation failed, retrying"
                    );
                    tokio::time::sleep(self.config.base_delay * attempt).await;
                }
                Err(err) => {
                    error!(
                        %operation_id,
                        operation,
                        attempt,
                        error = %err,
                        "table operation failed terminally"
                    );
                    return Err(WorkflowError::StoreUnavailable {
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
        })
    }

    fn outage() -> TableError {
        TableError::Status {
            status: 503,
            body: "down".to_string(),
        }
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let attempts = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("fetch_all", || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(outage())
                    } else {
                        Ok("grid")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "grid");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_store_unavailable() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(3)
            .run("batch_update", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(outage()) }
            })
            .await;

        match result {
            Err(WorkflowError::StoreUnavailable { attempts: n, .. }) => assert_eq!(n, 3),
            other => panic!("expected StoreUnavailable, got {other:?}"),
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_without_retry() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(3)
            .run("append_row", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(TableError::Status {
                        status: 404,
                        body: "no such table".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(WorkflowError::StoreUnavailable { attempts: 1, .. })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
