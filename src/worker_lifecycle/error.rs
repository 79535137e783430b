use thiserror::Error;

/// Errors surfaced by lifecycle operations
///
/// Store failures are passed through untouched; callers decide whether and
/// when to retry, which is safe because every operation is idempotent.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Malformed lifecycle statement: {reason}")]
    QueryBuild { reason: String },

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Failed to decode worker row: {source}")]
    RowScan {
        #[source]
        source: sqlx::Error,
    },

    #[error("Unknown worker state '{value}'")]
    UnknownWorkerState { value: String },
}

impl LifecycleError {
    pub(crate) fn row_scan(source: sqlx::Error) -> Self {
        LifecycleError::RowScan { source }
    }
}
