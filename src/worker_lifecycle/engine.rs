// Worker lifecycle engine backed by the shared SQL store

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, Instrument};

use crate::worker_lifecycle::error::LifecycleError;
use crate::worker_lifecycle::statement::{self, Statement};
use crate::worker_lifecycle::types::{LifecycleOperation, WorkerState};

#[cfg(test)]
use mockall::automock;

/// Worker lifecycle transitions
///
/// Every operation re-derives its decision from the store and applies it in a
/// single statement, so concurrent callers never both act on the same worker
/// and a repeated call with unchanged data affects nothing.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkerLifecycle: Send + Sync {
    /// Delete ephemeral workers whose lease has expired
    async fn delete_unresponsive_ephemeral_workers(&self) -> Result<Vec<String>, LifecycleError>;

    /// Move running workers whose lease has expired to stalled, clearing `expires`
    ///
    /// Callers must run `delete_unresponsive_ephemeral_workers` first. Stalling
    /// clears `expires`, so an expired ephemeral worker stalled here is never
    /// matched by the ephemeral delete afterwards.
    async fn stall_unresponsive_workers(&self) -> Result<Vec<String>, LifecycleError>;

    /// Land draining workers that no longer back non-interruptible in-flight builds
    async fn land_finished_landing_workers(&self) -> Result<Vec<String>, LifecycleError>;

    /// Delete retiring workers that no longer back non-interruptible in-flight builds
    async fn delete_finished_retiring_workers(&self) -> Result<Vec<String>, LifecycleError>;

    /// Snapshot of every worker's current state
    async fn worker_state_by_name(&self) -> Result<HashMap<String, WorkerState>, LifecycleError>;
}

/// SQL implementation over an explicit pool handle
#[derive(Debug, Clone)]
pub struct SqlWorkerLifecycle {
    pool: SqlitePool,
}

impl SqlWorkerLifecycle {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn affected_workers(
        &self,
        operation: LifecycleOperation,
        statement: Statement,
    ) -> Result<Vec<String>, LifecycleError> {
        let span = tracing::info_span!("worker_lifecycle", operation = operation.as_str());

        async {
            let names = statement.fetch_names(&self.pool).await?;
            debug!(affected = names.len(), "Lifecycle transition applied");
            Ok::<_, LifecycleError>(names)
        }
        .instrument(span)
        .await
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl WorkerLifecycle for SqlWorkerLifecycle {
    async fn delete_unresponsive_ephemeral_workers(&self) -> Result<Vec<String>, LifecycleError> {
        self.affected_workers(
            LifecycleOperation::DeleteUnresponsiveEphemeralWorkers,
            statement::delete_unresponsive_ephemeral_workers(now_ms()),
        )
        .await
    }

    async fn stall_unresponsive_workers(&self) -> Result<Vec<String>, LifecycleError> {
        self.affected_workers(
            LifecycleOperation::StallUnresponsiveWorkers,
            statement::stall_unresponsive_workers(now_ms()),
        )
        .await
    }

    async fn land_finished_landing_workers(&self) -> Result<Vec<String>, LifecycleError> {
        self.affected_workers(
            LifecycleOperation::LandFinishedLandingWorkers,
            statement::land_finished_landing_workers(),
        )
        .await
    }

    async fn delete_finished_retiring_workers(&self) -> Result<Vec<String>, LifecycleError> {
        self.affected_workers(
            LifecycleOperation::DeleteFinishedRetiringWorkers,
            statement::delete_finished_retiring_workers(),
        )
        .await
    }

    async fn worker_state_by_name(&self) -> Result<HashMap<String, WorkerState>, LifecycleError> {
        let span = tracing::info_span!(
            "worker_lifecycle",
            operation = LifecycleOperation::GetWorkerStateByName.as_str()
        );

        async {
            let rows = statement::worker_states().fetch_all(&self.pool).await?;

            let mut states = HashMap::with_capacity(rows.len());
            for row in rows {
                let name: String = row.try_get("name").map_err(LifecycleError::row_scan)?;
                let state: String = row.try_get("state").map_err(LifecycleError::row_scan)?;
                states.insert(name, state.parse::<WorkerState>()?);
            }

            debug!(workers = states.len(), "Worker state snapshot read");
            Ok::<_, LifecycleError>(states)
        }
        .instrument(span)
        .await
    }
}
