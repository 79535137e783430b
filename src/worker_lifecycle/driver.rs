// Periodic driver for the lifecycle engine

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, Instrument};

use crate::observability::LifecycleMetrics;
use crate::shutdown::ShutdownSignal;
use crate::telemetry::{create_lifecycle_span, generate_correlation_id};
use crate::worker_lifecycle::engine::WorkerLifecycle;
use crate::worker_lifecycle::error::LifecycleError;
use crate::worker_lifecycle::types::{LifecycleOperation, WorkerState};

/// Outcome of one pass over every lifecycle transition
#[derive(Debug, Default)]
pub struct TickReport {
    pub correlation_id: String,
    pub ephemeral_deleted: Vec<String>,
    pub stalled: Vec<String>,
    pub landed: Vec<String>,
    pub retired: Vec<String>,
    pub worker_states: Option<HashMap<String, WorkerState>>,
    pub errors: Vec<(LifecycleOperation, LifecycleError)>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn affected(&self, operation: LifecycleOperation) -> &[String] {
        match operation {
            LifecycleOperation::DeleteUnresponsiveEphemeralWorkers => &self.ephemeral_deleted,
            LifecycleOperation::StallUnresponsiveWorkers => &self.stalled,
            LifecycleOperation::LandFinishedLandingWorkers => &self.landed,
            LifecycleOperation::DeleteFinishedRetiringWorkers => &self.retired,
            LifecycleOperation::GetWorkerStateByName => &[],
        }
    }
}

/// Invokes every transition on a fixed interval and reports what changed
pub struct LifecycleDriver<L: WorkerLifecycle> {
    lifecycle: L,
    metrics: Arc<LifecycleMetrics>,
}

impl<L: WorkerLifecycle> LifecycleDriver<L> {
    pub fn new(lifecycle: L, metrics: Arc<LifecycleMetrics>) -> Self {
        Self { lifecycle, metrics }
    }

    /// Run each transition once, then refresh the worker state gauge.
    ///
    /// Ephemeral workers are deleted before anything is stalled so an expired
    /// ephemeral worker is removed rather than kept around as stalled. A failing
    /// transition is reported and the remaining ones still run.
    pub async fn tick(&self) -> TickReport {
        let correlation_id = generate_correlation_id();
        let span = create_lifecycle_span("tick", Some(correlation_id.as_str()));

        async {
            self.metrics.record_tick();
            let mut report = TickReport {
                correlation_id: correlation_id.clone(),
                ..TickReport::default()
            };

            let result = self.lifecycle.delete_unresponsive_ephemeral_workers().await;
            report.ephemeral_deleted = self.observe(
                LifecycleOperation::DeleteUnresponsiveEphemeralWorkers,
                result,
                &mut report.errors,
            );

            let result = self.lifecycle.stall_unresponsive_workers().await;
            report.stalled = self.observe(
                LifecycleOperation::StallUnresponsiveWorkers,
                result,
                &mut report.errors,
            );

            let result = self.lifecycle.land_finished_landing_workers().await;
            report.landed = self.observe(
                LifecycleOperation::LandFinishedLandingWorkers,
                result,
                &mut report.errors,
            );

            let result = self.lifecycle.delete_finished_retiring_workers().await;
            report.retired = self.observe(
                LifecycleOperation::DeleteFinishedRetiringWorkers,
                result,
                &mut report.errors,
            );

            match self.lifecycle.worker_state_by_name().await {
                Ok(states) => {
                    self.metrics.record_worker_states(&states);
                    report.worker_states = Some(states);
                }
                Err(e) => {
                    error!(
                        operation = LifecycleOperation::GetWorkerStateByName.as_str(),
                        "Failed to read worker states: {}", e
                    );
                    self.metrics.record_error();
                    report
                        .errors
                        .push((LifecycleOperation::GetWorkerStateByName, e));
                }
            }

            report
        }
        .instrument(span)
        .await
    }

    fn observe(
        &self,
        operation: LifecycleOperation,
        result: Result<Vec<String>, LifecycleError>,
        errors: &mut Vec<(LifecycleOperation, LifecycleError)>,
    ) -> Vec<String> {
        match result {
            Ok(names) => {
                if !names.is_empty() {
                    info!(
                        operation = operation.as_str(),
                        workers = ?names,
                        "{} worker(s) affected by {}",
                        names.len(),
                        operation
                    );
                }
                self.metrics.record_transition(operation, names.len());
                names
            }
            Err(e) => {
                error!(operation = operation.as_str(), "Lifecycle transition failed: {}", e);
                self.metrics.record_error();
                errors.push((operation, e));
                Vec::new()
            }
        }
    }

    /// Tick on `interval` until shutdown is signalled
    pub async fn run(&self, interval: Duration, mut shutdown: ShutdownSignal) {
        info!(interval_seconds = interval.as_secs(), "Worker lifecycle driver started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Worker lifecycle driver stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::ShutdownCoordinator;
    use crate::worker_lifecycle::engine::MockWorkerLifecycle;
    use mockall::Sequence;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn quiet_lifecycle() -> MockWorkerLifecycle {
        let mut lifecycle = MockWorkerLifecycle::new();
        lifecycle
            .expect_delete_unresponsive_ephemeral_workers()
            .returning(|| Ok(Vec::new()));
        lifecycle
            .expect_stall_unresponsive_workers()
            .returning(|| Ok(Vec::new()));
        lifecycle
            .expect_land_finished_landing_workers()
            .returning(|| Ok(Vec::new()));
        lifecycle
            .expect_delete_finished_retiring_workers()
            .returning(|| Ok(Vec::new()));
        lifecycle
            .expect_worker_state_by_name()
            .returning(|| Ok(HashMap::new()));
        lifecycle
    }

    #[tokio::test]
    async fn test_tick_runs_transitions_in_order() {
        let mut lifecycle = MockWorkerLifecycle::new();
        let mut seq = Sequence::new();

        lifecycle
            .expect_delete_unresponsive_ephemeral_workers()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(names(&["ephemeral-1"])));
        lifecycle
            .expect_stall_unresponsive_workers()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(names(&["w1", "w2"])));
        lifecycle
            .expect_land_finished_landing_workers()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(names(&["w3"])));
        lifecycle
            .expect_delete_finished_retiring_workers()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Vec::new()));
        lifecycle
            .expect_worker_state_by_name()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| {
                let mut states = HashMap::new();
                states.insert("w1".to_string(), WorkerState::Stalled);
                states.insert("w2".to_string(), WorkerState::Stalled);
                states.insert("w3".to_string(), WorkerState::Landed);
                Ok(states)
            });

        let metrics = Arc::new(LifecycleMetrics::new());
        let driver = LifecycleDriver::new(lifecycle, metrics.clone());
        let report = driver.tick().await;

        assert!(report.is_clean());
        assert!(!report.correlation_id.is_empty());
        assert_eq!(report.ephemeral_deleted, names(&["ephemeral-1"]));
        assert_eq!(report.stalled, names(&["w1", "w2"]));
        assert_eq!(
            report.affected(LifecycleOperation::LandFinishedLandingWorkers),
            names(&["w3"]).as_slice()
        );
        assert!(report.retired.is_empty());
        assert_eq!(report.worker_states.as_ref().map(|s| s.len()), Some(3));

        let stats = metrics.get_stats();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.ephemeral_workers_deleted, 1);
        assert_eq!(stats.workers_stalled, 2);
        assert_eq!(stats.workers_landed, 1);
        assert_eq!(stats.retiring_workers_deleted, 0);
        assert_eq!(stats.workers_in(WorkerState::Stalled), 2);
        assert_eq!(stats.errors, 0);
    }

    #[tokio::test]
    async fn test_failed_transition_does_not_stop_the_tick() {
        let mut lifecycle = MockWorkerLifecycle::new();
        lifecycle
            .expect_delete_unresponsive_ephemeral_workers()
            .returning(|| Ok(Vec::new()));
        lifecycle
            .expect_stall_unresponsive_workers()
            .returning(|| Err(LifecycleError::Store(sqlx::Error::PoolTimedOut)));
        lifecycle
            .expect_land_finished_landing_workers()
            .times(1)
            .returning(|| Ok(names(&["w9"])));
        lifecycle
            .expect_delete_finished_retiring_workers()
            .times(1)
            .returning(|| Ok(names(&["old-1"])));
        lifecycle
            .expect_worker_state_by_name()
            .returning(|| Ok(HashMap::new()));

        let metrics = Arc::new(LifecycleMetrics::new());
        let driver = LifecycleDriver::new(lifecycle, metrics.clone());
        let report = driver.tick().await;

        assert!(!report.is_clean());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, LifecycleOperation::StallUnresponsiveWorkers);
        assert!(matches!(
            report.errors[0].1,
            LifecycleError::Store(sqlx::Error::PoolTimedOut)
        ));
        assert!(report.stalled.is_empty());
        assert_eq!(report.landed, names(&["w9"]));
        assert_eq!(report.retired, names(&["old-1"]));
        assert_eq!(metrics.get_stats().errors, 1);
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_reported() {
        let mut lifecycle = MockWorkerLifecycle::new();
        lifecycle
            .expect_delete_unresponsive_ephemeral_workers()
            .returning(|| Ok(Vec::new()));
        lifecycle
            .expect_stall_unresponsive_workers()
            .returning(|| Ok(Vec::new()));
        lifecycle
            .expect_land_finished_landing_workers()
            .returning(|| Ok(Vec::new()));
        lifecycle
            .expect_delete_finished_retiring_workers()
            .returning(|| Ok(Vec::new()));
        lifecycle.expect_worker_state_by_name().returning(|| {
            Err(LifecycleError::UnknownWorkerState {
                value: "exploded".to_string(),
            })
        });

        let driver = LifecycleDriver::new(lifecycle, Arc::new(LifecycleMetrics::new()));
        let report = driver.tick().await;

        assert!(report.worker_states.is_none());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].0, LifecycleOperation::GetWorkerStateByName);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_shutdown() {
        let metrics = Arc::new(LifecycleMetrics::new());
        let driver = Arc::new(LifecycleDriver::new(quiet_lifecycle(), metrics.clone()));
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.subscribe();

        let handle = {
            let driver = driver.clone();
            tokio::spawn(async move { driver.run(Duration::from_secs(30), signal).await })
        };

        // Ticks fire at 0s, 30s and 60s.
        tokio::time::sleep(Duration::from_secs(65)).await;
        coordinator.trigger();
        handle.await.unwrap();

        assert_eq!(metrics.get_stats().ticks, 3);
    }
}
