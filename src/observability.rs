use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

use crate::worker_lifecycle::{LifecycleOperation, WorkerState};

/// Lifecycle transition counters
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
    pub ticks: AtomicU64,
    pub ephemeral_workers_deleted: AtomicU64,
    pub workers_stalled: AtomicU64,
    pub workers_landed: AtomicU64,
    pub retiring_workers_deleted: AtomicU64,
    pub errors: AtomicU64,
    workers_by_state: Mutex<BTreeMap<WorkerState, u64>>,
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self, operation: LifecycleOperation, affected: usize) {
        let counter = match operation {
            LifecycleOperation::DeleteUnresponsiveEphemeralWorkers => {
                &self.ephemeral_workers_deleted
            }
            LifecycleOperation::StallUnresponsiveWorkers => &self.workers_stalled,
            LifecycleOperation::LandFinishedLandingWorkers => &self.workers_landed,
            LifecycleOperation::DeleteFinishedRetiringWorkers => &self.retiring_workers_deleted,
            LifecycleOperation::GetWorkerStateByName => return,
        };
        counter.fetch_add(affected as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Replace the per-state gauge with counts from a fresh snapshot
    pub fn record_worker_states(&self, states: &HashMap<String, WorkerState>) {
        let mut counts: BTreeMap<WorkerState, u64> =
            WorkerState::ALL.iter().map(|state| (*state, 0)).collect();
        for state in states.values() {
            *counts.entry(*state).or_default() += 1;
        }

        // A poisoned gauge only holds stale counts, so keep going with it.
        let mut guard = match self.workers_by_state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = counts;
    }

    pub fn get_stats(&self) -> LifecycleStats {
        let workers_by_state = match self.workers_by_state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        LifecycleStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            ephemeral_workers_deleted: self.ephemeral_workers_deleted.load(Ordering::Relaxed),
            workers_stalled: self.workers_stalled.load(Ordering::Relaxed),
            workers_landed: self.workers_landed.load(Ordering::Relaxed),
            retiring_workers_deleted: self.retiring_workers_deleted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            workers_by_state,
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Worker lifecycle metrics: ticks={}, ephemeral_deleted={}, stalled={}, landed={}, retired={}, errors={}",
            stats.ticks,
            stats.ephemeral_workers_deleted,
            stats.workers_stalled,
            stats.workers_landed,
            stats.retiring_workers_deleted,
            stats.errors
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleStats {
    pub ticks: u64,
    pub ephemeral_workers_deleted: u64,
    pub workers_stalled: u64,
    pub workers_landed: u64,
    pub retiring_workers_deleted: u64,
    pub errors: u64,
    pub workers_by_state: BTreeMap<WorkerState, u64>,
}

impl LifecycleStats {
    pub fn workers_in(&self, state: WorkerState) -> u64 {
        self.workers_by_state.get(&state).copied().unwrap_or(0)
    }
}
