// Core types for the worker lifecycle engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::worker_lifecycle::error::LifecycleError;

/// Worker states as persisted in the `workers.state` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Worker is registered and heartbeating
    Running,
    /// Worker missed its heartbeat deadline and is kept for inspection
    Stalled,
    /// Worker is draining; it lands once nothing in-flight depends on it
    Landing,
    /// Drain complete; the row stays with its endpoints cleared
    Landed,
    /// Worker is being decommissioned; it is deleted once nothing depends on it
    Retiring,
    /// Worker is fully decommissioned
    Retired,
}

impl WorkerState {
    pub const ALL: [WorkerState; 6] = [
        WorkerState::Running,
        WorkerState::Stalled,
        WorkerState::Landing,
        WorkerState::Landed,
        WorkerState::Retiring,
        WorkerState::Retired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Running => "running",
            WorkerState::Stalled => "stalled",
            WorkerState::Landing => "landing",
            WorkerState::Landed => "landed",
            WorkerState::Retiring => "retiring",
            WorkerState::Retired => "retired",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerState {
    type Err = LifecycleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        WorkerState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == value)
            .ok_or_else(|| LifecycleError::UnknownWorkerState {
                value: value.to_string(),
            })
    }
}

/// Transitions the engine applies, used to label spans, logs and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOperation {
    DeleteUnresponsiveEphemeralWorkers,
    StallUnresponsiveWorkers,
    LandFinishedLandingWorkers,
    DeleteFinishedRetiringWorkers,
    GetWorkerStateByName,
}

impl LifecycleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOperation::DeleteUnresponsiveEphemeralWorkers => {
                "delete_unresponsive_ephemeral_workers"
            }
            LifecycleOperation::StallUnresponsiveWorkers => "stall_unresponsive_workers",
            LifecycleOperation::LandFinishedLandingWorkers => "land_finished_landing_workers",
            LifecycleOperation::DeleteFinishedRetiringWorkers => {
                "delete_finished_retiring_workers"
            }
            LifecycleOperation::GetWorkerStateByName => "worker_state_by_name",
        }
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
