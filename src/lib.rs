// Worker Lifecycle Library - cluster worker state engine
// This exposes the core components for testing and integration

pub mod worker_lifecycle;
pub mod database;
pub mod config;
pub mod telemetry;
pub mod observability;
pub mod shutdown;

// Re-export key types for easy access
pub use worker_lifecycle::{
    LifecycleDriver,
    LifecycleError,
    LifecycleOperation,
    SqlWorkerLifecycle,
    TickReport,
    WorkerLifecycle,
    WorkerState,
};
pub use database::Database;
pub use config::{LifecycleConfig, DatabaseConfig, DriverConfig, ObservabilityConfig};
pub use telemetry::{init_telemetry, shutdown_telemetry, generate_correlation_id, create_lifecycle_span};
pub use observability::{LifecycleMetrics, LifecycleStats};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
