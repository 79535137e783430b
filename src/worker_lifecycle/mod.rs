// Worker Lifecycle Module - state engine for cluster workers
//
// Decides which workers are unresponsive, stalled, landed or retired from the
// rows in the shared store, and applies each decision as one atomic statement.

pub mod types;
pub mod error;
pub mod statement;
pub mod engine;
pub mod driver;


pub use types::{WorkerState, LifecycleOperation};
pub use error::LifecycleError;
pub use engine::{WorkerLifecycle, SqlWorkerLifecycle};
pub use driver::{LifecycleDriver, TickReport};
