//! Process orchestration: background estimator thread and cooperative shutdown.

mod estimator_system;
pub mod shutdown;

pub use estimator_system::EstimatorSystem;
pub use shutdown::{shutdown_channel, ShutdownHandle, ShutdownSignal};
