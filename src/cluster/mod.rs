//! Clustered worker fan-out: many dispatcher instances behind one logical
//! transport connection.

pub mod coordinator;
pub mod protocol;
pub mod worker;

pub use coordinator::{ClusterCoordinator, Transport};
pub use protocol::{WorkerInbound, WorkerOutbound};
pub use worker::{WorkerHandle, spawn_worker};
