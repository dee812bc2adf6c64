pub mod hub_maintenance;
pub mod scheduler;

pub use scheduler::{Scheduler, ShutdownMode};
