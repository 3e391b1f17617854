//! Daemon components.
//!
//! - [`scheduler::SchedulerComponent`]: periodic and forced imports
//! - [`status::StatusComponent`]: remembers the outcome of the last sync

pub mod scheduler;
pub mod status;

pub use scheduler::SchedulerComponent;
pub use status::StatusComponent;
