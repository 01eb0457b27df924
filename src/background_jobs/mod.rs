//! Background job scheduling and execution.
//!
//! Periodic housekeeping that runs independently of request activity, such as
//! sweeping stale artifacts out of the downloads directory.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError, JobSchedule};
pub use scheduler::JobScheduler;
