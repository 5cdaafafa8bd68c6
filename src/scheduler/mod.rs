pub mod admission;
pub mod context;
pub mod job;
pub mod monitor;

pub use admission::{AdmissionController, ExecutionPath};
pub use context::{SchedulerContext, SchedulerSnapshot, TaskSlot, WorkerTarget};
pub use job::Job;
pub use monitor::{IdleTracker, LoadMonitor};
