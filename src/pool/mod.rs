//! Elastic worker pool.
//!
//! - [`WorkerProcess`]: one worker OS process with an explicit lifecycle
//! - [`WorkerPool`]: spawn-on-demand, LIFO teardown, pruning, shutdown
//! - [`DelegationClient`]: forwards a job to the live workers, oldest first

pub mod delegate;
pub mod manager;
pub mod process;

pub use delegate::{DelegationClient, DelegationReport};
pub use manager::WorkerPool;
pub use process::WorkerProcess;
