//! Sandboxed execution engine shared by the master and every worker.
//!
//! - [`language`]: language resolution, file name sanitizing, build/run steps
//! - [`workspace`]: per-job directory that is always removed
//! - [`limits`]: POSIX resource ceilings installed before exec
//! - [`executor`]: the compile/run pipeline with timeouts

pub mod executor;
pub mod language;
pub mod limits;
pub mod workspace;

pub use executor::{Outcome, SandboxExecutor, Stage};
pub use language::{safe_filename, Language};
pub use workspace::JobDirectory;
