//! TCP front door shared by both roles.
//!
//! [`JudgeServer`] owns the accept loop and framing; a [`RequestHandler`]
//! decides what a parsed request means for the master or a worker.

pub mod master_service;
pub mod server;
pub mod worker_service;

pub use master_service::MasterService;
pub use server::{JudgeServer, RequestHandler};
pub use worker_service::WorkerService;
