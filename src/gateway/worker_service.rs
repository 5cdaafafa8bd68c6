use std::net::SocketAddr;

use crate::gateway::server::RequestHandler;
use crate::protocol::Request;
use crate::sandbox::SandboxExecutor;

pub const ADMIN_REJECTED: &str = "Error: admin commands are not accepted by workers\n";

/// Worker role: every job runs in the local sandbox, with no admission
/// control of its own.
pub struct WorkerService {
    executor: SandboxExecutor,
}

impl WorkerService {
    pub fn new(executor: SandboxExecutor) -> Self {
        Self { executor }
    }
}

impl RequestHandler for WorkerService {
    async fn handle(&self, request: Request, peer: SocketAddr) -> String {
        match request {
            Request::Execute(job) => {
                tracing::info!(job_id = %job.id, peer = %peer, language = %job.language, "Executing delegated job");
                let output = self
                    .executor
                    .execute(&job.language, &job.filename, &job.source)
                    .await;
                tracing::info!(job_id = %job.id, elapsed_ms = job.age_ms(), "Job finished");
                output
            }
            Request::Admin(_) => {
                tracing::warn!(peer = %peer, "Admin request sent to a worker");
                ADMIN_REJECTED.to_string()
            }
        }
    }
}
