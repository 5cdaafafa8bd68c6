use crate::client::exchange;
use crate::config::DelegationConfig;
use crate::error::JudgeError;
use crate::scheduler::context::WorkerTarget;
use crate::scheduler::Job;

/// Result of delegating one job across the live worker list.
#[derive(Debug, Clone)]
pub struct DelegationReport {
    /// Text to return to the client
    pub response: String,
    /// Worker that produced the response, if any
    pub served_by: Option<WorkerTarget>,
    /// Workers that failed, in the order they were tried
    pub failed: Vec<WorkerTarget>,
}

/// Forwards jobs to workers over the delimited protocol.
#[derive(Debug, Clone)]
pub struct DelegationClient {
    config: DelegationConfig,
}

impl DelegationClient {
    pub fn new(config: DelegationConfig) -> Self {
        Self { config }
    }

    /// Try each worker once, in the given order, and return the first full
    /// response. Never fails: if every worker fails the response is a
    /// "no worker available" error text.
    pub async fn delegate(&self, targets: &[WorkerTarget], job: &Job) -> DelegationReport {
        let payload = job.to_wire();
        let mut failed = Vec::new();

        for target in targets {
            match exchange(
                target.addr,
                payload.as_bytes(),
                self.config.connect_timeout,
                self.config.io_timeout,
            )
            .await
            {
                Ok(bytes) => {
                    tracing::info!(job_id = %job.id, worker = %target.addr, "Job delegated");
                    return DelegationReport {
                        response: String::from_utf8_lossy(&bytes).into_owned(),
                        served_by: Some(*target),
                        failed,
                    };
                }
                Err(e) => {
                    tracing::warn!(job_id = %job.id, worker = %target.addr, error = %e, "Delegation attempt failed");
                    failed.push(*target);
                }
            }
        }

        DelegationReport {
            response: JudgeError::NoWorkerAvailable.to_response(),
            served_by: None,
            failed,
        }
    }
}
