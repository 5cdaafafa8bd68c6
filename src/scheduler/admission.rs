use std::sync::Arc;

use crate::pool::{DelegationClient, WorkerPool};
use crate::sandbox::SandboxExecutor;
use crate::scheduler::context::{SchedulerContext, TaskSlot};
use crate::scheduler::Job;

/// Where a job ended up running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Local,
    Delegated,
    /// Ran locally past the ceiling because no worker was reachable
    Overload,
}

impl std::fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionPath::Local => write!(f, "local"),
            ExecutionPath::Delegated => write!(f, "delegated"),
            ExecutionPath::Overload => write!(f, "overload"),
        }
    }
}

/// Decides, per job, between local execution, delegation and the overload
/// fallback.
///
/// 1. Below the concurrency ceiling the job takes a local slot.
/// 2. At the ceiling the pool is asked to grow, then the job is delegated to
///    the live workers. Delegated jobs do not hold a local slot.
/// 3. With no live worker the job runs locally anyway, past the ceiling.
pub struct AdmissionController {
    context: Arc<SchedulerContext>,
    pool: Arc<WorkerPool>,
    delegation: DelegationClient,
    executor: SandboxExecutor,
}

impl AdmissionController {
    pub fn new(
        context: Arc<SchedulerContext>,
        pool: Arc<WorkerPool>,
        delegation: DelegationClient,
        executor: SandboxExecutor,
    ) -> Self {
        Self {
            context,
            pool,
            delegation,
            executor,
        }
    }

    pub async fn submit(&self, job: Job) -> String {
        self.submit_traced(job).await.0
    }

    /// Like [`submit`](Self::submit), also reporting the path taken.
    pub async fn submit_traced(&self, job: Job) -> (String, ExecutionPath) {
        if let Some(slot) = self.context.try_acquire_slot() {
            return (self.run_local(job, slot).await, ExecutionPath::Local);
        }

        if let Err(e) = self.pool.spawn_worker().await {
            tracing::warn!(job_id = %job.id, error = %e, "Could not grow worker pool");
        }

        let targets = self.context.worker_targets();
        if !targets.is_empty() {
            let report = self.delegation.delegate(&targets, &job).await;
            self.pool.settle_delegation(&report).await;
            tracing::info!(
                job_id = %job.id,
                elapsed_ms = job.age_ms(),
                served = report.served_by.is_some(),
                "Job finished (delegated)"
            );
            return (report.response, ExecutionPath::Delegated);
        }

        tracing::warn!(
            job_id = %job.id,
            running = self.context.running_tasks(),
            "No worker reachable, running locally past the task ceiling"
        );
        let slot = self.context.acquire_overload_slot();
        (self.run_local(job, slot).await, ExecutionPath::Overload)
    }

    async fn run_local(&self, job: Job, slot: TaskSlot) -> String {
        tracing::info!(
            job_id = %job.id,
            language = %job.language,
            overload = slot.is_overload(),
            "Executing job locally"
        );
        let output = self
            .executor
            .execute(&job.language, &job.filename, &job.source)
            .await;
        drop(slot);
        tracing::info!(job_id = %job.id, elapsed_ms = job.age_ms(), "Job finished (local)");
        output
    }
}
