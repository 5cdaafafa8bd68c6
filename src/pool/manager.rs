use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use crate::config::PoolConfig;
use crate::error::{JudgeError, Result};
use crate::pool::delegate::DelegationReport;
use crate::pool::process::WorkerProcess;
use crate::scheduler::context::{SchedulerContext, WorkerRecord};

/// Grows and shrinks the set of live workers.
///
/// The worker list itself lives in the [`SchedulerContext`]; this type only
/// holds it for the brief moments it reserves a port, registers a worker or
/// pops one. Startup grace, health checks and teardown waits all happen
/// outside the lock.
#[derive(Debug)]
pub struct WorkerPool {
    context: Arc<SchedulerContext>,
    config: PoolConfig,
}

impl WorkerPool {
    pub fn new(context: Arc<SchedulerContext>, config: PoolConfig) -> Self {
        Self { context, config }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.context.worker_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Launch, health-check and register one more worker.
    ///
    /// Returns `Ok(None)` without doing anything when the pool is at its
    /// ceiling or every configured port is taken.
    pub async fn spawn_worker(&self) -> Result<Option<SocketAddr>> {
        let Some(port) = self.context.reserve_worker_port(&self.config.ports) else {
            tracing::debug!("Worker pool at capacity, not spawning");
            return Ok(None);
        };

        match self.launch(port).await {
            Ok((addr, process)) => {
                let sequence = self.context.register_worker(addr, process);
                tracing::info!(port, sequence, "Worker registered");
                Ok(Some(addr))
            }
            Err(e) => {
                self.context.release_port(port);
                tracing::warn!(port, error = %e, "Worker failed to start");
                Err(e)
            }
        }
    }

    async fn launch(&self, port: u16) -> Result<(SocketAddr, WorkerProcess)> {
        let addr = self.worker_addr(port)?;
        let mut process = WorkerProcess::start(&self.config.program, port)?;
        tracing::info!(port, pid = ?process.pid(), "Launched worker process");

        if let Err(e) = process
            .await_healthy(
                addr,
                self.config.spawn_grace,
                self.config.health_check_timeout,
            )
            .await
        {
            process.stop(self.config.stop_grace).await;
            return Err(e);
        }
        Ok((addr, process))
    }

    fn worker_addr(&self, port: u16) -> Result<SocketAddr> {
        (self.config.worker_host.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                JudgeError::Io(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("cannot resolve worker host {}", self.config.worker_host),
                ))
            })
    }

    /// Tear down the most recently registered worker. Returns false if the
    /// pool was empty.
    pub async fn kill_one_worker(&self) -> bool {
        let Some(record) = self.context.pop_newest_worker() else {
            return false;
        };
        self.retire(record, "scale-down").await;
        true
    }

    /// Apply a delegation report: reset or count failures, stopping any
    /// worker that crossed the prune threshold.
    pub async fn settle_delegation(&self, report: &DelegationReport) {
        for target in &report.failed {
            if let Some(record) = self.context.record_delegation(
                target.sequence,
                false,
                self.config.prune_after_failures,
            ) {
                self.retire(record, "unreachable").await;
            }
        }
        if let Some(target) = report.served_by {
            self.context.record_delegation(target.sequence, true, 0);
        }
    }

    /// Stop every live worker.
    pub async fn shutdown(&self) {
        for record in self.context.drain_workers() {
            self.retire(record, "shutdown").await;
        }
    }

    async fn retire(&self, mut record: WorkerRecord, reason: &str) {
        record.process.stop(self.config.stop_grace).await;
        tracing::info!(
            port = record.port(),
            sequence = record.sequence,
            reason,
            "Worker terminated"
        );
    }
}
