use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::admin::AdminConsole;
use crate::config::{MasterConfig, ReadLimits, WorkerConfig};
use crate::error::Result;
use crate::gateway::{JudgeServer, MasterService, WorkerService};
use crate::pool::{DelegationClient, WorkerPool};
use crate::sandbox::SandboxExecutor;
use crate::scheduler::{AdmissionController, LoadMonitor, SchedulerContext};

/// A bound master: listener, scheduler state and worker pool.
pub struct MasterNode {
    config: MasterConfig,
    server: JudgeServer,
    context: Arc<SchedulerContext>,
    pool: Arc<WorkerPool>,
    service: Arc<MasterService>,
}

impl MasterNode {
    /// Bind the listener and wire up every master component.
    ///
    /// # Errors
    ///
    /// Fails if the listen address cannot be bound. Nothing has been spawned
    /// at that point.
    pub async fn bind(config: MasterConfig) -> Result<Self> {
        let server = JudgeServer::bind(config.listen_addr).await?;

        let context = SchedulerContext::new(config.runtime.clone());
        let pool = Arc::new(WorkerPool::new(context.clone(), config.pool.clone()));
        let admission = Arc::new(AdmissionController::new(
            context.clone(),
            pool.clone(),
            DelegationClient::new(config.delegation.clone()),
            SandboxExecutor::new(config.sandbox.clone()),
        ));
        let service = Arc::new(MasterService::new(
            admission,
            AdminConsole::new(context.clone()),
        ));

        Ok(Self {
            config,
            server,
            context,
            pool,
            service,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn context(&self) -> Arc<SchedulerContext> {
        self.context.clone()
    }

    pub fn pool(&self) -> Arc<WorkerPool> {
        self.pool.clone()
    }

    /// Serve until `shutdown` is cancelled, then stop every worker.
    ///
    /// The load monitor runs as a spawned task tied to the same token.
    pub async fn run(self, shutdown: CancellationToken) {
        let snapshot = self.context.snapshot();
        tracing::info!(
            addr = %self.server.local_addr(),
            max_tasks = snapshot.max_tasks,
            max_workers = snapshot.max_workers,
            worker_ports = ?self.config.pool.ports,
            remote_admin = !self.context.admin_secret().is_empty(),
            "Starting master"
        );

        let monitor = LoadMonitor::new(self.context.clone(), self.pool.clone(), &self.config.monitor);
        let monitor_token = shutdown.clone();
        let monitor_handle = tokio::spawn(async move {
            monitor.run(monitor_token).await;
        });

        self.server
            .serve(self.service, self.config.read_limits, shutdown)
            .await;

        let _ = monitor_handle.await;
        tracing::info!(workers = self.pool.len(), "Stopping worker pool");
        self.pool.shutdown().await;
        tracing::info!("Master stopped");
    }
}

/// A bound worker: listener plus its own sandbox executor.
pub struct WorkerNode {
    server: JudgeServer,
    service: Arc<WorkerService>,
    read_limits: ReadLimits,
}

impl WorkerNode {
    pub async fn bind(config: WorkerConfig) -> Result<Self> {
        let server = JudgeServer::bind(config.listen_addr).await?;
        Ok(Self {
            server,
            service: Arc::new(WorkerService::new(SandboxExecutor::new(config.sandbox))),
            read_limits: config.read_limits,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(addr = %self.server.local_addr(), "Starting worker");
        self.server
            .serve(self.service, self.read_limits, shutdown)
            .await;
        tracing::info!("Worker stopped");
    }
}
