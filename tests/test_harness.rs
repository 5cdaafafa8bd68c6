//! Shared helpers for the integration tests.
//!
//! Masters and workers run in-process on ephemeral ports; pool tests launch
//! the real `code-judge worker` binary that cargo builds for integration
//! tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use code_judge::config::{
    MasterConfig, MonitorConfig, PoolConfig, ReadLimits, SandboxConfig, WorkerConfig,
    WorkerProgram,
};
use code_judge::node::{MasterNode, WorkerNode};
use code_judge::pool::WorkerPool;
use code_judge::scheduler::SchedulerContext;

/// True when `program` can be launched on this machine.
pub fn has_tool(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok()
}

/// Print a skip notice and return true when `program` is missing.
pub fn skip_without(program: &str) -> bool {
    if has_tool(program) {
        return false;
    }
    eprintln!("skipping: {} not installed", program);
    true
}

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    free_ports(1)[0]
}

/// `n` distinct ports that were free a moment ago.
pub fn free_ports(n: usize) -> Vec<u16> {
    let listeners: Vec<_> = (0..n)
        .map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();
    listeners
        .iter()
        .map(|l| l.local_addr().unwrap().port())
        .collect()
}

/// Sandbox rooted in a test-owned directory, with short timeouts.
pub fn test_sandbox(root: &Path) -> SandboxConfig {
    SandboxConfig::default()
        .with_temp_root(root)
        .with_run_timeout(Duration::from_secs(2))
}

/// Number of job directories left under `root`.
pub fn leftover_job_dirs(root: &Path) -> usize {
    match std::fs::read_dir(root) {
        Ok(entries) => entries.filter_map(Result::ok).count(),
        Err(_) => 0,
    }
}

/// The worker binary built alongside these tests.
pub fn worker_program(temp_root: &Path) -> WorkerProgram {
    WorkerProgram::new(env!("CARGO_BIN_EXE_code-judge"))
        .arg("worker")
        .arg("--temp-root")
        .arg(temp_root)
}

/// Master config bound to an ephemeral loopback port, with fast pool timings.
pub fn test_master_config(temp_root: &Path, worker_ports: Vec<u16>) -> MasterConfig {
    let mut config = MasterConfig::new("127.0.0.1:0".parse().unwrap());
    config.sandbox = test_sandbox(temp_root);
    config.pool = PoolConfig {
        ports: worker_ports,
        program: worker_program(temp_root),
        spawn_grace: Duration::from_secs(1),
        stop_grace: Duration::from_millis(500),
        health_check_timeout: Duration::from_millis(500),
        ..PoolConfig::default()
    };
    config.monitor = MonitorConfig {
        tick: Duration::from_millis(100),
        idle_threshold: 0,
        idle_grace: Duration::from_secs(3600),
    };
    config.read_limits = ReadLimits {
        quiet_period: Duration::from_millis(100),
        ..ReadLimits::default()
    };
    config
}

/// Handle to a master running on the test runtime.
pub struct TestMaster {
    pub addr: SocketAddr,
    pub context: Arc<SchedulerContext>,
    pub pool: Arc<WorkerPool>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestMaster {
    pub async fn start(config: MasterConfig) -> Self {
        let node = MasterNode::bind(config).await.unwrap();
        let addr = node.local_addr();
        let context = node.context();
        let pool = node.pool();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(node.run(shutdown.clone()));
        Self {
            addr,
            context,
            pool,
            shutdown,
            handle,
        }
    }

    /// Cancel and wait for the master to stop its workers.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(10), self.handle).await;
    }
}

/// Handle to an in-process worker.
pub struct TestWorker {
    pub addr: SocketAddr,
    shutdown: CancellationToken,
}

impl TestWorker {
    pub async fn start(temp_root: &Path) -> Self {
        let mut config = WorkerConfig::new("127.0.0.1:0".parse().unwrap());
        config.sandbox = test_sandbox(temp_root);
        let node = WorkerNode::bind(config).await.unwrap();
        let addr = node.local_addr();
        let shutdown = CancellationToken::new();
        tokio::spawn(node.run(shutdown.clone()));
        Self { addr, shutdown }
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TestWorker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
