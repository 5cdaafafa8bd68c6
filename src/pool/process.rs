use std::net::SocketAddr;
use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::config::WorkerProgram;
use crate::error::{JudgeError, Result};

/// Handle to one worker OS process.
///
/// Lifecycle: [`start`](Self::start) → [`await_healthy`](Self::await_healthy)
/// → serve → [`stop`](Self::stop). `stop` is idempotent, and dropping the
/// handle kills the process, so no worker outlives its handle.
#[derive(Debug)]
pub struct WorkerProcess {
    port: u16,
    child: Child,
    stopped: bool,
}

impl WorkerProcess {
    /// Launch `program` with `--port <port>` appended.
    pub fn start(program: &WorkerProgram, port: u16) -> Result<Self> {
        let child = Command::new(&program.program)
            .args(&program.args)
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| JudgeError::Spawn {
                program: program.program.display().to_string(),
                source,
            })?;

        tracing::debug!(port, pid = ?child.id(), "Worker process launched");
        Ok(Self {
            port,
            child,
            stopped: false,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait `grace`, then confirm the process is alive and accepting on `addr`.
    pub async fn await_healthy(
        &mut self,
        addr: SocketAddr,
        grace: Duration,
        connect_timeout: Duration,
    ) -> Result<()> {
        tokio::time::sleep(grace).await;

        if let Some(status) = self.child.try_wait()? {
            tracing::warn!(port = self.port, status = %status, "Worker exited during startup");
            return Err(JudgeError::Unhealthy(self.port));
        }

        match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => {
                tracing::warn!(port = self.port, error = %e, "Worker health check failed");
                Err(JudgeError::Unhealthy(self.port))
            }
            Err(_) => {
                tracing::warn!(port = self.port, "Worker health check timed out");
                Err(JudgeError::Unhealthy(self.port))
            }
        }
    }

    /// Send a graceful terminate signal, wait up to `grace`, then force-kill.
    pub async fn stop(&mut self, grace: Duration) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }

        self.terminate();

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(_) => {
                tracing::debug!(port = self.port, "Worker exited after terminate signal");
            }
            Err(_) => {
                tracing::warn!(port = self.port, "Worker ignored terminate signal, killing");
                if let Err(e) = self.child.kill().await {
                    tracing::error!(port = self.port, error = %e, "Failed to kill worker");
                }
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    #[cfg(unix)]
    fn terminate(&mut self) {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.child.id() {
            if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::warn!(port = self.port, pid, error = %e, "Failed to signal worker");
            }
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::warn!(port = self.port, error = %e, "Failed to signal worker");
        }
    }
}
