use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the shared admin token.
pub const ADMIN_SECRET_ENV: &str = "JUDGE_ADMIN_SECRET";

/// OS resource ceilings applied to a child before it execs the target program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// CPU time in seconds (RLIMIT_CPU)
    pub cpu_seconds: Option<u64>,
    /// Virtual address space in bytes (RLIMIT_AS)
    pub address_space_bytes: Option<u64>,
    /// Largest file the program may write, in bytes (RLIMIT_FSIZE)
    pub file_size_bytes: Option<u64>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_seconds: Some(5),
            address_space_bytes: Some(512 * 1024 * 1024),
            file_size_bytes: Some(16 * 1024 * 1024),
        }
    }
}

/// Binaries used by the per-language build/run pipelines.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub python: String,
    pub cc: String,
    pub cxx: String,
    pub javac: String,
    pub java: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            cc: "gcc".to_string(),
            cxx: "g++".to_string(),
            javac: "javac".to_string(),
            java: "java".to_string(),
        }
    }
}

/// Configuration for the sandboxed executor shared by master and workers.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Directory under which per-job directories are created
    pub temp_root: PathBuf,
    /// Wall-clock bound on the run step
    pub run_timeout: Duration,
    /// Wall-clock bound on the compile step
    pub compile_timeout: Duration,
    pub limits: ResourceLimits,
    pub toolchain: Toolchain,
    /// Rendered stdout/stderr blocks are truncated past this size
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir().join("code-judge"),
            run_timeout: Duration::from_secs(5),
            compile_timeout: Duration::from_secs(10),
            limits: ResourceLimits::default(),
            toolchain: Toolchain::default(),
            max_output_bytes: 1024 * 1024,
        }
    }
}

impl SandboxConfig {
    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }
}

/// The program launched for each worker. The port is appended as `--port <n>`.
#[derive(Debug, Clone)]
pub struct WorkerProgram {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl WorkerProgram {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The running binary's own `worker` subcommand.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg("worker"))
    }
}

/// Worker pool sizing and lifecycle timings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Host workers bind to and are contacted on
    pub worker_host: String,
    /// Ports available to workers, tried lowest first
    pub ports: Vec<u16>,
    pub program: WorkerProgram,
    /// Wait between launching a worker and health-checking it
    pub spawn_grace: Duration,
    /// Wait between the graceful terminate signal and a forced kill
    pub stop_grace: Duration,
    pub health_check_timeout: Duration,
    /// Consecutive failed delegations after which a worker is pruned
    pub prune_after_failures: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_host: "127.0.0.1".to_string(),
            ports: (6001..=6006).collect(),
            program: WorkerProgram::new("code-judge").arg("worker"),
            spawn_grace: Duration::from_secs(1),
            stop_grace: Duration::from_secs(1),
            health_check_timeout: Duration::from_secs(1),
            prune_after_failures: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DelegationConfig {
    pub connect_timeout: Duration,
    /// Bound on the whole write/read exchange with one worker
    pub io_timeout: Duration,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub tick: Duration,
    /// Task count at or below which the node counts as idle
    pub idle_threshold: usize,
    /// Sustained idleness required before one worker is torn down
    pub idle_grace: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            idle_threshold: 0,
            idle_grace: Duration::from_secs(30),
        }
    }
}

/// Limits on reading one inbound message.
#[derive(Debug, Clone)]
pub struct ReadLimits {
    pub max_message_bytes: usize,
    /// Wait for the first byte of a request
    pub first_byte_timeout: Duration,
    /// Silence that ends a delimited message whose sender never half-closes
    pub quiet_period: Duration,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            max_message_bytes: 10_000_000,
            first_byte_timeout: Duration::from_secs(10),
            quiet_period: Duration::from_millis(250),
        }
    }
}

/// Runtime-mutable scheduler settings. Reset to defaults on restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Concurrency ceiling for local execution
    pub max_tasks: usize,
    /// Worker pool ceiling
    pub max_workers: usize,
    /// Empty means remote admin is always denied
    pub admin_secret: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_tasks: 3,
            max_workers: 5,
            admin_secret: String::new(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults with the admin secret read from [`ADMIN_SECRET_ENV`].
    pub fn from_env() -> Self {
        Self {
            admin_secret: std::env::var(ADMIN_SECRET_ENV).unwrap_or_default(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub listen_addr: SocketAddr,
    pub runtime: RuntimeConfig,
    pub sandbox: SandboxConfig,
    pub pool: PoolConfig,
    pub delegation: DelegationConfig,
    pub monitor: MonitorConfig,
    pub read_limits: ReadLimits,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "0.0.0.0:5000"
                .parse()
                .expect("default master address is valid"),
            runtime: RuntimeConfig::default(),
            sandbox: SandboxConfig::default(),
            pool: PoolConfig::default(),
            delegation: DelegationConfig::default(),
            monitor: MonitorConfig::default(),
            read_limits: ReadLimits::default(),
        }
    }
}

impl MasterConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub listen_addr: SocketAddr,
    pub sandbox: SandboxConfig,
    pub read_limits: ReadLimits,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "127.0.0.1:6000"
                .parse()
                .expect("default worker address is valid"),
            sandbox: SandboxConfig::default(),
            read_limits: ReadLimits::default(),
        }
    }
}

impl WorkerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }
}
