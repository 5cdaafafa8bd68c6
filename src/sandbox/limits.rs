use crate::config::ResourceLimits;

impl ResourceLimits {
    /// Drop the address-space ceiling, keeping the others.
    pub fn without_address_space(self) -> Self {
        Self {
            address_space_bytes: None,
            ..self
        }
    }

    /// Apply the ceilings to the calling process.
    ///
    /// Runs between fork and exec, so it only calls `setrlimit`.
    #[cfg(unix)]
    pub fn apply(&self) -> std::io::Result<()> {
        use nix::sys::resource::{setrlimit, Resource};

        if let Some(cpu) = self.cpu_seconds {
            setrlimit(Resource::RLIMIT_CPU, cpu, cpu)?;
        }
        if let Some(bytes) = self.address_space_bytes {
            setrlimit(Resource::RLIMIT_AS, bytes, bytes)?;
        }
        if let Some(bytes) = self.file_size_bytes {
            setrlimit(Resource::RLIMIT_FSIZE, bytes, bytes)?;
        }
        Ok(())
    }
}

/// Prepare `cmd` so its child leads a fresh session, making the child and
/// everything it forks one process group, and carries `limits` if given.
#[cfg(unix)]
pub fn install(cmd: &mut tokio::process::Command, limits: Option<ResourceLimits>) {
    // SAFETY: the hook only calls setsid and setrlimit, both async-signal-safe.
    unsafe {
        cmd.pre_exec(move || {
            nix::unistd::setsid()?;
            match limits {
                Some(limits) => limits.apply(),
                None => Ok(()),
            }
        });
    }
}

#[cfg(not(unix))]
pub fn install(_cmd: &mut tokio::process::Command, _limits: Option<ResourceLimits>) {}

/// SIGKILL every process in the group led by `leader`. A group that is
/// already gone is not an error.
#[cfg(unix)]
pub fn kill_group(leader: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(leader as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid = leader, error = %e, "Failed to kill process group"),
    }
}

#[cfg(not(unix))]
pub fn kill_group(_leader: u32) {}
