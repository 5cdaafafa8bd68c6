use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::{ResourceLimits, SandboxConfig};
use crate::error::{JudgeError, Result};
use crate::sandbox::language::{safe_filename, Language, Step};
use crate::sandbox::limits;
use crate::sandbox::workspace::JobDirectory;

const PIPE_CHUNK: usize = 8192;

/// How long pipes are still drained once the step's process group is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Pipeline stage a timeout interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Run,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Compile => write!(f, "compilation"),
            Stage::Run => write!(f, "execution"),
        }
    }
}

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Finished {
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
    },
    CompileFailed {
        language: Language,
        diagnostic: String,
    },
    TimedOut {
        stage: Stage,
        limit: Duration,
    },
}

impl Outcome {
    /// Response text: a labeled stdout block plus a labeled stderr block when
    /// there is anything on stderr.
    pub fn render(&self, max_output_bytes: usize) -> String {
        match self {
            Outcome::Finished { stdout, stderr, .. } => {
                let mut text = format!("Output:\n{}\n", truncate(stdout, max_output_bytes));
                if !stderr.is_empty() {
                    text.push_str(&format!("Errors:\n{}\n", truncate(stderr, max_output_bytes)));
                }
                text
            }
            Outcome::CompileFailed {
                language,
                diagnostic,
            } => format!(
                "Compilation error ({}):\n{}",
                language,
                truncate(diagnostic, max_output_bytes)
            ),
            Outcome::TimedOut { stage, limit } => format!(
                "Timed out: {} exceeded the {:.1}s limit and was terminated.\n",
                stage,
                limit.as_secs_f64()
            ),
        }
    }
}

fn truncate(text: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if text.len() <= max_bytes {
        return text.into();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n[output truncated]", &text[..end]).into()
}

/// Output of one finished child process.
enum StepResult {
    Exited {
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
        success: bool,
    },
    TimedOut,
}

/// Compiles and runs submitted source inside a throwaway job directory.
///
/// Each call gets its own directory under the configured temp root, every
/// child process is bounded by a wall-clock timeout, and run steps carry OS
/// resource ceilings on POSIX.
#[derive(Debug, Clone)]
pub struct SandboxExecutor {
    config: SandboxConfig,
}

impl SandboxExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Execute a job and render its result as response text. Never fails.
    pub async fn execute(&self, language: &str, filename: &str, source: &str) -> String {
        match self.run(language, filename, source).await {
            Ok(outcome) => outcome.render(self.config.max_output_bytes),
            Err(e) => {
                tracing::warn!(language, error = %e, "Execution failed");
                e.to_response()
            }
        }
    }

    /// Execute a job and return its structured outcome.
    ///
    /// The job directory is removed before this returns, whatever the result.
    pub async fn run(&self, language: &str, filename: &str, source: &str) -> Result<Outcome> {
        let lang = Language::parse(language)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(language.to_string()))?;
        let filename = safe_filename(filename, lang);

        let dir = JobDirectory::create(&self.config.temp_root).await?;
        tracing::debug!(language = %lang, filename = %filename, dir = %dir.path().display(), "Executing job");

        let result = self.run_in(&dir, lang, &filename, source).await;
        dir.remove().await;
        result
    }

    async fn run_in(
        &self,
        dir: &JobDirectory,
        lang: Language,
        filename: &str,
        source: &str,
    ) -> Result<Outcome> {
        let tools = &self.config.toolchain;
        let source_path = dir.write_file(filename, source).await?;

        if let Some(step) = lang.compile_step(tools, dir.path(), &source_path) {
            match self
                .spawn_step(&step, dir.path(), self.config.compile_timeout, None)
                .await?
            {
                StepResult::TimedOut => {
                    return Ok(Outcome::TimedOut {
                        stage: Stage::Compile,
                        limit: self.config.compile_timeout,
                    })
                }
                StepResult::Exited {
                    stdout,
                    stderr,
                    success: false,
                    ..
                } => {
                    let diagnostic = if stderr.is_empty() { stdout } else { stderr };
                    return Ok(Outcome::CompileFailed {
                        language: lang,
                        diagnostic,
                    });
                }
                StepResult::Exited { .. } => {}
            }
        }

        let run = lang.run_step(tools, dir.path(), &source_path);
        let limits = if lang.honors_address_space_limit() {
            self.config.limits
        } else {
            self.config.limits.without_address_space()
        };

        match self
            .spawn_step(&run, dir.path(), self.config.run_timeout, Some(limits))
            .await?
        {
            StepResult::TimedOut => Ok(Outcome::TimedOut {
                stage: Stage::Run,
                limit: self.config.run_timeout,
            }),
            StepResult::Exited {
                stdout,
                stderr,
                exit_code,
                ..
            } => Ok(Outcome::Finished {
                stdout,
                stderr,
                exit_code,
            }),
        }
    }

    async fn spawn_step(
        &self,
        step: &Step,
        cwd: &Path,
        timeout: Duration,
        limits: Option<ResourceLimits>,
    ) -> Result<StepResult> {
        let mut cmd = Command::new(&step.program);
        cmd.args(&step.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        limits::install(&mut cmd, limits);

        let mut child = cmd.spawn().map_err(|source| JudgeError::Spawn {
            program: step.program.clone(),
            source,
        })?;
        let leader = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let cap = self.config.max_output_bytes;
        let exited = CancellationToken::new();

        // The timeout bounds the step's own exit. Its process group is killed
        // either way, so nothing it forked outlives it or holds the pipes.
        let status = async {
            let status = tokio::time::timeout(timeout, child.wait()).await;
            if let Some(pgid) = leader {
                limits::kill_group(pgid);
            }
            let status = match status {
                Ok(status) => Some(status),
                Err(_) => {
                    let _ = child.kill().await;
                    None
                }
            };
            exited.cancel();
            status
        };

        let (status, stdout, stderr) = tokio::join!(
            status,
            read_capped(stdout, cap, &exited),
            read_capped(stderr, cap, &exited),
        );

        match status {
            Some(status) => {
                let status = status?;
                Ok(StepResult::Exited {
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    exit_code: status.code(),
                    success: status.success(),
                })
            }
            None => {
                tracing::info!(program = %step.program, timeout = ?timeout, "Step timed out");
                Ok(StepResult::TimedOut)
            }
        }
    }
}

/// Keep at most `cap + 1` bytes of `pipe`, so rendering can tell the output
/// was cut. The rest is read and dropped, which keeps the writer from
/// blocking on a full pipe. Reading stops at EOF, or `DRAIN_GRACE` after
/// `exited` fires.
async fn read_capped<R>(pipe: Option<R>, cap: usize, exited: &CancellationToken) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Vec::new();
    };
    let keep = cap.saturating_add(1);
    let mut kept = Vec::new();
    let mut chunk = [0u8; PIPE_CHUNK];

    let deadline = async {
        exited.cancelled().await;
        tokio::time::sleep(DRAIN_GRACE).await;
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            read = pipe.read(&mut chunk) => match read {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = keep - kept.len();
                    kept.extend_from_slice(&chunk[..n.min(room)]);
                }
            },
        }
    }
    kept
}
