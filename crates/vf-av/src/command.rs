//! Builder for executing external tool commands with deadline and
//! cancellation support.
//!
//! The child is spawned with `kill_on_drop`, and both the deadline and the
//! cancellation path kill and reap it explicitly before returning, so a
//! failed or abandoned run never leaves an encoder behind.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use vf_core::ToolError;

/// Number of trailing stderr lines kept in error diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Bytes of stderr retained while a process runs; older output is dropped.
const STDERR_KEEP_BYTES: usize = 64 * 1024;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8), at most the last 64 KiB.
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use vf_av::ToolCommand;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), vf_core::ToolError> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "error", "-print_format", "json", "-show_streams"])
///     .arg("/path/to/upload.mp4")
///     .timeout(Duration::from_secs(30))
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut(Duration),
    Cancelled,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    ///
    /// No deadline is applied unless [`ToolCommand::timeout`] is called.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
            cancel: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// Kill the process when `token` is cancelled.
    pub fn cancel_on(&mut self, token: CancellationToken) -> &mut Self {
        self.cancel = Some(token);
        self
    }

    /// Short tool name used in errors and logs.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`ToolError::NotFound`] if the program does not exist.
    /// - [`ToolError::Spawn`] if spawning fails for another reason.
    /// - [`ToolError::TimedOut`] / [`ToolError::Cancelled`] after the child
    ///   has been killed.
    /// - [`ToolError::Exited`] on a non-zero exit, carrying the stderr tail.
    pub async fn execute(&self) -> Result<ToolOutput, ToolError> {
        let tool = self.program_name();

        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(ToolError::Cancelled { tool });
        }

        tracing::debug!("exec: {} {}", self.program.display(), self.args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    ToolError::NotFound { tool: tool.clone() }
                } else {
                    ToolError::Spawn {
                        tool: tool.clone(),
                        source,
                    }
                }
            })?;

        // Drain both pipes concurrently so a chatty encoder never blocks on a
        // full pipe while we wait for it.
        let stdout_task = tokio::spawn(drain(child.stdout.take()));
        let stderr_task = tokio::spawn(drain_tail(child.stderr.take(), STDERR_KEEP_BYTES));

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            after = deadline(self.timeout) => Outcome::TimedOut(after),
            _ = cancelled(self.cancel.as_ref()) => Outcome::Cancelled,
        };

        let status = match outcome {
            Outcome::Exited(status) => status.map_err(|source| ToolError::Io {
                tool: tool.clone(),
                source,
            })?,
            Outcome::TimedOut(after) => {
                terminate(&mut child, &tool).await;
                tracing::warn!("{tool} timed out after {after:?}; process killed");
                return Err(ToolError::TimedOut { tool, after });
            }
            Outcome::Cancelled => {
                terminate(&mut child, &tool).await;
                tracing::info!("{tool} cancelled; process killed");
                return Err(ToolError::Cancelled { tool });
            }
        };

        let stdout = collect(stdout_task, &tool).await?;
        let stderr = collect(stderr_task, &tool).await?;

        if !status.success() {
            return Err(ToolError::Exited {
                tool,
                exit_code: status.code(),
                stderr: stderr_tail(&stderr, STDERR_TAIL_LINES),
            });
        }

        Ok(ToolOutput {
            status,
            stdout,
            stderr,
        })
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Like [`drain`], but only the last `keep` bytes survive. Long encodes
/// write to stderr for their whole run.
async fn drain_tail<R: AsyncRead + Unpin>(
    pipe: Option<R>,
    keep: usize,
) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let Some(mut pipe) = pipe else {
        return Ok(buf);
    };
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > keep * 2 {
            buf.drain(..buf.len() - keep);
        }
    }
    if buf.len() > keep {
        buf.drain(..buf.len() - keep);
    }
    Ok(buf)
}

async fn collect(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    tool: &str,
) -> Result<String, ToolError> {
    let bytes = task
        .await
        .map_err(|e| ToolError::Io {
            tool: tool.to_string(),
            source: std::io::Error::other(e),
        })?
        .map_err(|source| ToolError::Io {
            tool: tool.to_string(),
            source,
        })?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

async fn deadline(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(d) => {
            tokio::time::sleep(d).await;
            d
        }
        None => std::future::pending().await,
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Kill the child and wait for it to be reaped.
async fn terminate(child: &mut Child, tool: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!("failed to kill {tool}: {e}");
    }
}

/// Keep the last `max_lines` non-empty lines of a stderr dump. Carriage
/// returns end a line too, so ffmpeg's in-place progress updates count as
/// separate lines.
pub fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr
        .split(|c| c == '\n' || c == '\r')
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
