//! Builder for executing engine commands.
//!
//! Two ways to run a command:
//!
//! - [`ToolCommand::execute`] runs to completion and captures stdout and
//!   stderr. Both pipes are drained while the process runs.
//! - [`ToolCommand::spawn_lines`] hands back a [`ToolProcess`] whose stdout is
//!   read line by line. Stderr is drained by a background task from the moment
//!   the process starts, so a chatty engine can never stall on a full pipe
//!   while the consumer is busy with stdout.
//!
//! Every child is spawned with `kill_on_drop`, so dropping an in-flight
//! invocation (a failed sibling in a join, a timeout, a cancellation) kills
//! the engine process instead of leaving it running.

use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use keycut_core::{Error, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use keycut_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> keycut_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-loglevel", "error", "-show_format"])
///     .arg("/path/to/video.mp4")
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

impl ToolCommand {
    /// Create a new command for the given program path.
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

    /// Set the maximum execution time. Without one the process may run
    /// indefinitely.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// Kill the process and fail with [`Error::Cancelled`] once `token` fires.
    pub fn cancel_on(&mut self, token: CancellationToken) -> &mut Self {
        self.cancel = Some(token);
        self
    }

    /// The arguments added so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Short program name used in errors and logs.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// The full command line, shell-quoted where needed.
    pub fn describe(&self) -> String {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) {
                    format!("'{a}'")
                } else {
                    a.clone()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn failure(&self, message: impl Into<String>) -> Error {
        Error::engine(self.tool_name(), self.describe(), message)
    }

    fn spawn(&self) -> Result<Child> {
        tracing::debug!("running {}", self.describe());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.spawn()
            .map_err(|e| self.failure(format!("failed to spawn: {e}")))
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|d| Instant::now() + d)
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`Error::Engine`] if spawning fails, the process times out, or it
    ///   exits with a non-zero status (message includes stderr).
    /// - [`Error::Cancelled`] if the cancellation token fires first.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let child = self.spawn()?;
        let output = supervise(self, self.deadline(), child.wait_with_output()).await?;

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(self.failure(format!(
                "exited with status {}: {}",
                output.status,
                tool_output.stderr.trim()
            )));
        }

        Ok(tool_output)
    }

    /// Start the command and stream its stdout line by line.
    pub fn spawn_lines(&self) -> Result<ToolProcess> {
        let mut child = self.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.failure("stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| self.failure("stderr was not captured"))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        });

        Ok(ToolProcess {
            deadline: self.deadline(),
            command: self.clone(),
            child,
            lines: BufReader::new(stdout).lines(),
            stderr: stderr_task,
            exhausted: false,
        })
    }
}

/// A running tool whose stdout is consumed incrementally.
///
/// Call [`ToolProcess::finish`] when done. If stdout was read to the end the
/// exit status is checked; if the consumer stopped early the process is
/// killed and its status ignored.
pub struct ToolProcess {
    command: ToolCommand,
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stderr: JoinHandle<String>,
    deadline: Option<Instant>,
    exhausted: bool,
}

impl ToolProcess {
    /// Next stdout line without its terminator, or `None` at end of stream.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        if self.exhausted {
            return Ok(None);
        }
        let line = supervise(&self.command, self.deadline, self.lines.next_line()).await?;
        if line.is_none() {
            self.exhausted = true;
        }
        Ok(line)
    }

    /// Wait for the process and turn a non-zero exit into [`Error::Engine`].
    pub async fn finish(self) -> Result<()> {
        let ToolProcess {
            command,
            mut child,
            lines,
            stderr,
            deadline,
            exhausted,
        } = self;

        if !exhausted {
            tracing::debug!("closing {} early", command.tool_name());
            drop(lines);
            if let Err(e) = child.start_kill() {
                tracing::debug!("{} already exited: {e}", command.tool_name());
            }
            let _ = child.wait().await;
            return Ok(());
        }

        let status = supervise(&command, deadline, child.wait()).await?;
        let stderr = stderr.await.unwrap_or_default();

        if !status.success() {
            return Err(command.failure(format!(
                "exited with status {status}: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Race `fut` against the command's deadline and cancellation token.
async fn supervise<T>(
    command: &ToolCommand,
    deadline: Option<Instant>,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    let expired = async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };
    let cancelled = async {
        match &command.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        res = fut => res.map_err(|e| command.failure(format!("I/O error talking to process: {e}"))),
        () = expired => Err(command.failure(format!(
            "timed out after {:?}",
            command.timeout.unwrap_or_default()
        ))),
        () = cancelled => Err(Error::Cancelled(format!("{} was cancelled", command.tool_name()))),
    }
}

/// Anything that yields text lines asynchronously.
///
/// Implemented for a running [`ToolProcess`] and for any tokio line reader,
/// so packet scanning can be driven from memory in tests.
#[allow(async_fn_in_trait)]
pub trait LineSource {
    /// Next line, or `None` at end of stream.
    async fn next_line(&mut self) -> Result<Option<String>>;
}

impl LineSource for ToolProcess {
    async fn next_line(&mut self) -> Result<Option<String>> {
        ToolProcess::next_line(self).await
    }
}

impl<R: AsyncBufRead + Unpin> LineSource for Lines<R> {
    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(Lines::next_line(self).await?)
    }
}
