//! Child process plumbing for the fetch tool.
//!
//! A launched process writes stdout and stderr into one shared pipe, so it
//! exposes them as one stream of lines in the order it wrote them,
//! an exit status once that stream is drained, and a [`Terminator`] that can
//! kill it from any thread.

use async_trait::async_trait;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::FetchError;

/// Lines buffered between the pipe reader and the consumer.
const LINE_BUFFER: usize = 256;

/// Exit status of a finished process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Outcome of a process that was killed before exiting on its own.
    pub fn killed() -> Self {
        Self { code: None }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Kill switch for one process. Cloneable and idempotent.
#[derive(Debug, Clone, Default)]
pub struct Terminator {
    token: CancellationToken,
}

impl Terminator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the process to die. No-op if it already exited or was terminated.
    pub fn terminate(&self) {
        self.token.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`terminate`](Self::terminate) has been called.
    pub async fn terminated(&self) {
        self.token.cancelled().await
    }
}

/// A running fetch process.
#[async_trait]
pub trait FetchProcess: Send {
    /// Next output line in emission order, `None` once output is closed.
    async fn next_line(&mut self) -> Option<String>;

    /// Waits for the process to exit. Call after output is exhausted.
    async fn wait(&mut self) -> Result<ExitOutcome, FetchError>;

    /// Handle that kills this process.
    fn terminator(&self) -> Terminator;
}

/// Starts fetch processes.
pub trait ProcessLauncher: Send + Sync {
    /// Starts `program` with `args`, stderr merged into the line stream.
    fn launch(&self, program: &Path, args: &[String]) -> Result<Box<dyn FetchProcess>, FetchError>;
}

/// Launches real OS processes through tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> Result<Box<dyn FetchProcess>, FetchError> {
        Ok(Box::new(SystemProcess::spawn(program, args)?))
    }
}

/// An OS child process supervised by a background task.
pub struct SystemProcess {
    lines: mpsc::Receiver<String>,
    exit: Option<oneshot::Receiver<std::io::Result<ExitStatus>>>,
    terminator: Terminator,
}

impl SystemProcess {
    /// Spawns the process. Must be called from within a tokio runtime.
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self, FetchError> {
        let (reader, writer) = os_pipe::pipe()?;
        let stderr_writer = writer.try_clone()?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer)
            .kill_on_drop(true);
        let spawned = command.spawn();
        // The command holds the parent's write ends; EOF only arrives once they are closed.
        drop(command);
        let mut child = spawned.map_err(|e| FetchError::from_spawn(program, e))?;

        debug!(program = %program.display(), pid = ?child.id(), "Spawned fetch process");

        let (tx, lines) = mpsc::channel(LINE_BUFFER);
        tokio::task::spawn_blocking(move || forward_lines(reader, tx));

        let terminator = Terminator::new();
        let kill_signal = terminator.clone();
        let (exit_tx, exit_rx) = oneshot::channel();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_signal.terminated() => {
                    if let Err(e) = child.start_kill() {
                        warn!("Failed to kill fetch process: {}", e);
                    }
                    child.wait().await
                }
            };
            let _ = exit_tx.send(status);
        });

        Ok(Self {
            lines,
            exit: Some(exit_rx),
            terminator,
        })
    }
}

#[async_trait]
impl FetchProcess for SystemProcess {
    async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    async fn wait(&mut self) -> Result<ExitOutcome, FetchError> {
        let Some(exit) = self.exit.as_mut() else {
            return Err(FetchError::Io(std::io::Error::other(
                "process exit status already consumed",
            )));
        };

        // Only cleared once resolved, so a dropped wait can be retried.
        let status = exit.await;
        self.exit = None;

        match status {
            Ok(status) => Ok(ExitOutcome::from(status?)),
            // Supervisor went away without reporting; the child was dropped and killed.
            Err(_) => Ok(ExitOutcome::killed()),
        }
    }

    fn terminator(&self) -> Terminator {
        self.terminator.clone()
    }
}

impl Drop for SystemProcess {
    fn drop(&mut self) {
        if self.exit.is_some() {
            self.terminator.terminate();
        }
    }
}

/// Reads newline-delimited output, tolerating invalid UTF-8.
///
/// Blocking; runs on the blocking pool until the pipe closes or the
/// consumer goes away.
fn forward_lines(reader: os_pipe::PipeReader, tx: mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut segment = Vec::new();
    loop {
        segment.clear();
        match reader.read_until(b'\n', &mut segment) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&segment)
                    .trim_end_matches('\n')
                    .trim_end_matches('\r')
                    .to_string();
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Stopped reading process output: {}", e);
                break;
            }
        }
    }
}
