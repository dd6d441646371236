//! Scripted process launcher for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::fetcher::{ExitOutcome, FetchError, FetchProcess, ProcessLauncher, Terminator};

/// Behaviour of one scripted launch.
#[derive(Debug, Clone)]
pub struct ScriptedAttempt {
    /// Lines emitted, in order.
    pub lines: Vec<String>,
    /// Exit code reported once the lines are drained.
    pub exit_code: i32,
    /// If set, output stays open after the lines until terminated.
    pub hang: bool,
    /// Delay before each line.
    pub line_delay: Duration,
}

impl ScriptedAttempt {
    fn new(lines: Vec<&str>, exit_code: i32) -> Self {
        Self {
            lines: lines.into_iter().map(String::from).collect(),
            exit_code,
            hang: false,
            line_delay: Duration::ZERO,
        }
    }

    /// Emits `lines` and exits 0.
    pub fn success(lines: Vec<&str>) -> Self {
        Self::new(lines, 0)
    }

    /// Emits `lines` and exits with `exit_code`.
    pub fn failure(exit_code: i32, lines: Vec<&str>) -> Self {
        Self::new(lines, exit_code)
    }

    /// Emits `lines`, then blocks until terminated.
    pub fn hanging(lines: Vec<&str>) -> Self {
        Self {
            hang: true,
            ..Self::new(lines, 0)
        }
    }

    /// Sleeps `delay` before each line.
    pub fn with_line_delay(mut self, delay: Duration) -> Self {
        self.line_delay = delay;
        self
    }
}

/// A recorded launch for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLaunch {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// [`ProcessLauncher`] that replays scripted attempts in order.
///
/// Launches beyond the script exit 1 with no output.
///
/// # Example
///
/// ```rust,ignore
/// use ytgrab_core::testing::{ScriptedAttempt, ScriptedLauncher};
///
/// let launcher = Arc::new(ScriptedLauncher::new());
/// launcher.push(ScriptedAttempt::failure(1, vec!["ERROR: HTTP Error 404: Not Found"]));
/// launcher.push(ScriptedAttempt::success(vec!["[download] 100% of 10MiB"]));
///
/// let orchestrator = DownloadOrchestrator::new(profile, tools, launcher.clone());
/// // ... run ...
/// assert_eq!(launcher.launch_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    script: Mutex<VecDeque<ScriptedAttempt>>,
    launches: Mutex<Vec<RecordedLaunch>>,
    terminators: Mutex<Vec<Terminator>>,
    missing_executable: Mutex<bool>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attempt to the script.
    pub fn push(&self, attempt: ScriptedAttempt) {
        self.script.lock().unwrap().push_back(attempt);
    }

    /// Makes every launch fail as if the executable did not exist.
    pub fn set_missing_executable(&self, missing: bool) {
        *self.missing_executable.lock().unwrap() = missing;
    }

    pub fn launches(&self) -> Vec<RecordedLaunch> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    /// Whether the process of launch `index` was terminated.
    pub fn was_terminated(&self, index: usize) -> bool {
        self.terminators
            .lock()
            .unwrap()
            .get(index)
            .is_some_and(Terminator::is_terminated)
    }
}

impl ProcessLauncher for ScriptedLauncher {
    fn launch(&self, program: &Path, args: &[String]) -> Result<Box<dyn FetchProcess>, FetchError> {
        if *self.missing_executable.lock().unwrap() {
            return Err(FetchError::FetcherNotFound {
                path: program.to_path_buf(),
            });
        }

        self.launches.lock().unwrap().push(RecordedLaunch {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });

        let attempt = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedAttempt::failure(1, vec![]));

        let terminator = Terminator::new();
        self.terminators.lock().unwrap().push(terminator.clone());

        Ok(Box::new(ScriptedProcess {
            lines: attempt.lines.into(),
            exit_code: attempt.exit_code,
            hang: attempt.hang,
            line_delay: attempt.line_delay,
            terminator,
        }))
    }
}

struct ScriptedProcess {
    lines: VecDeque<String>,
    exit_code: i32,
    hang: bool,
    line_delay: Duration,
    terminator: Terminator,
}

#[async_trait]
impl FetchProcess for ScriptedProcess {
    async fn next_line(&mut self) -> Option<String> {
        if self.terminator.is_terminated() {
            return None;
        }

        if let Some(line) = self.lines.pop_front() {
            if !self.line_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.line_delay) => {}
                    _ = self.terminator.terminated() => return None,
                }
            }
            return Some(line);
        }

        if self.hang {
            self.terminator.terminated().await;
        }
        None
    }

    async fn wait(&mut self) -> Result<ExitOutcome, FetchError> {
        if self.terminator.is_terminated() {
            return Ok(ExitOutcome::killed());
        }
        Ok(ExitOutcome::from_code(self.exit_code))
    }

    fn terminator(&self) -> Terminator {
        self.terminator.clone()
    }
}

/// Shared, ordered record of lines delivered to a progress sink.
#[derive(Debug, Clone, Default)]
pub struct LineRecorder {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LineRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A progress sink appending to this recorder.
    pub fn sink(&self) -> impl FnMut(&str) + Send + 'static {
        let lines = Arc::clone(&self.lines);
        move |line: &str| lines.lock().unwrap().push(line.to_string())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_lines_and_exit_code() {
        let launcher = ScriptedLauncher::new();
        launcher.push(ScriptedAttempt::failure(2, vec!["a", "b"]));

        let mut process = launcher.launch(Path::new("yt-dlp"), &["x".to_string()]).unwrap();
        assert_eq!(process.next_line().await.as_deref(), Some("a"));
        assert_eq!(process.next_line().await.as_deref(), Some("b"));
        assert!(process.next_line().await.is_none());
        assert_eq!(process.wait().await.unwrap().code, Some(2));
        assert_eq!(launcher.launches()[0].args, vec!["x"]);
    }

    #[test]
    fn test_unscripted_launch_fails() {
        let launcher = ScriptedLauncher::new();
        let mut process = launcher.launch(Path::new("yt-dlp"), &[]).unwrap();
        tokio_test::block_on(async {
            assert!(process.next_line().await.is_none());
            assert_eq!(process.wait().await.unwrap().code, Some(1));
        });
    }

    #[tokio::test]
    async fn test_hanging_until_terminated() {
        let launcher = ScriptedLauncher::new();
        launcher.push(ScriptedAttempt::hanging(vec![]));
        let mut process = launcher.launch(Path::new("yt-dlp"), &[]).unwrap();

        let terminator = process.terminator();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            terminator.terminate();
        });

        assert!(process.next_line().await.is_none());
        assert!(!process.wait().await.unwrap().success());
        assert!(launcher.was_terminated(0));
    }

    #[test]
    fn test_missing_executable() {
        let launcher = ScriptedLauncher::new();
        launcher.set_missing_executable(true);
        assert!(launcher.launch(Path::new("yt-dlp"), &[]).is_err());
        assert_eq!(launcher.launch_count(), 0);
    }

    #[test]
    fn test_line_recorder() {
        let recorder = LineRecorder::new();
        let mut sink = recorder.sink();
        sink("one");
        sink("two");
        assert_eq!(recorder.lines(), vec!["one", "two"]);
    }
}
