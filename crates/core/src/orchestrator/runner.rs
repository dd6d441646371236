//! Download orchestrator implementation.
//!
//! One run = one request driven through its strategy plan on a background
//! task:
//! - strategies run strictly in plan order, one live process at a time
//! - every output line is forwarded to the caller's sink and classified
//! - a cookie-lock failure switches once to a cookie-less copy of the plan
//! - cancellation kills the live process and stops the plan

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::fetcher::{
    classify_line, ExitOutcome, FetchError, FetchProcess, OutputTags, ProcessLauncher,
    SystemLauncher, Terminator, ToolPaths,
};
use crate::request::{Browser, DownloadRequest};
use crate::strategy::{FetchProfile, Strategy, StrategyBuilder, StrategyPlan};

use super::types::{
    AttemptRecord, OrchestratorError, PlanKind, ProgressSink, RunOutcome, RunReport,
    EXHAUSTED_REASON,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancellation flag plus the kill switch of the live process.
///
/// Written by the worker, read by `cancel` from any thread.
#[derive(Debug, Default)]
struct RunControl {
    cancelled: CancellationToken,
    live: Mutex<Option<Terminator>>,
}

impl RunControl {
    fn cancel(&self) {
        self.cancelled.cancel();
        if let Some(terminator) = lock(&self.live).as_ref() {
            terminator.terminate();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    /// Registers the live process; kills it at once if cancel already happened.
    fn attach(&self, terminator: Terminator) {
        *lock(&self.live) = Some(terminator.clone());
        if self.is_cancelled() {
            terminator.terminate();
        }
    }

    fn detach(&self) {
        lock(&self.live).take();
    }
}

/// Cancels one run. Cheap to clone and usable from any thread.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    control: Arc<RunControl>,
}

impl CancelHandle {
    /// Sets the cancellation flag and kills the live process, if any.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }
}

/// Handle to a run started with [`DownloadOrchestrator::begin`].
pub struct RunHandle {
    run_id: Uuid,
    url: String,
    control: Arc<RunControl>,
    worker: JoinHandle<RunReport>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// Waits for the run's single terminal report.
    pub async fn wait(self) -> RunReport {
        match self.worker.await {
            Ok(report) => report,
            Err(e) => {
                error!(run_id = %self.run_id, "Download worker aborted: {}", e);
                let now = Utc::now();
                RunReport {
                    run_id: self.run_id,
                    url: self.url,
                    outcome: RunOutcome::Failed(format!("download worker aborted: {e}")),
                    attempts: Vec::new(),
                    started_at: now,
                    finished_at: now,
                }
            }
        }
    }
}

/// The run currently owning an orchestrator. `None` when idle.
type CurrentRun = Arc<Mutex<Option<Arc<RunControl>>>>;

/// Clears the orchestrator's running state when the worker ends.
struct ActiveGuard {
    active: Arc<AtomicBool>,
    current: CurrentRun,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut current = lock(&self.current);
        current.take();
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Drives one download request at a time through escalating strategies.
pub struct DownloadOrchestrator {
    builder: Arc<StrategyBuilder>,
    tools: Arc<ToolPaths>,
    launcher: Arc<dyn ProcessLauncher>,
    active: Arc<AtomicBool>,
    current: CurrentRun,
}

impl DownloadOrchestrator {
    /// Creates an orchestrator. The profile is fixed for its lifetime.
    pub fn new(
        profile: FetchProfile,
        tools: ToolPaths,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        let builder = StrategyBuilder::new(Arc::new(profile), tools.remuxer.clone());
        Self {
            builder: Arc::new(builder),
            tools: Arc::new(tools),
            launcher,
            active: Arc::new(AtomicBool::new(false)),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates an orchestrator that launches real processes.
    pub fn with_system_launcher(profile: FetchProfile, tools: ToolPaths) -> Self {
        Self::new(profile, tools, Arc::new(SystemLauncher))
    }

    pub fn builder(&self) -> &StrategyBuilder {
        &self.builder
    }

    /// Whether a run is currently active.
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Starts a run on a background task and returns immediately.
    ///
    /// Must be called from within a tokio runtime. Fails if a run is active.
    pub fn begin<S: ProgressSink>(
        &self,
        request: DownloadRequest,
        sink: S,
    ) -> Result<RunHandle, OrchestratorError> {
        let control = Arc::new(RunControl::default());
        {
            // Flag and current run change together so `cancel` never sees one without the other.
            let mut current = lock(&self.current);
            if self.active.swap(true, Ordering::SeqCst) {
                warn!("Download already running, rejecting {}", request.url);
                return Err(OrchestratorError::AlreadyRunning);
            }
            *current = Some(Arc::clone(&control));
        }
        let guard = ActiveGuard {
            active: Arc::clone(&self.active),
            current: Arc::clone(&self.current),
        };

        let run_id = Uuid::new_v4();

        let url = request.url.clone();
        let span = info_span!("download_run", %run_id, url = %url);
        let worker = RunWorker {
            request,
            builder: Arc::clone(&self.builder),
            tools: Arc::clone(&self.tools),
            launcher: Arc::clone(&self.launcher),
            control: Arc::clone(&control),
            sink,
            attempts: Vec::new(),
        };

        let task = tokio::spawn(
            async move {
                let _guard = guard;
                worker.run(run_id).await
            }
            .instrument(span),
        );

        Ok(RunHandle {
            run_id,
            url,
            control,
            worker: task,
        })
    }

    /// Cancels the active run, if any. Returns whether one was active.
    pub fn cancel(&self) -> bool {
        match lock(&self.current).as_ref() {
            Some(control) => {
                info!("Cancelling active download");
                control.cancel();
                true
            }
            None => false,
        }
    }
}

/// How a plan ended.
enum PlanResult {
    Succeeded,
    Cancelled,
    /// A strategy failed on a locked cookie store; the rest of the plan was skipped.
    CookieLocked,
    Exhausted,
}

/// How a single attempt ended.
struct AttemptResult {
    exit: Option<ExitOutcome>,
    tags: OutputTags,
}

impl AttemptResult {
    fn cancelled(&self) -> bool {
        self.exit.is_none()
    }
}

enum Step {
    Line(Option<String>),
    Cancelled,
}

struct RunWorker<S> {
    request: DownloadRequest,
    builder: Arc<StrategyBuilder>,
    tools: Arc<ToolPaths>,
    launcher: Arc<dyn ProcessLauncher>,
    control: Arc<RunControl>,
    sink: S,
    attempts: Vec<AttemptRecord>,
}

impl<S: ProgressSink> RunWorker<S> {
    async fn run(mut self, run_id: Uuid) -> RunReport {
        let started_at = Utc::now();
        info!("Starting download");

        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Download aborted: {}", e);
                RunOutcome::Failed(e.to_string())
            }
        };

        match &outcome {
            RunOutcome::Succeeded => info!(attempts = self.attempts.len(), "Download finished"),
            RunOutcome::Failed(reason) => {
                warn!(attempts = self.attempts.len(), "Download failed: {}", reason)
            }
            RunOutcome::Cancelled => info!(attempts = self.attempts.len(), "Download cancelled"),
        }

        self.control.detach();
        RunReport {
            run_id,
            url: self.request.url.clone(),
            outcome,
            attempts: self.attempts,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn drive(&mut self) -> Result<RunOutcome, FetchError> {
        let cookies = self.request.cookie_source;
        let plan = self.builder.build_plan(&self.request, cookies);

        let outcome = match self.execute_plan(&plan, PlanKind::Primary).await? {
            PlanResult::Succeeded => RunOutcome::Succeeded,
            PlanResult::Cancelled => RunOutcome::Cancelled,
            PlanResult::Exhausted => RunOutcome::Failed(EXHAUSTED_REASON.to_string()),
            PlanResult::CookieLocked => match cookies {
                Some(browser) => self.run_cookieless_fallback(browser).await?,
                None => RunOutcome::Failed(EXHAUSTED_REASON.to_string()),
            },
        };

        Ok(outcome)
    }

    async fn run_cookieless_fallback(&mut self, browser: Browser) -> Result<RunOutcome, FetchError> {
        warn!(%browser, "Cookie store locked, falling back to a cookie-less plan");
        self.emit(&format!(
            "[warning] cannot read {browser} cookies: the cookie store is locked or cannot be decrypted; retrying all strategies without cookies"
        ));

        let plan = self.builder.build_plan(&self.request, None);
        let outcome = match self.execute_plan(&plan, PlanKind::CookielessFallback).await? {
            PlanResult::Succeeded => RunOutcome::Succeeded,
            PlanResult::Cancelled => RunOutcome::Cancelled,
            PlanResult::Exhausted | PlanResult::CookieLocked => RunOutcome::Failed(format!(
                "{EXHAUSTED_REASON} without cookies; close {browser} and retry to use its cookies"
            )),
        };

        Ok(outcome)
    }

    async fn execute_plan(
        &mut self,
        plan: &StrategyPlan,
        kind: PlanKind,
    ) -> Result<PlanResult, FetchError> {
        let mut previous: Option<AttemptResult> = None;

        for (index, strategy) in plan.iter().enumerate() {
            if self.control.is_cancelled() {
                return Ok(PlanResult::Cancelled);
            }

            if let Some(failed) = &previous {
                self.announce_retry(failed, index, plan.len(), strategy);
            }

            if strategy.requires_remuxer() {
                self.tools.require_remuxer()?;
            }

            let attempt = self.run_attempt(kind, index, strategy).await?;
            if attempt.cancelled() || self.control.is_cancelled() {
                return Ok(PlanResult::Cancelled);
            }

            if attempt.exit.is_some_and(|exit| exit.success()) {
                return Ok(PlanResult::Succeeded);
            }

            if attempt.tags.cookie_lock && kind == PlanKind::Primary && plan.cookies().is_some() {
                return Ok(PlanResult::CookieLocked);
            }

            previous = Some(attempt);
        }

        Ok(PlanResult::Exhausted)
    }

    async fn run_attempt(
        &mut self,
        plan: PlanKind,
        index: usize,
        strategy: &Strategy,
    ) -> Result<AttemptResult, FetchError> {
        info!(strategy = %strategy.label, ?plan, "Starting strategy {}", index + 1);
        let started_at = Utc::now();

        let mut process = self
            .launcher
            .launch(&self.tools.fetcher, &strategy.args)?;
        self.control.attach(process.terminator());

        let result = self.consume(process.as_mut()).await;
        self.control.detach();
        let result = result?;

        self.attempts.push(AttemptRecord {
            plan,
            index,
            strategy: strategy.kind,
            exit_code: result.exit.and_then(|exit| exit.code),
            tags: result.tags,
            started_at,
        });

        match result.exit {
            Some(exit) => debug!(
                strategy = %strategy.label,
                code = ?exit.code,
                tags = ?result.tags,
                "Strategy exited"
            ),
            None => debug!(strategy = %strategy.label, "Strategy cancelled"),
        }

        Ok(result)
    }

    /// Streams lines until output closes or the run is cancelled, then reaps.
    async fn consume(&mut self, process: &mut dyn FetchProcess) -> Result<AttemptResult, FetchError> {
        let cancelled = self.control.cancelled.clone();
        let mut tags = OutputTags::default();

        loop {
            let step = tokio::select! {
                biased;
                _ = cancelled.cancelled() => Step::Cancelled,
                line = process.next_line() => Step::Line(line),
            };

            match step {
                Step::Line(Some(line)) => {
                    tags |= classify_line(&line);
                    self.sink.on_progress(&line);
                }
                Step::Line(None) => break,
                Step::Cancelled => {
                    process.terminator().terminate();
                    let _ = process.wait().await;
                    return Ok(AttemptResult { exit: None, tags });
                }
            }
        }

        let exit = tokio::select! {
            biased;
            _ = cancelled.cancelled() => None,
            exit = process.wait() => Some(exit),
        };
        let exit = match exit {
            Some(exit) if !self.control.is_cancelled() => exit?,
            _ => {
                process.terminator().terminate();
                let _ = process.wait().await;
                return Ok(AttemptResult { exit: None, tags });
            }
        };

        Ok(AttemptResult {
            exit: Some(exit),
            tags,
        })
    }

    fn announce_retry(
        &mut self,
        failed: &AttemptResult,
        index: usize,
        total: usize,
        next: &Strategy,
    ) {
        let cause = if failed.tags.rate_limit_or_auth {
            warn!(next = %next.label, "Remote rejected the previous strategy");
            "remote rejected the request".to_string()
        } else {
            let code = failed
                .exit
                .and_then(|exit| exit.code)
                .map(|code| code.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            info!(next = %next.label, "Previous strategy failed with exit code {}", code);
            format!("attempt failed (exit code {code})")
        };

        self.emit(&format!(
            "[retry] {cause}; trying strategy {}/{total} ({})",
            index + 1,
            next.label
        ));
    }

    fn emit(&mut self, line: &str) {
        self.sink.on_progress(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedAttempt, ScriptedLauncher};
    use std::time::Duration;

    fn orchestrator(launcher: Arc<ScriptedLauncher>) -> DownloadOrchestrator {
        DownloadOrchestrator::new(
            FetchProfile::default(),
            ToolPaths::new("yt-dlp", Some("ffmpeg".into())),
            launcher,
        )
    }

    fn request() -> DownloadRequest {
        DownloadRequest::new("https://example.com/watch/1", "/tmp/out")
    }

    #[test]
    fn test_run_control_attach_after_cancel_terminates() {
        let control = RunControl::default();
        control.cancel();
        let terminator = Terminator::new();
        control.attach(terminator.clone());
        assert!(terminator.is_terminated());
    }

    #[test]
    fn test_run_control_cancel_terminates_live() {
        let control = RunControl::default();
        let terminator = Terminator::new();
        control.attach(terminator.clone());
        control.cancel();
        assert!(terminator.is_terminated());
        control.detach();
        control.cancel();
    }

    #[tokio::test]
    async fn test_second_begin_rejected_while_running() {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push(ScriptedAttempt::hanging(vec!["[download]   1.0% of 5MiB"]));
        let orchestrator = orchestrator(Arc::clone(&launcher));

        let handle = orchestrator.begin(request(), |_: &str| {}).unwrap();
        assert!(orchestrator.is_running());
        let second = orchestrator.begin(request(), |_: &str| {});
        assert!(matches!(second, Err(OrchestratorError::AlreadyRunning)));

        assert!(orchestrator.cancel());
        let report = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_cancel_without_run() {
        let orchestrator = orchestrator(Arc::new(ScriptedLauncher::new()));
        assert!(!orchestrator.cancel());
    }

    #[tokio::test]
    async fn test_cancel_targets_only_the_current_run() {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push(ScriptedAttempt::success(vec!["done"]));
        launcher.push(ScriptedAttempt::hanging(vec![]));
        let orchestrator = orchestrator(Arc::clone(&launcher));

        let first = orchestrator.begin(request(), |_: &str| {}).unwrap();
        let first_cancel = first.cancel_handle();
        assert!(first.wait().await.outcome.is_success());
        assert!(lock(&orchestrator.current).is_none());
        assert!(!orchestrator.cancel());
        assert!(!first_cancel.is_cancelled());

        let second = orchestrator.begin(request(), |_: &str| {}).unwrap();
        let second_cancel = second.cancel_handle();
        assert!(orchestrator.cancel());
        assert!(second_cancel.is_cancelled());
        assert!(!first_cancel.is_cancelled());

        let report = tokio::time::timeout(Duration::from_secs(5), second.wait())
            .await
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_can_start_again_after_finish() {
        let launcher = Arc::new(ScriptedLauncher::new());
        launcher.push(ScriptedAttempt::success(vec!["done"]));
        launcher.push(ScriptedAttempt::success(vec!["done again"]));
        let orchestrator = orchestrator(Arc::clone(&launcher));

        let report = orchestrator.begin(request(), |_: &str| {}).unwrap().wait().await;
        assert!(report.outcome.is_success());

        let report = orchestrator.begin(request(), |_: &str| {}).unwrap().wait().await;
        assert!(report.outcome.is_success());
        assert_eq!(launcher.launch_count(), 2);
    }
}
