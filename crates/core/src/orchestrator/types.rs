//! Types for the download orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::fetcher::OutputTags;
use crate::strategy::StrategyKind;

/// Reason reported when every strategy of the plan failed.
pub const EXHAUSTED_REASON: &str = "all download strategies failed";

/// Errors returned when starting a run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// A run is already active on this orchestrator.
    #[error("a download is already running")]
    AlreadyRunning,
}

/// Terminal disposition of a run. Exactly one per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed(String),
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded)
    }
}

/// Which plan an attempt belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// The plan built with the request's cookie source.
    Primary,
    /// The plan rebuilt without cookies after a cookie-lock failure.
    CookielessFallback,
}

/// One executed strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub plan: PlanKind,
    /// Zero-based position in its plan.
    pub index: usize,
    pub strategy: StrategyKind,
    /// `None` when the process was killed.
    pub exit_code: Option<i32>,
    pub tags: OutputTags,
    pub started_at: DateTime<Utc>,
}

/// Final report of a run, delivered once when the worker finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub url: String,
    pub outcome: RunOutcome,
    pub attempts: Vec<AttemptRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Strategies that were started, in order.
    pub fn strategies_attempted(&self) -> Vec<(PlanKind, StrategyKind)> {
        self.attempts
            .iter()
            .map(|a| (a.plan, a.strategy))
            .collect()
    }

    /// Whether the cookie-less fallback plan ran.
    pub fn used_fallback(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.plan == PlanKind::CookielessFallback)
    }
}

/// Receives output lines of a run, in emission order, from the run's worker.
///
/// Never called concurrently for the same run.
pub trait ProgressSink: Send + 'static {
    fn on_progress(&mut self, line: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(&str) + Send + 'static,
{
    fn on_progress(&mut self, line: &str) {
        self(line)
    }
}
