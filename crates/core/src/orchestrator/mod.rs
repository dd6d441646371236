//! Download orchestrator for escalating fetch attempts.
//!
//! The orchestrator drives one request at a time through its strategy plan:
//! - **Escalation**: strategies run in order until one exits successfully
//! - **Cookie fallback**: a locked cookie store restarts the plan without cookies
//! - **Cancellation**: any thread can stop the run and kill the live process

mod runner;
mod types;

pub use runner::{CancelHandle, DownloadOrchestrator, RunHandle};
pub use types::{
    AttemptRecord, OrchestratorError, PlanKind, ProgressSink, RunOutcome, RunReport,
    EXHAUSTED_REASON,
};
