//! Testing utilities for driving the orchestrator without real processes.
//!
//! # Example
//!
//! ```rust,ignore
//! use ytgrab_core::testing::{LineRecorder, ScriptedAttempt, ScriptedLauncher};
//!
//! let launcher = Arc::new(ScriptedLauncher::new());
//! launcher.push(ScriptedAttempt::success(vec!["[download] 100% of 10MiB"]));
//!
//! let recorder = LineRecorder::new();
//! let handle = orchestrator.begin(request, recorder.sink())?;
//! let report = handle.wait().await;
//! ```

mod scripted_launcher;

pub use scripted_launcher::{LineRecorder, RecordedLaunch, ScriptedAttempt, ScriptedLauncher};
