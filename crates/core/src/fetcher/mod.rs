//! Boundary with the external fetch tool.
//!
//! - [`ProcessLauncher`] / [`FetchProcess`]: start one process, stream its
//!   merged output line by line, wait for exit, kill on demand
//! - [`classify_line`]: failure signatures in a single output line
//! - [`parse_progress`]: percentage extraction for progress display
//! - [`MetadataProbe`]: no-download metadata lookup with a timeout
//! - [`ToolPaths`]: resolved fetcher and remuxer executables

mod classifier;
mod error;
mod probe;
mod process;
mod progress;
mod tools;

pub use classifier::{classify_line, OutputTag, OutputTags};
pub use error::FetchError;
pub use probe::{parse_metadata, MediaMetadata, MetadataProbe};
pub use process::{
    ExitOutcome, FetchProcess, ProcessLauncher, SystemLauncher, SystemProcess, Terminator,
};
pub use progress::{parse_progress, ProgressSnapshot};
pub use tools::ToolPaths;
