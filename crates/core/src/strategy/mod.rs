//! Strategy escalation for the fetch tool.
//!
//! Every request is attempted with the same four strategies, each trading
//! speed or simplicity for resilience:
//!
//! 1. `default`: requested format, direct fetch
//! 2. `segmented-fallback`: segmented format, legacy transport relaxed
//! 3. `external-remux`: requested format, transport via the remux helper
//! 4. `throttled-segmented-fallback`: segmented format, remux helper, paced requests

mod builder;
mod profile;

pub use builder::{Strategy, StrategyBuilder, StrategyKind, StrategyPlan};
pub use profile::{origin_of, FetchProfile, REMUX_DOWNLOADER_ARGS, SEGMENTED_FORMAT};
