pub mod config;
pub mod fetcher;
pub mod orchestrator;
pub mod request;
pub mod strategy;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError,
};
pub use fetcher::{
    classify_line, parse_progress, FetchError, MediaMetadata, MetadataProbe, OutputTag,
    OutputTags, ProcessLauncher, ProgressSnapshot, SystemLauncher, ToolPaths,
};
pub use orchestrator::{
    CancelHandle, DownloadOrchestrator, OrchestratorError, ProgressSink, RunHandle, RunOutcome,
    RunReport,
};
pub use request::{parse_cookie_source, Browser, DownloadRequest};
pub use strategy::{FetchProfile, StrategyBuilder, StrategyKind, StrategyPlan};
