//! Resolution of the external executables.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::error::FetchError;
use crate::config::ToolsConfig;

const DEFAULT_REMUXER: &str = "ffmpeg";

/// Resolved executable paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub fetcher: PathBuf,
    /// `None` when no remux helper is installed; strategies needing one fail.
    pub remuxer: Option<PathBuf>,
    /// Name the remuxer was looked up by, for error reporting.
    remuxer_name: PathBuf,
}

impl ToolPaths {
    /// Uses the given paths as-is, without touching the filesystem.
    pub fn new(fetcher: impl Into<PathBuf>, remuxer: Option<PathBuf>) -> Self {
        let remuxer_name = remuxer
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REMUXER));
        Self {
            fetcher: fetcher.into(),
            remuxer,
            remuxer_name,
        }
    }

    /// Resolves configured tools. The fetcher is mandatory, the remuxer is not.
    pub fn resolve(config: &ToolsConfig) -> Result<Self, FetchError> {
        let fetcher = locate(&config.fetcher).ok_or_else(|| FetchError::FetcherNotFound {
            path: config.fetcher.clone(),
        })?;

        let remuxer = locate(&config.remuxer);
        if remuxer.is_none() {
            warn!(
                "Remux helper {} not found; strategies that need it will fail",
                config.remuxer.display()
            );
        }

        debug!(fetcher = %fetcher.display(), remuxer = ?remuxer, "Resolved tools");
        Ok(Self {
            fetcher,
            remuxer,
            remuxer_name: config.remuxer.clone(),
        })
    }

    /// Path of the remux helper, or the error a strategy needing it should raise.
    pub fn require_remuxer(&self) -> Result<&Path, FetchError> {
        self.remuxer
            .as_deref()
            .ok_or_else(|| FetchError::RemuxerNotFound {
                path: self.remuxer_name.clone(),
            })
    }
}

/// Bare names are searched on PATH; anything with a directory part must exist.
fn locate(path: &Path) -> Option<PathBuf> {
    if path.components().count() > 1 || path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }
    which::which(path).ok()
}
