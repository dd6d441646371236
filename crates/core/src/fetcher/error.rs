//! Error types for the fetcher module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while launching or talking to the external fetch tool.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Fetch executable not found.
    #[error("fetch executable not found at path: {path}")]
    FetcherNotFound { path: PathBuf },

    /// Remux helper required by a strategy is not available.
    #[error("remux executable not found: {path}")]
    RemuxerNotFound { path: PathBuf },

    /// The process could not be started for another reason.
    #[error("failed to start {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while reading output or waiting for exit.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata probe exited unsuccessfully.
    #[error("metadata probe failed: {reason}")]
    ProbeFailed { reason: String },

    /// Metadata output could not be parsed.
    #[error("failed to parse metadata: {reason}")]
    ParseError { reason: String },

    /// Probe timed out.
    #[error("metadata probe timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

impl FetchError {
    /// Maps a spawn failure, distinguishing a missing executable.
    pub fn from_spawn(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FetcherNotFound { path }
        } else {
            Self::Spawn { path, source }
        }
    }

    /// Whether this error means an executable could not be launched at all.
    pub fn is_launch_error(&self) -> bool {
        matches!(
            self,
            Self::FetcherNotFound { .. } | Self::RemuxerNotFound { .. } | Self::Spawn { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_spawn_not_found() {
        let err = FetchError::from_spawn("yt-dlp", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, FetchError::FetcherNotFound { .. }));
        assert_eq!(err.to_string(), "fetch executable not found at path: yt-dlp");
        assert!(err.is_launch_error());
    }

    #[test]
    fn test_from_spawn_permission_denied() {
        let err = FetchError::from_spawn(
            "/bin/yt-dlp",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, FetchError::Spawn { .. }));
        assert!(err.is_launch_error());
    }

    #[test]
    fn test_probe_errors_are_not_launch_errors() {
        assert!(!FetchError::Timeout { timeout_secs: 30 }.is_launch_error());
        assert!(!FetchError::ProbeFailed {
            reason: "exit 1".to_string()
        }
        .is_launch_error());
    }
}
