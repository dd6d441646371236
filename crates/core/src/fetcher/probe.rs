//! One-shot metadata lookup, outside the retry machinery.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::error::FetchError;
use crate::request::Browser;
use crate::strategy::FetchProfile;

/// Subset of the fetch tool's single-document JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uploader: Option<String>,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub extractor_key: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
    #[serde(default, skip_serializing)]
    formats: Vec<serde_json::Value>,
}

impl MediaMetadata {
    /// Number of formats the remote offers.
    pub fn format_count(&self) -> usize {
        self.formats.len()
    }
}

/// Runs the fetch tool in no-download mode to read metadata.
pub struct MetadataProbe {
    fetcher: PathBuf,
    profile: Arc<FetchProfile>,
    timeout_secs: u64,
}

impl MetadataProbe {
    pub fn new(fetcher: impl Into<PathBuf>, profile: Arc<FetchProfile>, timeout_secs: u64) -> Self {
        Self {
            fetcher: fetcher.into(),
            profile,
            timeout_secs,
        }
    }

    /// Fetches metadata for `url`. Any failure is logged and reported as `None`.
    pub async fn probe(&self, url: &str, cookies: Option<Browser>) -> Option<MediaMetadata> {
        match self.try_probe(url, cookies).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Metadata unavailable for {}: {}", url, e);
                None
            }
        }
    }

    async fn try_probe(
        &self,
        url: &str,
        cookies: Option<Browser>,
    ) -> Result<MediaMetadata, FetchError> {
        let args = self.probe_args(url, cookies);
        debug!(fetcher = %self.fetcher.display(), "Probing metadata");

        let command = Command::new(&self.fetcher)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = timeout(Duration::from_secs(self.timeout_secs), command)
            .await
            .map_err(|_| FetchError::Timeout {
                timeout_secs: self.timeout_secs,
            })?
            .map_err(|e| FetchError::from_spawn(&self.fetcher, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim().to_string();
            return Err(FetchError::ProbeFailed {
                reason: format!("exit code {:?}: {}", output.status.code(), last_line),
            });
        }

        parse_metadata(&String::from_utf8_lossy(&output.stdout))
    }

    /// Argument vector for a metadata-only invocation.
    pub fn probe_args(&self, url: &str, cookies: Option<Browser>) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-download".to_string(),
            "--no-playlist".to_string(),
            "--no-check-certificate".to_string(),
            "--geo-bypass".to_string(),
        ];

        if let Some(browser) = cookies {
            args.extend(["--cookies-from-browser".to_string(), browser.to_string()]);
        }

        args.extend([
            "--user-agent".to_string(),
            self.profile.user_agent.clone(),
            "--referer".to_string(),
            self.profile.referer_for(url),
            url.to_string(),
        ]);

        args
    }
}

/// Parses the single JSON document printed by the fetch tool.
pub fn parse_metadata(output: &str) -> Result<MediaMetadata, FetchError> {
    serde_json::from_str(output.trim()).map_err(|e| FetchError::ParseError {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> MetadataProbe {
        MetadataProbe::new("yt-dlp", Arc::new(FetchProfile::default()), 30)
    }

    #[test]
    fn test_probe_args_with_cookies() {
        let args = probe().probe_args("https://example.com/v/1", Some(Browser::Firefox));
        assert_eq!(args[0], "--dump-single-json");
        assert!(args.contains(&"--no-download".to_string()));
        let idx = args.iter().position(|a| a == "--cookies-from-browser").unwrap();
        assert_eq!(args[idx + 1], "firefox");
        let idx = args.iter().position(|a| a == "--referer").unwrap();
        assert_eq!(args[idx + 1], "https://example.com/");
        assert_eq!(args.last().unwrap(), "https://example.com/v/1");
    }

    #[test]
    fn test_probe_args_without_cookies() {
        let args = probe().probe_args("https://example.com/v/1", None);
        assert!(!args.contains(&"--cookies-from-browser".to_string()));
    }

    #[test]
    fn test_parse_metadata() {
        let json = r#"{
            "id": "abc123",
            "title": "A Video",
            "uploader": "Someone",
            "duration": 212.5,
            "extractor_key": "Youtube",
            "webpage_url": "https://example.com/v/abc123",
            "formats": [{"format_id": "18"}, {"format_id": "22"}],
            "unrelated": {"nested": true}
        }"#;
        let metadata = parse_metadata(json).unwrap();
        assert_eq!(metadata.id, "abc123");
        assert_eq!(metadata.title, "A Video");
        assert_eq!(metadata.duration, Some(212.5));
        assert_eq!(metadata.format_count(), 2);
        assert!(metadata.thumbnail.is_none());
    }

    #[test]
    fn test_parse_metadata_malformed() {
        let result = parse_metadata("ERROR: not json");
        assert!(matches!(result, Err(FetchError::ParseError { .. })));
    }

    #[tokio::test]
    async fn test_probe_missing_fetcher_fails_soft() {
        let probe = MetadataProbe::new(
            "/nonexistent/yt-dlp",
            Arc::new(FetchProfile::default()),
            5,
        );
        assert!(probe.probe("https://example.com", None).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_non_zero_exit_fails_soft() {
        let probe = MetadataProbe::new("/bin/false", Arc::new(FetchProfile::default()), 5);
        assert!(probe.probe("https://example.com", None).await.is_none());
    }
}
