use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::request::{parse_cookie_source, Browser, UnknownBrowser, DEFAULT_FORMAT};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// External executables. Bare names are looked up on PATH.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_fetcher")]
    pub fetcher: PathBuf,
    #[serde(default = "default_remuxer")]
    pub remuxer: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fetcher: default_fetcher(),
            remuxer: default_remuxer(),
        }
    }
}

fn default_fetcher() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_remuxer() -> PathBuf {
    PathBuf::from("ffmpeg")
}

/// Browser identity presented to remote hosts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Referer used when the target URL has no usable origin.
    #[serde(default = "default_fallback_referer")]
    pub fallback_referer: String,
    #[serde(default = "default_accept")]
    pub accept: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Additional `Name:Value` headers sent with every strategy.
    #[serde(default)]
    pub extra_headers: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            fallback_referer: default_fallback_referer(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            extra_headers: Vec::new(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string()
}

fn default_fallback_referer() -> String {
    "https://www.google.com/".to_string()
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}

/// Defaults applied to requests that do not override them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_format")]
    pub format: String,
    /// Browser name, or "none" to skip cookie extraction.
    #[serde(default = "default_cookies_from_browser")]
    pub cookies_from_browser: String,
    /// Container every download is normalized to.
    #[serde(default = "default_merge_output_format")]
    pub merge_output_format: String,
    #[serde(default = "default_output_template")]
    pub output_template: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: default_format(),
            cookies_from_browser: default_cookies_from_browser(),
            merge_output_format: default_merge_output_format(),
            output_template: default_output_template(),
        }
    }
}

impl DownloadConfig {
    /// Parsed cookie source (`None` when set to "none").
    pub fn cookie_source(&self) -> Result<Option<Browser>, UnknownBrowser> {
        parse_cookie_source(&self.cookies_from_browser)
    }
}

fn default_output_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("downloads"))
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

fn default_cookies_from_browser() -> String {
    "firefox".to_string()
}

fn default_merge_output_format() -> String {
    "mp4".to_string()
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

/// Request pacing used by the most defensive strategy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThrottleConfig {
    /// Minimum delay between requests, in seconds.
    #[serde(default = "default_sleep_requests")]
    pub sleep_requests_secs: f64,
    #[serde(default = "default_extractor_retries")]
    pub extractor_retries: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            sleep_requests_secs: default_sleep_requests(),
            extractor_retries: default_extractor_retries(),
        }
    }
}

fn default_sleep_requests() -> f64 {
    1.5
}

fn default_extractor_retries() -> u32 {
    3
}

/// Metadata probe settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
        }
    }
}

fn default_probe_timeout() -> u64 {
    30
}
