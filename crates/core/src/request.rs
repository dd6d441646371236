//! Download request types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Format selector used when the caller does not supply one.
pub const DEFAULT_FORMAT: &str = "bv*+ba/b";

/// Browsers the fetch tool can extract cookies from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Firefox,
    Chrome,
    Chromium,
    Brave,
    Edge,
    Opera,
}

impl Browser {
    /// All supported browsers, in menu order.
    pub const ALL: [Browser; 6] = [
        Browser::Firefox,
        Browser::Chrome,
        Browser::Chromium,
        Browser::Brave,
        Browser::Edge,
        Browser::Opera,
    ];

    /// Name understood by the fetch tool's `--cookies-from-browser` flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Firefox => "firefox",
            Browser::Chrome => "chrome",
            Browser::Chromium => "chromium",
            Browser::Brave => "brave",
            Browser::Edge => "edge",
            Browser::Opera => "opera",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown cookie browser: {0} (expected one of firefox, chrome, chromium, brave, edge, opera, none)")]
pub struct UnknownBrowser(pub String);

impl FromStr for Browser {
    type Err = UnknownBrowser;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Browser::ALL
            .into_iter()
            .find(|b| b.as_str() == wanted)
            .ok_or_else(|| UnknownBrowser(s.to_string()))
    }
}

/// Parses a cookie source name where `none` (or an empty string) disables cookies.
pub fn parse_cookie_source(s: &str) -> Result<Option<Browser>, UnknownBrowser> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    trimmed.parse().map(Some)
}

/// One logical download. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Page or media URL handed to the fetch tool.
    pub url: String,
    /// Directory the output template is rooted in.
    pub output_dir: PathBuf,
    /// Opaque format selector passed through to the fetch tool.
    pub format: String,
    /// Browser to pull cookies from, if any.
    pub cookie_source: Option<Browser>,
}

impl DownloadRequest {
    /// Creates a request with the default format and no cookie source.
    pub fn new(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            format: DEFAULT_FORMAT.to_string(),
            cookie_source: None,
        }
    }

    /// Sets the format selector.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Sets the cookie source.
    pub fn with_cookies(mut self, browser: Option<Browser>) -> Self {
        self.cookie_source = browser;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_parse_case_insensitive() {
        assert_eq!("Firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert_eq!(" BRAVE ".parse::<Browser>().unwrap(), Browser::Brave);
        assert!("netscape".parse::<Browser>().is_err());
    }

    #[test]
    fn test_parse_cookie_source_none() {
        assert_eq!(parse_cookie_source("none").unwrap(), None);
        assert_eq!(parse_cookie_source("NONE").unwrap(), None);
        assert_eq!(parse_cookie_source("").unwrap(), None);
        assert_eq!(parse_cookie_source("edge").unwrap(), Some(Browser::Edge));
    }

    #[test]
    fn test_unknown_browser_message() {
        let err = parse_cookie_source("lynx").unwrap_err();
        assert!(err.to_string().starts_with("unknown cookie browser: lynx"));
    }

    #[test]
    fn test_request_builder() {
        let request = DownloadRequest::new("https://example.com/v/1", "/tmp/out")
            .with_format("best")
            .with_cookies(Some(Browser::Chrome));
        assert_eq!(request.format, "best");
        assert_eq!(request.cookie_source, Some(Browser::Chrome));
        assert_eq!(request.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_request_defaults() {
        let request = DownloadRequest::new("https://example.com", "out");
        assert_eq!(request.format, DEFAULT_FORMAT);
        assert!(request.cookie_source.is_none());
    }

    #[test]
    fn test_browser_serde_lowercase() {
        let json = serde_json::to_string(&Browser::Chromium).unwrap();
        assert_eq!(json, "\"chromium\"");
    }
}
