//! Ordered strategy plans for one request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::profile::{origin_of, FetchProfile};
use crate::request::{Browser, DownloadRequest};

/// Escalation steps, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Requested format, direct fetch.
    Default,
    /// Segmented format, legacy transport relaxed.
    SegmentedFallback,
    /// Requested format, transport handed to the remux helper.
    ExternalRemux,
    /// Segmented format, remux helper, throttled requests.
    ThrottledSegmentedFallback,
}

impl StrategyKind {
    /// Plan order.
    pub const ESCALATION: [StrategyKind; 4] = [
        StrategyKind::Default,
        StrategyKind::SegmentedFallback,
        StrategyKind::ExternalRemux,
        StrategyKind::ThrottledSegmentedFallback,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Default => "default",
            StrategyKind::SegmentedFallback => "segmented-fallback",
            StrategyKind::ExternalRemux => "external-remux",
            StrategyKind::ThrottledSegmentedFallback => "throttled-segmented-fallback",
        }
    }

    fn segmented(&self) -> bool {
        matches!(
            self,
            StrategyKind::SegmentedFallback | StrategyKind::ThrottledSegmentedFallback
        )
    }

    /// Whether the strategy hands transport to the external remux helper.
    pub fn uses_remuxer(&self) -> bool {
        matches!(
            self,
            StrategyKind::ExternalRemux | StrategyKind::ThrottledSegmentedFallback
        )
    }

    fn relaxes_legacy_transport(&self) -> bool {
        !matches!(self, StrategyKind::Default)
    }

    fn throttled(&self) -> bool {
        matches!(self, StrategyKind::ThrottledSegmentedFallback)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One escalation step with its full argument vector (URL last).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub kind: StrategyKind,
    pub label: String,
    pub args: Vec<String>,
}

impl Strategy {
    pub fn requires_remuxer(&self) -> bool {
        self.kind.uses_remuxer()
    }
}

/// Strategies to attempt, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyPlan {
    strategies: Vec<Strategy>,
    cookies: Option<Browser>,
}

impl StrategyPlan {
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Strategy> {
        self.strategies.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.iter()
    }

    /// Cookie source every strategy in this plan extracts from.
    pub fn cookies(&self) -> Option<Browser> {
        self.cookies
    }
}

/// Builds strategy plans from a shared [`FetchProfile`].
#[derive(Debug, Clone)]
pub struct StrategyBuilder {
    profile: Arc<FetchProfile>,
    remuxer: Option<PathBuf>,
}

impl StrategyBuilder {
    pub fn new(profile: Arc<FetchProfile>, remuxer: Option<PathBuf>) -> Self {
        Self { profile, remuxer }
    }

    pub fn profile(&self) -> &FetchProfile {
        &self.profile
    }

    /// Builds the four-step plan for `request` using `cookies` as the cookie
    /// source (passed separately so a cookie-less plan can be rebuilt).
    pub fn build_plan(&self, request: &DownloadRequest, cookies: Option<Browser>) -> StrategyPlan {
        let strategies = StrategyKind::ESCALATION
            .iter()
            .map(|kind| Strategy {
                kind: *kind,
                label: kind.label().to_string(),
                args: self.build_args(*kind, request, cookies),
            })
            .collect();

        StrategyPlan {
            strategies,
            cookies,
        }
    }

    fn build_args(
        &self,
        kind: StrategyKind,
        request: &DownloadRequest,
        cookies: Option<Browser>,
    ) -> Vec<String> {
        let profile = &self.profile;
        let format = if kind.segmented() {
            profile.segmented_format.clone()
        } else {
            request.format.clone()
        };

        let mut args = vec!["-f".to_string(), format];

        if let Some(browser) = cookies {
            args.extend(["--cookies-from-browser".to_string(), browser.to_string()]);
        }

        args.extend([
            "--user-agent".to_string(),
            profile.user_agent.clone(),
            "--referer".to_string(),
            profile.referer_for(&request.url),
        ]);

        for (name, value) in &profile.headers {
            args.extend(["--add-header".to_string(), format!("{name}:{value}")]);
        }
        if let Some(origin) = origin_of(&request.url) {
            args.extend(["--add-header".to_string(), format!("Origin:{origin}")]);
        }

        args.extend([
            "--geo-bypass".to_string(),
            "--no-check-certificate".to_string(),
            "--merge-output-format".to_string(),
            profile.merge_output_format.clone(),
            "--newline".to_string(),
            "-o".to_string(),
            request
                .output_dir
                .join(&profile.output_template)
                .to_string_lossy()
                .to_string(),
        ]);

        if kind.relaxes_legacy_transport() {
            args.push("--legacy-server-connect".to_string());
        }

        if kind.uses_remuxer() {
            args.extend([
                "--downloader".to_string(),
                "ffmpeg".to_string(),
                "--downloader-args".to_string(),
                profile.remux_downloader_args.clone(),
            ]);
            if let Some(remuxer) = &self.remuxer {
                args.extend([
                    "--ffmpeg-location".to_string(),
                    remuxer.to_string_lossy().to_string(),
                ]);
            }
        }

        if kind.throttled() {
            args.extend([
                "--sleep-requests".to_string(),
                profile.sleep_requests_secs.to_string(),
                "--extractor-retries".to_string(),
                profile.extractor_retries.to_string(),
            ]);
        }

        args.push(request.url.clone());
        args
    }
}
