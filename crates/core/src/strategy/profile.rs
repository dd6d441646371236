//! Fixed browser identity and pacing shared by every strategy.

use url::Url;

use crate::config::Config;

/// Format selection forcing segmented (HLS) delivery.
pub const SEGMENTED_FORMAT: &str = "best[protocol^=m3u8]/best";

/// Arguments handed to the external remux helper when it takes over transport.
pub const REMUX_DOWNLOADER_ARGS: &str = "ffmpeg:-hide_banner -loglevel warning";

/// Immutable identity, container and throttle settings.
///
/// Built once when the orchestrator is constructed and shared by every plan
/// it builds.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchProfile {
    pub user_agent: String,
    pub fallback_referer: String,
    /// Browser-like headers sent with every strategy, in order.
    pub headers: Vec<(String, String)>,
    pub merge_output_format: String,
    pub output_template: String,
    pub segmented_format: String,
    pub remux_downloader_args: String,
    pub sleep_requests_secs: f64,
    pub extractor_retries: u32,
}

impl FetchProfile {
    pub fn from_config(config: &Config) -> Self {
        let identity = &config.identity;
        let mut headers = vec![
            ("Accept".to_string(), identity.accept.clone()),
            ("Accept-Language".to_string(), identity.accept_language.clone()),
            ("Sec-Fetch-Mode".to_string(), "navigate".to_string()),
        ];
        headers.extend(identity.extra_headers.iter().filter_map(|raw| {
            let (name, value) = raw.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        }));

        Self {
            user_agent: identity.user_agent.clone(),
            fallback_referer: identity.fallback_referer.clone(),
            headers,
            merge_output_format: config.download.merge_output_format.clone(),
            output_template: config.download.output_template.clone(),
            segmented_format: SEGMENTED_FORMAT.to_string(),
            remux_downloader_args: REMUX_DOWNLOADER_ARGS.to_string(),
            sleep_requests_secs: config.throttle.sleep_requests_secs,
            extractor_retries: config.throttle.extractor_retries,
        }
    }

    /// Referer for `url`: its own scheme and host, or the fallback.
    pub fn referer_for(&self, url: &str) -> String {
        origin_of(url)
            .map(|origin| format!("{origin}/"))
            .unwrap_or_else(|| self.fallback_referer.clone())
    }
}

impl Default for FetchProfile {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// `scheme://host[:port]` of `url`, when it has a tuple origin.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    origin
        .is_tuple()
        .then(|| origin.ascii_serialization())
}
