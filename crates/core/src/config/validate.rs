use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Tool paths are not empty
/// - User agent is set and the fallback referer is an absolute URL
/// - Cookie browser name is known
/// - Probe timeout and throttle delay are sane
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.tools.fetcher.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "tools.fetcher cannot be empty".to_string(),
        ));
    }

    if config.tools.remuxer.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "tools.remuxer cannot be empty".to_string(),
        ));
    }

    if config.identity.user_agent.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "identity.user_agent cannot be empty".to_string(),
        ));
    }

    if url::Url::parse(&config.identity.fallback_referer).is_err() {
        return Err(ConfigError::ValidationError(format!(
            "identity.fallback_referer is not a valid URL: {}",
            config.identity.fallback_referer
        )));
    }

    if let Some(bad) = config
        .identity
        .extra_headers
        .iter()
        .find(|h| !h.contains(':'))
    {
        return Err(ConfigError::ValidationError(format!(
            "identity.extra_headers entry must be Name:Value, got {bad}"
        )));
    }

    config
        .download
        .cookie_source()
        .map_err(|e| ConfigError::ValidationError(format!("download.cookies_from_browser: {e}")))?;

    if config.download.merge_output_format.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "download.merge_output_format cannot be empty".to_string(),
        ));
    }

    if config.probe.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "probe.timeout_secs cannot be 0".to_string(),
        ));
    }

    if !config.throttle.sleep_requests_secs.is_finite() || config.throttle.sleep_requests_secs < 0.0
    {
        return Err(ConfigError::ValidationError(
            "throttle.sleep_requests_secs must be a non-negative number".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_fetcher_fails() {
        let mut config = Config::default();
        config.tools.fetcher = PathBuf::new();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_unknown_browser_fails() {
        let mut config = Config::default();
        config.download.cookies_from_browser = "mosaic".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("cookies_from_browser"));
    }

    #[test]
    fn test_validate_bad_referer_fails() {
        let mut config = Config::default();
        config.identity.fallback_referer = "not a url".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_header_without_colon_fails() {
        let mut config = Config::default();
        config.identity.extra_headers = vec!["DNT 1".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_probe_timeout_fails() {
        let mut config = Config::default();
        config.probe.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_negative_sleep_fails() {
        let mut config = Config::default();
        config.throttle.sleep_requests_secs = -1.0;
        assert!(validate_config(&config).is_err());
    }
}
