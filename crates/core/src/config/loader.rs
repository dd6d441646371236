use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment prefix for overrides, e.g. `YTGRAB_DOWNLOAD__FORMAT=best`.
const ENV_PREFIX: &str = "YTGRAB_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration starting from built-in defaults.
///
/// The file is optional here; a missing file leaves the defaults (plus any
/// environment overrides) in place.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = path.filter(|p| p.exists()) {
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[download]
format = "best"

[probe]
timeout_secs = 10
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.download.format, "best");
        assert_eq!(config.probe.timeout_secs, 10);
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[probe]
timeout_secs = "soon"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/ytgrab.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[tools]
fetcher = "/usr/local/bin/yt-dlp"

[download]
merge_output_format = "mkv"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.tools.fetcher, PathBuf::from("/usr/local/bin/yt-dlp"));
        assert_eq!(config.download.merge_output_format, "mkv");
        assert_eq!(config.download.format, "bv*+ba/b");
    }

    #[test]
    fn test_load_config_or_default_without_file() {
        let config = load_config_or_default(Some(Path::new("/nonexistent/ytgrab.toml"))).unwrap();
        assert_eq!(config.tools.fetcher, PathBuf::from("yt-dlp"));
        assert_eq!(config.throttle.extractor_retries, 3);
    }

    #[test]
    fn test_load_config_or_default_merges_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[throttle]
extractor_retries = 7
"#
        )
        .unwrap();

        let config = load_config_or_default(Some(temp_file.path())).unwrap();
        assert_eq!(config.throttle.extractor_retries, 7);
        assert_eq!(config.throttle.sleep_requests_secs, 1.5);
    }
}
