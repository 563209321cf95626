use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Configuration file looked up in the working directory when none is given.
pub const CONFIG_FILE_NAME: &str = "pypi-downloads.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Records fetched longer ago than this are fetched again
    #[serde(default = "default_stale_threshold", with = "humantime_serde")]
    pub stale_threshold: Duration,

    /// Minimum time between two checkpoint saves
    #[serde(default = "default_deploy_span", with = "humantime_serde")]
    pub deploy_span: Duration,

    /// Maximum number of stats requests in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_index_url")]
    pub index_url: String,

    #[serde(default = "default_stats_base_url")]
    pub stats_base_url: String,

    #[serde(default = "default_hub_endpoint")]
    pub hub_endpoint: String,
}

const fn default_stale_threshold() -> Duration {
    Duration::from_hours(30 * 24)
}

const fn default_deploy_span() -> Duration {
    Duration::from_mins(5)
}

const fn default_concurrency() -> usize {
    8
}

fn default_index_url() -> String {
    crate::index::DEFAULT_INDEX_URL.to_string()
}

fn default_stats_base_url() -> String {
    crate::stats::DEFAULT_STATS_BASE_URL.to_string()
}

fn default_hub_endpoint() -> String {
    crate::dataset::hub::DEFAULT_HUB_ENDPOINT.to_string()
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(app_err!("concurrency must be at least 1"));
        }

        if self.stale_threshold.is_zero() {
            return Err(app_err!("stale_threshold must be greater than zero"));
        }

        for (key, value) in [
            ("index_url", &self.index_url),
            ("stats_base_url", &self.stats_base_url),
            ("hub_endpoint", &self.hub_endpoint),
        ] {
            let _ = url::Url::parse(value).into_app_err_with(|| format!("{key} '{value}' is not a valid URL"))?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.stale_threshold, Duration::from_secs(30 * 24 * 60 * 60));
        assert_eq!(config.deploy_span, Duration::from_secs(300));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.index_url, "https://pypi.org/simple/");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let config = Config {
            concurrency: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_stale_threshold() {
        let config = Config {
            stale_threshold: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_url() {
        let config = Config {
            stats_base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(toml::from_str::<Config>("concurrenc = 4").is_err());
    }

    #[test]
    fn test_humantime_values() {
        let config: Config = toml::from_str("stale_threshold = \"7days\"\ndeploy_span = \"90s\"").unwrap();
        assert_eq!(config.stale_threshold, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(config.deploy_span, Duration::from_secs(90));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_save_default_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let output_path = base.join(CONFIG_FILE_NAME);
        Config::save_default(&output_path).unwrap();

        let loaded = Config::load(&base, None).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_missing_config_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let config = Config::load(&base, None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_invalid_config_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("custom.toml")).unwrap();
        fs::write(&path, "concurrency = 0\n").unwrap();
        let _ = Config::load(Utf8Path::new("."), Some(&path)).unwrap_err();
    }
}
