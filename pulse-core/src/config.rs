use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::alert::{Coordinates, DEFAULT_CENTER, DEFAULT_LOCATION};
use crate::error::ConfigError;

pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub feed: FeedConfig,
    pub source: SourceConfig,
    pub backend: BackendConfig,
}

/// Refresh cadence and per-request resilience of the feed controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u8,
    pub retry_backoff_ms: u64,
}

/// Knobs of the simulated backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub batch_size: usize,
    pub latency_ms: u64,
    pub feedback_latency_ms: u64,
    pub analytics_latency_ms: u64,
    pub interests_latency_ms: u64,
    pub search_latency_ms: u64,
    pub location: String,
    pub center: Coordinates,
    pub spread_degrees: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    #[default]
    Mock,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub mode: BackendMode,
    pub base_url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            request_timeout_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            latency_ms: 800,
            feedback_latency_ms: 300,
            analytics_latency_ms: 200,
            interests_latency_ms: 500,
            search_latency_ms: 400,
            location: DEFAULT_LOCATION.to_owned(),
            center: DEFAULT_CENTER,
            spread_degrees: 0.01,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Mock,
            base_url: "http://localhost:3001/api".to_owned(),
        }
    }
}

impl FeedConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delay before retry number `attempt + 1`, doubling from `retry_backoff_ms`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

impl SourceConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

impl PulseConfig {
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        let app_config_dir = config_dir.join("pulse-bengaluru");
        std::fs::create_dir_all(&app_config_dir)?;
        Ok(app_config_dir.join("config.json"))
    }

    /// Loads the user configuration, falling back to (and writing out) defaults.
    pub fn load() -> Self {
        let loaded = Self::config_file_path().and_then(|path| Self::from_file(&path));
        match loaded {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "could not load configuration, using defaults");
                let default_config = Self::default();
                if let Err(save_err) = default_config.save() {
                    warn!(error = %save_err, "could not save default configuration");
                }
                default_config
            }
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PulseConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::config_file_path()?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "feed.refresh_interval_secs must be greater than 0".into(),
            ));
        }
        if self.feed.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "feed.request_timeout_secs must be greater than 0".into(),
            ));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.source.batch_size) {
            return Err(ConfigError::Invalid(format!(
                "source.batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if !self.source.spread_degrees.is_finite() || self.source.spread_degrees < 0.0 {
            return Err(ConfigError::Invalid(
                "source.spread_degrees must be a non-negative number".into(),
            ));
        }
        Url::parse(&self.backend.base_url)
            .map_err(|err| ConfigError::Invalid(format!("backend.base_url: {err}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_take_defaults() {
        let config: PulseConfig =
            serde_json::from_str(r#"{ "feed": { "refresh_interval_secs": 5 } }"#).unwrap();
        assert_eq!(config.feed.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.feed.max_retries, 2);
        assert_eq!(config.source.batch_size, 8);
        assert_eq!(config.backend.mode, BackendMode::Mock);
        config.validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = PulseConfig::default();
        config.source.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PulseConfig::default();
        config.backend.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PulseConfig::default();
        config.feed.refresh_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let feed = FeedConfig::default();
        assert_eq!(feed.backoff_for(0), Duration::from_millis(500));
        assert_eq!(feed.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(feed.backoff_for(2), Duration::from_millis(2000));
    }

    #[test]
    fn config_round_trips_through_a_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = PulseConfig::default();
        config.backend.mode = BackendMode::Http;
        config.save_to(&path).unwrap();

        let loaded = PulseConfig::from_file(&path).unwrap();
        assert_eq!(loaded.backend.mode, BackendMode::Http);
    }
}
