//! Client configuration.
//!
//! Resolution order: built-in defaults, then
//! `<config_dir>/reelshop/config.json`, then `REELSHOP_*` environment
//! variables. Command line flags are layered on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{api, feed, prefetch};
use crate::error::ConfigError;

pub const ENV_API_URL: &str = "REELSHOP_API_URL";
pub const ENV_SIGNUP_URL: &str = "REELSHOP_SIGNUP_URL";
pub const ENV_CURRENCY: &str = "REELSHOP_CURRENCY";

const APP_DIR: &str = "reelshop";
const CONFIG_FILE: &str = "config.json";
const LIKES_FILE: &str = "liked_products.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub api_base_url: String,
    pub signup_url: Option<String>,
    pub currency: String,
    pub request_timeout_ms: u64,
    pub page_limit: u32,
    pub display_batch: usize,
    pub likes_path: Option<PathBuf>,
    pub prefetch: PrefetchConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_base_url: api::DEFAULT_BASE_URL.to_string(),
            signup_url: None,
            currency: reelshop_model::price::DEFAULT_CURRENCY.to_string(),
            request_timeout_ms: api::REQUEST_TIMEOUT.as_millis() as u64,
            page_limit: api::INITIAL_PAGE_LIMIT,
            display_batch: feed::DISPLAY_BATCH,
            likes_path: None,
            prefetch: PrefetchConfig::default(),
        }
    }
}

/// Knobs for the media prefetch pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub max_concurrent: usize,
    pub next_lead_delay_ms: u64,
    pub next_rest_delay_ms: u64,
    pub scroll_settle_ms: u64,
    pub in_view_threshold: f32,
    pub load_more_threshold: f32,
    pub autoplay: bool,
    pub autoplay_interval_ms: u64,
    pub video_probe_bytes: u64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: prefetch::MAX_CONCURRENT_LOADS,
            next_lead_delay_ms: prefetch::NEXT_LEAD_DELAY.as_millis() as u64,
            next_rest_delay_ms: prefetch::NEXT_REST_DELAY.as_millis() as u64,
            scroll_settle_ms: feed::SCROLL_SETTLE.as_millis() as u64,
            in_view_threshold: feed::IN_VIEW_THRESHOLD,
            load_more_threshold: feed::LOAD_MORE_THRESHOLD,
            autoplay: true,
            autoplay_interval_ms: feed::AUTOPLAY_INTERVAL.as_millis() as u64,
            video_probe_bytes: prefetch::VIDEO_PROBE_BYTES,
        }
    }
}

impl PrefetchConfig {
    pub fn next_lead_delay(&self) -> Duration {
        Duration::from_millis(self.next_lead_delay_ms)
    }

    pub fn next_rest_delay(&self) -> Duration {
        Duration::from_millis(self.next_rest_delay_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn autoplay_interval(&self) -> Duration {
        Duration::from_millis(self.autoplay_interval_ms)
    }
}

impl FeedConfig {
    /// Load configuration from the user config directory and environment.
    ///
    /// A missing config file is not an error; an unreadable or malformed one
    /// is logged and ignored so the client can still start.
    pub fn load() -> Self {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!(
                        "[Config] Ignoring {}: {}",
                        path.display(),
                        err
                    );
                    Self::default()
                }
            },
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str::<FeedConfig>(&content)?;
        Ok(config)
    }

    /// Override fields from environment-style lookups.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(url) = non_empty(ENV_SIGNUP_URL) {
            self.signup_url = Some(url);
        }
        if let Some(currency) = non_empty(ENV_CURRENCY) {
            self.currency = currency.to_ascii_uppercase();
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api_base_url",
                reason: "must not be empty".into(),
            });
        }
        if self.currency.len() != 3
            || !self.currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(ConfigError::Invalid {
                field: "currency",
                reason: format!("'{}' is not a three letter code", self.currency),
            });
        }
        if self.display_batch == 0 {
            return Err(ConfigError::Invalid {
                field: "display_batch",
                reason: "must be at least 1".into(),
            });
        }
        if self.prefetch.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                field: "prefetch.max_concurrent",
                reason: "must be at least 1".into(),
            });
        }
        for (field, value) in [
            ("prefetch.in_view_threshold", self.prefetch.in_view_threshold),
            (
                "prefetch.load_more_threshold",
                self.prefetch.load_more_threshold,
            ),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is outside (0, 1]"),
                });
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Where liked product ids are persisted.
    pub fn likes_file(&self) -> Option<PathBuf> {
        self.likes_path
            .clone()
            .or_else(|| app_dir().map(|dir| dir.join(LIKES_FILE)))
    }

    pub fn config_path() -> Option<PathBuf> {
        app_dir().map(|dir| dir.join(CONFIG_FILE))
    }
}

fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"api_base_url": "https://feed.example", "prefetch": {"max_concurrent": 2}}"#,
        )
        .unwrap();

        let config = FeedConfig::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "https://feed.example");
        assert_eq!(config.prefetch.max_concurrent, 2);
        assert_eq!(config.prefetch.next_lead_delay_ms, 50);
        assert_eq!(config.currency, "USD");
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "https://env.example"),
            (ENV_CURRENCY, "eur"),
            (ENV_SIGNUP_URL, "   "),
        ]);
        let mut config = FeedConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_base_url, "https://env.example");
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.signup_url, None);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = FeedConfig::default();
        config.display_batch = 8;
        config.save_to(&path).unwrap();

        assert_eq!(FeedConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = FeedConfig::default();
        assert!(config.validate().is_ok());

        config.currency = "dollars".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "currency", .. })
        ));

        let mut config = FeedConfig::default();
        config.prefetch.in_view_threshold = 0.0;
        assert!(config.validate().is_err());
    }
}
