//! Controller and client settings.
//!
//! Every field has a default, so a settings file only needs the values it
//! changes:
//!
//! ```json
//! {
//!   "controller": { "refresh_ms": 4000, "provider": "idp" },
//!   "http": { "base_url": "https://stats.example.org", "user": "ops" }
//! }
//! ```

use rankreel_core::{
    aggregation::{Provider, DEFAULT_STATE},
    http::HttpSettings,
    period::Mode,
    ranking::MAX_DISPLAY,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;

/// Time between two polls.
pub const REFRESH_MS: u64 = 5750;
/// Duration of one animated transition.
pub const ANIMATION_MS: u64 = 1350;
/// Extra time after a transition before the pending ranking is promoted.
pub const SETTLE_MS: u64 = 650;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub refresh_ms: u64,
    pub animation_ms: u64,
    pub settle_ms: u64,
    pub max_display: usize,
    pub include_unique: bool,
    pub state: String,
    pub provider: Provider,
    pub mode: Mode,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            refresh_ms: REFRESH_MS,
            animation_ms: ANIMATION_MS,
            settle_ms: SETTLE_MS,
            max_display: MAX_DISPLAY,
            include_unique: false,
            state: DEFAULT_STATE.to_string(),
            provider: Provider::default(),
            mode: Mode::default(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_ms == 0 {
            return Err(ConfigError::Invalid("refresh_ms must be positive".to_string()));
        }
        if self.max_display == 0 {
            return Err(ConfigError::Invalid("max_display must be positive".to_string()));
        }
        if self.state.trim().is_empty() {
            return Err(ConfigError::Invalid("state must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_ms)
    }

    /// Time from the start of a transition until its ranking is promoted.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.animation_ms + self.settle_ms)
    }
}

/// Contents of a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub controller: ControllerConfig,
    pub http: HttpSettings,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Settings::from_json(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(data: &str) -> Result<Settings, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.refresh_period(), Duration::from_millis(5750));
        assert_eq!(config.animation_duration(), Duration::from_millis(1350));
        assert_eq!(config.settle_delay(), Duration::from_millis(2000));
        assert_eq!(config.max_display, 15);
        assert_eq!(config.state, "prodaccepted");
        assert_eq!(config.provider, Provider::Sp);
        assert_eq!(config.mode, Mode::Aggregate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_settings_file() {
        let settings = Settings::from_json(
            r#"{"controller": {"refresh_ms": 4000, "provider": "idp", "mode": "raw"},
                "http": {"base_url": "https://stats.example.org"}}"#,
        )
        .unwrap();
        assert_eq!(settings.controller.refresh_ms, 4000);
        assert_eq!(settings.controller.provider, Provider::Idp);
        assert_eq!(settings.controller.mode, Mode::Raw);
        assert_eq!(settings.controller.animation_ms, ANIMATION_MS);
        assert_eq!(settings.http.base_url, "https://stats.example.org");
        assert_eq!(settings.http.max_tries, 3);
    }

    #[test]
    fn test_validate_rejects_zero_refresh() {
        let config = ControllerConfig {
            refresh_ms: 0,
            ..ControllerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load("/nonexistent/rankreel.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
