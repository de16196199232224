//! Window session configuration.
//!
//! # Responsibility
//! - Load per-window settings from JSON.
//! - Fill unspecified settings with defaults.
//!
//! # Invariants
//! - A loaded config is validated before it is returned.

use crate::logging::{default_log_level, normalize_level};
use crate::window::navigation::OnChangesFound;
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// How the presenter treats model changes outside the view's interest set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestFilterMode {
    /// Drop changes to names the view did not subscribe to.
    #[default]
    Strict,
    /// Push every change; only log names outside the interest set.
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub window_id: String,
    pub log_level: String,
    pub interest_filter: InterestFilterMode,
    pub on_changes_found: OnChangesFound,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_id: String::new(),
            log_level: default_log_level().to_string(),
            interest_filter: InterestFilterMode::default(),
            on_changes_found: OnChangesFound::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read window config: {err}"),
            Self::Parse(err) => write!(f, "malformed window config: {err}"),
            Self::Invalid(message) => write!(f, "invalid window config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl WindowConfig {
    pub fn for_window(window_id: impl Into<String>) -> Self {
        Self {
            window_id: window_id.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        debug!(
            "event=config_load module=config status=ok window={} path={}",
            config.window_id,
            path.display()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_id.trim().is_empty() {
            return Err(ConfigError::Invalid("window_id cannot be empty".to_string()));
        }
        normalize_level(&self.log_level).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, InterestFilterMode, WindowConfig};
    use crate::window::navigation::OnChangesFound;

    #[test]
    fn missing_settings_take_defaults() {
        let config = WindowConfig::from_json_str(r#"{"window_id":"sales_order"}"#).unwrap();
        assert_eq!(config.interest_filter, InterestFilterMode::Strict);
        assert_eq!(config.on_changes_found, OnChangesFound::Ask);
        assert_eq!(config.log_level, crate::logging::default_log_level());
    }

    #[test]
    fn explicit_settings_are_read() {
        let config = WindowConfig::from_json_str(
            r#"{
                "window_id": "sales_order",
                "log_level": "trace",
                "interest_filter": "advisory",
                "on_changes_found": "block"
            }"#,
        )
        .unwrap();
        assert_eq!(config.interest_filter, InterestFilterMode::Advisory);
        assert_eq!(config.on_changes_found, OnChangesFound::Block);
    }

    #[test]
    fn rejects_bad_level_and_empty_window() {
        let err = WindowConfig::from_json_str(r#"{"window_id":"w","log_level":"loud"}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = WindowConfig::from_json_str("{}").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = WindowConfig::from_json_str(r#"{"window_id":"w","colour":"red"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("window.json");
        std::fs::write(&path, r#"{"window_id":"invoice"}"#).unwrap();
        assert_eq!(WindowConfig::load(&path).unwrap().window_id, "invoice");
    }
}
