//! Session configuration
//!
//! Loaded from TOML; unknown keys are rejected and missing keys take their
//! defaults.
//!
//! ```toml
//! autosave_debounce_ms = 500
//! auto_reload = false
//! save_on_close = true
//!
//! [history]
//! enabled = true
//! max_snapshots = 5
//! min_interval_secs = 300
//!
//! [log]
//! level = "info"
//! format = "compact"
//! ```

use crate::error::ConfigError;
use plansync_layout::HistoryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable
    #[default]
    Compact,
    /// Multi-line human readable
    Pretty,
    /// Newline-delimited JSON
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Colored output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            ansi: true,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Quiet period after the last edit before saving
    pub autosave_debounce_ms: u64,
    /// Reload external changes without asking
    pub auto_reload: bool,
    /// Flush unsaved edits when the session closes
    pub save_on_close: bool,
    /// Layout history snapshots
    pub history: HistoryConfig,
    /// Logging
    pub log: LogConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: 500,
            auto_reload: false,
            save_on_close: true,
            history: HistoryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With autosave debounce
    #[must_use]
    pub fn with_autosave_debounce(mut self, debounce: Duration) -> Self {
        self.autosave_debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With auto reload
    #[inline]
    #[must_use]
    pub fn with_auto_reload(mut self, enabled: bool) -> Self {
        self.auto_reload = enabled;
        self
    }

    /// With save on close
    #[inline]
    #[must_use]
    pub fn with_save_on_close(mut self, enabled: bool) -> Self {
        self.save_on_close = enabled;
        self
    }

    /// With history settings
    #[inline]
    #[must_use]
    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    /// With logging settings
    #[inline]
    #[must_use]
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Debounce as a duration
    #[inline]
    #[must_use]
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Parse TOML text
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML, wrong value types or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(SessionConfig::from_toml_str("").unwrap(), SessionConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = SessionConfig::from_toml_str(
            "auto_reload = true\n[history]\nmax_snapshots = 2\n[log]\nformat = \"json\"\n",
        )
        .unwrap();
        assert!(config.auto_reload);
        assert!(config.save_on_close);
        assert_eq!(config.autosave_debounce(), Duration::from_millis(500));
        assert_eq!(config.history.max_snapshots, 2);
        assert_eq!(config.history.min_interval_secs, 300);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(matches!(
            SessionConfig::from_toml_str("autosave = 1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(SessionConfig::from_toml_str("[history]\nkeep = 3").is_err());
    }

    #[test]
    fn builder_methods() {
        let config = SessionConfig::new()
            .with_autosave_debounce(Duration::from_secs(2))
            .with_auto_reload(true)
            .with_save_on_close(false);
        assert_eq!(config.autosave_debounce_ms, 2000);
        assert!(config.auto_reload);
        assert!(!config.save_on_close);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plansync.toml");
        std::fs::write(&path, "autosave_debounce_ms = 50\n").unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap().autosave_debounce_ms, 50);
        assert!(matches!(
            SessionConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = SessionConfig::default().with_auto_reload(true);
        let text = toml::to_string(&config).unwrap();
        assert_eq!(SessionConfig::from_toml_str(&text).unwrap(), config);
    }
}
