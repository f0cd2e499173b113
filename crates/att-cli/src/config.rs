//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use att_core::SessionConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Location of the SQLite database.
    pub database_path: PathBuf,
    /// Directory holding the session store and its lock file.
    pub state_dir: PathBuf,
    /// Minutes a session accepts check-ins after its scheduled time.
    pub validity_window_mins: i64,
    /// Highest level `promote` will raise students to.
    pub promotion_ceiling: i64,
    /// Webhook to notify when a session opens.
    pub webhook_url: Option<String>,
    /// Force the biometric verdict instead of comparing samples.
    pub biometric_override: Option<bool>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("state_dir", &self.state_dir)
            .field("validity_window_mins", &self.validity_window_mins)
            .field("promotion_ceiling", &self.promotion_ceiling)
            .field(
                "webhook_url",
                &self.webhook_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("biometric_override", &self.biometric_override)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let database_path = dirs_data_path()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("att.db");
        let state_dir = dirs_state_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path,
            state_dir,
            validity_window_mins: 30,
            promotion_ceiling: 4,
            webhook_url: None,
            biometric_override: None,
        }
    }
}

impl Config {
    /// Load configuration, merging defaults, config files, and environment
    /// variables (prefixed with `ATT_`).
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("ATT_")).extract()
    }

    /// Path of the JSON file holding active sessions.
    pub fn session_store_path(&self) -> PathBuf {
        self.state_dir.join("sessions.json")
    }

    /// Session parameters derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            validity_window_mins: self.validity_window_mins,
        }
    }
}

fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("att"))
}

fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("att"))
}

fn dirs_state_path() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|p| p.join("att"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_thirty_minute_window() {
        let config = Config::default();
        assert_eq!(config.validity_window_mins, 30);
        assert_eq!(config.promotion_ceiling, 4);
        assert!(config.webhook_url.is_none());
        assert!(config.biometric_override.is_none());
    }

    #[test]
    fn load_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
database_path = "/tmp/test-att.db"
validity_window_mins = 45
webhook_url = "https://hooks.example.com/T000/B000/XXX"
"#,
        )
        .unwrap();

        let config = Config::load(Some(config_path.as_path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/test-att.db"));
        assert_eq!(config.validity_window_mins, 45);
        assert_eq!(config.promotion_ceiling, 4);
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://hooks.example.com/T000/B000/XXX")
        );
    }

    #[test]
    fn debug_output_redacts_webhook_url() {
        let config = Config {
            webhook_url: Some("https://hooks.example.com/secret-token".into()),
            ..Config::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn session_store_path_joins_state_dir() {
        let config = Config {
            state_dir: PathBuf::from("/var/lib/att"),
            ..Config::default()
        };
        assert_eq!(
            config.session_store_path(),
            PathBuf::from("/var/lib/att/sessions.json")
        );
    }
}
