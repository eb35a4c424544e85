//! Settings of the `tripsplit` binary.
//!
//! Sources, lowest precedence first: an optional `settings.toml`, then
//! `TRIPSPLIT_*` environment variables, then command line flags.

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;

pub const DEFAULT_CONFIG_PATH: &str = "settings";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// sea-orm connection string.
    pub database_url: String,
    /// Log level for the `tripsplit` and `engine` targets.
    pub level: String,
    /// Currency of new trips unless `--currency` is given.
    pub currency: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./tripsplit.db?mode=rwc".to_string(),
            level: "info".to_string(),
            currency: "EUR".to_string(),
        }
    }
}

/// Values given on the command line, applied on top of file and env.
#[derive(Debug, Default)]
pub struct Overrides {
    pub database_url: Option<String>,
    pub level: Option<String>,
}

impl Settings {
    pub fn load(config_path: Option<&str>, overrides: Overrides) -> Result<Self> {
        let config_path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);
        let mut settings: Settings = Config::builder()
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("TRIPSPLIT"))
            .build()?
            .try_deserialize()?;

        if let Some(database_url) = overrides.database_url {
            settings.database_url = database_url;
        }
        if let Some(level) = overrides.level {
            settings.level = level;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let settings = Settings::load(Some("does/not/exist"), Overrides::default()).unwrap();
        assert_eq!(settings.currency, "EUR");
        assert!(settings.database_url.starts_with("sqlite:"));
    }

    #[test]
    fn command_line_wins() {
        let settings = Settings::load(
            Some("does/not/exist"),
            Overrides {
                database_url: Some("sqlite::memory:".to_string()),
                level: Some("debug".to_string()),
            },
        )
        .unwrap();
        assert_eq!(settings.database_url, "sqlite::memory:");
        assert_eq!(settings.level, "debug");
    }
}
