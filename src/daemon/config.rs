//! The optional JSON config file. Loading never fails: a missing file, an unreadable file or
//! malformed JSON all fall back to [Config::default].
//!
//! ```json
//! {
//!     "websites_to_block": ["youtube.com", "reddit.com"],
//!     "apps_to_block": ["Steam"],
//!     "code_editors": ["Code", "nvim"],
//!     "initial_grace_period_secs": 900,
//!     "rearm_grace_notification": false
//! }
//! ```

use std::{io::ErrorKind, path::Path};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::budget::BudgetSettings;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Longest duration accepted for any `*_secs` key.
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_CODE_EDITORS: [&str; 8] = [
    "Code",
    "Electron",
    "pycharm",
    "sublime_text",
    "Terminal",
    "atom",
    "notepad++",
    "Source Filmmaker",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Substrings of URLs whose tabs get redirected once the budget is exhausted.
    pub websites_to_block: Vec<String>,
    /// Application names that get quit once the budget is exhausted.
    pub apps_to_block: Vec<String>,
    /// Applications that count as productive. Matched as case-insensitive substrings of the
    /// frontmost application name.
    pub code_editors: Vec<String>,
    pub initial_grace_period_secs: u64,
    pub reward_extension_secs: u64,
    pub check_interval_secs: u64,
    pub wake_grace_period_secs: u64,
    pub rearm_grace_notification: bool,
}

impl Default for Config {
    fn default() -> Self {
        let settings = BudgetSettings::default();
        Self {
            websites_to_block: vec![],
            apps_to_block: vec![],
            code_editors: DEFAULT_CODE_EDITORS.iter().map(|v| v.to_string()).collect(),
            initial_grace_period_secs: settings.initial_grace_period.num_seconds() as u64,
            reward_extension_secs: settings.reward_extension.num_seconds() as u64,
            check_interval_secs: settings.check_interval.num_seconds() as u64,
            wake_grace_period_secs: settings.wake_grace_period.num_seconds() as u64,
            rearm_grace_notification: settings.rearm_grace_notification,
        }
    }
}

impl Config {
    /// Reads the config at `path`. Never fails, problems are logged and replaced with defaults.
    pub fn load(path: &Path) -> Config {
        let contents = match std::fs::read_to_string(path) {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No config at {path:?}, using defaults");
                return Config::default();
            }
            Err(e) => {
                warn!("Couldn't read config at {path:?}, using defaults: {e}");
                return Config::default();
            }
        };

        match serde_json::from_str::<Config>(&contents) {
            Ok(config) => {
                info!(
                    "Loaded config from {path:?}: {} websites and {} apps to block",
                    config.websites_to_block.len(),
                    config.apps_to_block.len()
                );
                config
            }
            Err(e) => {
                warn!("Config at {path:?} is malformed, using defaults: {e}");
                Config::default()
            }
        }
    }

    /// Durations for the budget. A zero duration, or one longer than [MAX_DURATION_SECS], is
    /// replaced with its default.
    pub fn budget_settings(&self) -> BudgetSettings {
        let defaults = BudgetSettings::default();
        BudgetSettings {
            initial_grace_period: positive_or(
                "initial_grace_period_secs",
                self.initial_grace_period_secs,
                defaults.initial_grace_period,
            ),
            reward_extension: positive_or(
                "reward_extension_secs",
                self.reward_extension_secs,
                defaults.reward_extension,
            ),
            check_interval: positive_or(
                "check_interval_secs",
                self.check_interval_secs,
                defaults.check_interval,
            ),
            wake_grace_period: positive_or(
                "wake_grace_period_secs",
                self.wake_grace_period_secs,
                defaults.wake_grace_period,
            ),
            rearm_grace_notification: self.rearm_grace_notification,
        }
    }
}

fn positive_or(key: &str, seconds: u64, default: Duration) -> Duration {
    if seconds > MAX_DURATION_SECS {
        warn!("{key} must be at most {MAX_DURATION_SECS} seconds, got {seconds}. Using {default}");
        return default;
    }
    match i64::try_from(seconds)
        .ok()
        .filter(|v| *v > 0)
        .and_then(Duration::try_seconds)
    {
        Some(v) => v,
        None => {
            warn!("{key} must be a positive number of seconds, got {seconds}. Using {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use chrono::Duration;
    use tempfile::tempdir;

    use crate::{budget::BudgetSettings, utils::logging::TEST_LOGGING};

    use super::{Config, DEFAULT_CODE_EDITORS, MAX_DURATION_SECS};

    #[test]
    fn missing_file_yields_empty_blocklists() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = Config::load(&dir.path().join("config.json"));
        assert!(config.websites_to_block.is_empty());
        assert!(config.apps_to_block.is_empty());
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn malformed_file_yields_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(&path, "{ \"websites_to_block\": [\"youtube.com\" ")?;
        assert_eq!(Config::load(&path), Config::default());

        fs::write(&path, "{ \"websites_to_block\": \"youtube.com\" }")?;
        assert_eq!(Config::load(&path), Config::default());
        Ok(())
    }

    #[test]
    fn reads_blocklists_and_keeps_order() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "websites_to_block": ["youtube.com", "reddit.com", "x.com"],
                "apps_to_block": ["Steam", "Discord"],
                "some_future_key": 1
            }"#,
        )?;

        let config = Config::load(&path);
        assert_eq!(
            config.websites_to_block,
            vec!["youtube.com", "reddit.com", "x.com"]
        );
        assert_eq!(config.apps_to_block, vec!["Steam", "Discord"]);
        assert_eq!(config.code_editors, DEFAULT_CODE_EDITORS.to_vec());
        assert_eq!(config.budget_settings(), BudgetSettings::default());
        Ok(())
    }

    #[test]
    fn overrides_durations_and_editors() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "code_editors": ["nvim"],
                "initial_grace_period_secs": 600,
                "reward_extension_secs": 120,
                "check_interval_secs": 5,
                "wake_grace_period_secs": 60,
                "rearm_grace_notification": true
            }"#,
        )?;

        let config = Config::load(&path);
        assert_eq!(config.code_editors, vec!["nvim"]);
        assert_eq!(
            config.budget_settings(),
            BudgetSettings {
                initial_grace_period: Duration::minutes(10),
                reward_extension: Duration::minutes(2),
                check_interval: Duration::seconds(5),
                wake_grace_period: Duration::minutes(1),
                rearm_grace_notification: true,
            }
        );
        Ok(())
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let config = Config {
            check_interval_secs: 0,
            reward_extension_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.budget_settings(), BudgetSettings::default());
    }

    #[test]
    fn oversized_durations_fall_back_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "initial_grace_period_secs": 10000000000000,
                "check_interval_secs": 18446744073709551615,
                "wake_grace_period_secs": 86401,
                "reward_extension_secs": 86400
            }"#,
        )?;

        let config = Config::load(&path);
        assert_eq!(config.initial_grace_period_secs, 10_000_000_000_000);
        let defaults = BudgetSettings::default();
        assert_eq!(
            config.budget_settings(),
            BudgetSettings {
                reward_extension: Duration::seconds(MAX_DURATION_SECS as i64),
                ..defaults
            }
        );
        Ok(())
    }
}
