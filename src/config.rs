use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::schedule::Schedule;

const QUALIFIER: &str = "";
const ORGANIZATION: &str = "";
const APPLICATION: &str = "SimsBackupUtility";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backups: BackupConfig,
    /// Default backup destination per game key
    #[serde(default)]
    pub paths: BTreeMap<String, String>,
    /// Silent backup schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
}

/// General behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Game used when none is given on the command line
    #[serde(default = "default_game")]
    pub last_selected_game: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            last_selected_game: default_game(),
        }
    }
}

fn default_game() -> String {
    "Sims 4".to_string()
}

/// Backup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Maximum number of archives to keep per destination (0 = unlimited)
    #[serde(default = "default_max_backups")]
    pub max_count: u32,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_count: default_max_backups(),
        }
    }
}

fn default_max_backups() -> u32 {
    5
}

impl Config {
    fn project_dirs() -> Result<directories::ProjectDirs> {
        directories::ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;

        let config_dir = dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    /// Default data directory for scratch folders and the activity log
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_local_dir().to_path_buf())
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config = Self::from_toml(&content)?;
            tracing::debug!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            tracing::debug!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Default backup folder for a game key
    pub fn backup_path(&self, game_key: &str) -> Option<PathBuf> {
        self.paths
            .get(game_key)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn set_backup_path(&mut self, game_key: &str, path: &str) {
        self.paths.insert(game_key.to_string(), path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.backups.max_count, 5);
        assert_eq!(config.general.last_selected_game, "Sims 4");
        assert!(config.paths.is_empty());
        assert!(config.schedule.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
            [general]
            last_selected_game = "Sims 3"

            [backups]
            max_count = 0

            [paths]
            sims_3 = "D:/Backups/Sims3"
            sims_4 = ""

            [schedule]
            mode = "daily"
            time = "21:30"
            "#,
        )
        .unwrap();

        assert_eq!(config.general.last_selected_game, "Sims 3");
        assert_eq!(config.backups.max_count, 0);
        assert_eq!(
            config.backup_path("sims_3"),
            Some(PathBuf::from("D:/Backups/Sims3"))
        );
        assert_eq!(config.backup_path("sims_4"), None);
        assert_eq!(
            config.schedule,
            Some(Schedule::Daily {
                time: "21:30".to_string()
            })
        );
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = Config::default();
        config.set_backup_path("mysims", "/backups/mysims");
        config.schedule = Some(Schedule::Interval { hours: 6 });

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::from_toml(&text).unwrap();

        assert_eq!(
            parsed.backup_path("mysims"),
            Some(PathBuf::from("/backups/mysims"))
        );
        assert_eq!(parsed.schedule, Some(Schedule::Interval { hours: 6 }));
    }
}
