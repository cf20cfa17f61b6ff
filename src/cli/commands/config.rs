//! Configuration management commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use super::Session;
use crate::activity_log::ActivityLog;
use crate::cli::output::{print_formatted, print_success, OutputFormat};
use crate::config::Config;
use crate::games::game_key;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Get a specific config value
    Get {
        /// Config key (e.g., "backups.max_count", "paths.sims_4")
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., "backups.max_count", "paths.sims_4")
        key: String,

        /// Value to set
        value: String,
    },

    /// Show config file path
    Path,
}

#[derive(Serialize)]
struct ConfigPathResult {
    path: String,
    exists: bool,
    data_dir: String,
    activity_log: String,
}

pub async fn run(command: ConfigCommands, session: &Session) -> Result<()> {
    match command {
        ConfigCommands::Show => show(session.format).await,
        ConfigCommands::Get { key } => get(&key, session.format).await,
        ConfigCommands::Set { key, value } => set(&key, &value, session.quiet).await,
        ConfigCommands::Path => path(session).await,
    }
}

async fn show(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
    }

    Ok(())
}

async fn get(key: &str, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;

    let value = get_config_value(&config, key)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(&value)?);
        }
        OutputFormat::Text => {
            println!("{}", value);
        }
    }

    Ok(())
}

fn get_config_value(config: &Config, key: &str) -> Result<String> {
    let parts: Vec<&str> = key.splitn(2, '.').collect();

    match parts.as_slice() {
        ["general", "last_selected_game"] => Ok(config.general.last_selected_game.clone()),
        ["backups", "max_count"] => Ok(config.backups.max_count.to_string()),
        ["paths", game] => Ok(config
            .backup_path(&game_key(game))
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| "<not set>".to_string())),
        ["schedule"] => Ok(config
            .schedule
            .as_ref()
            .map(|s| s.description())
            .unwrap_or_else(|| "<not set>".to_string())),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
}

async fn set(key: &str, value: &str, quiet: bool) -> Result<()> {
    let mut config = Config::load()?;

    set_config_value(&mut config, key, value)?;
    config.save()?;

    print_success(&format!("Set {} = {}", key, value), quiet);
    Ok(())
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.splitn(2, '.').collect();

    match parts.as_slice() {
        ["general", "last_selected_game"] => {
            config.general.last_selected_game = value.to_string();
        }
        ["backups", "max_count"] => {
            config.backups.max_count = value.parse()?;
        }
        ["paths", game] => {
            config.set_backup_path(&game_key(game), value);
        }
        _ => anyhow::bail!("Unknown or read-only config key: {}", key),
    }

    Ok(())
}

async fn path(session: &Session) -> Result<()> {
    let path = Config::config_path()?;
    let exists = path.exists();

    let result = ConfigPathResult {
        path: path.to_string_lossy().to_string(),
        exists,
        data_dir: session.data_dir.to_string_lossy().to_string(),
        activity_log: ActivityLog::new(&session.data_dir)
            .path()
            .to_string_lossy()
            .to_string(),
    };

    print_formatted(&result, session.format, |r| {
        format!(
            "{}{}\nData: {}\nActivity log: {}",
            r.path,
            if r.exists { "" } else { " (not found)" },
            r.data_dir,
            r.activity_log
        )
    });

    Ok(())
}
