pub mod backup;
pub mod config;
pub mod games;
pub mod list;
mod progress;
pub mod restore;
pub mod schedule;
pub mod sweep;

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::output::OutputFormat;
use crate::config::Config;
use crate::games::{GameProfile, SearchDirs};
use crate::job::JobOptions;

/// Settings shared by every command in one invocation
#[derive(Debug, Clone)]
pub struct Session {
    pub format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub data_dir: PathBuf,
}

impl Session {
    pub fn job_options(&self) -> JobOptions {
        JobOptions::new(self.data_dir.clone())
    }

    /// Quiet mode still prints machine-readable results
    fn prints_result(&self) -> bool {
        !self.quiet || self.format == OutputFormat::Json
    }

    /// Live progress is only drawn for interactive text output
    fn shows_progress(&self) -> bool {
        self.format == OutputFormat::Text && !self.quiet
    }
}

/// Game named on the command line, or the last one used
fn selected_game(game: Option<String>, config: &Config) -> String {
    game.unwrap_or_else(|| config.general.last_selected_game.clone())
}

/// Build a profile from an explicit root or by locating the game's save data
fn resolve_profile(game: &str, root: Option<PathBuf>) -> Result<GameProfile> {
    match root {
        Some(root) => Ok(GameProfile::with_root(game, root)),
        None => Ok(GameProfile::resolve(game, &SearchDirs::from_env())?),
    }
}

/// Backup folder from the command line or the game's configured default
fn destination(dest: Option<PathBuf>, config: &Config, game_key: &str) -> Result<PathBuf> {
    match dest {
        Some(dest) => Ok(dest),
        None => config.backup_path(game_key).with_context(|| {
            format!(
                "No backup folder configured for '{}'. Pass --dest or run: config set paths.{} <DIR>",
                game_key, game_key
            )
        }),
    }
}
