//! Supported games and their save-data locations

use anyhow::Result;
use serde::Serialize;

use super::Session;
use crate::cli::output::{print_status, OutputFormat};
use crate::config::Config;
use crate::games::{Game, SearchDirs};

#[derive(Serialize)]
struct GameEntry {
    name: String,
    key: String,
    found: bool,
    /// Detected save-data root, or the expected location when missing
    root: String,
    subfolders: Vec<String>,
    backup_folder: Option<String>,
}

pub async fn run(session: &Session) -> Result<()> {
    let config = Config::load()?;
    let dirs = SearchDirs::from_env();

    let entries: Vec<GameEntry> = Game::ALL
        .iter()
        .map(|game| {
            let (found, root) = match game.resolve_root(&dirs) {
                Ok(root) => (true, root),
                Err(crate::games::GameError::NotFound { path, .. }) => (false, path),
                Err(e) => {
                    tracing::debug!("Could not resolve {}: {}", game.name(), e);
                    (false, Default::default())
                }
            };
            GameEntry {
                name: game.name().to_string(),
                key: game.key(),
                found,
                root: root.to_string_lossy().to_string(),
                subfolders: game.subfolders().iter().map(|s| s.to_string()).collect(),
                backup_folder: config
                    .backup_path(&game.key())
                    .map(|p| p.to_string_lossy().to_string()),
            }
        })
        .collect();

    match session.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                print_status(entry.found, &format!("{} ({})", entry.name, entry.key));
                println!("     Saves:   {}", entry.root);
                if !entry.subfolders.is_empty() {
                    println!("     Folders: {}", entry.subfolders.join(", "));
                }
                println!(
                    "     Backups: {}",
                    entry.backup_folder.as_deref().unwrap_or("<not set>")
                );
            }
        }
    }

    Ok(())
}
