//! Archive listing

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use super::{destination, selected_game, Session};
use crate::backup;
use crate::cli::output::print_formatted;
use crate::config::Config;
use crate::games::game_key;
use crate::util::format_size;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Game whose backup folder to list (defaults to the last one used)
    pub game: Option<String>,

    /// Folder to list instead of the game's configured one
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,
}

#[derive(Serialize)]
struct ListResult {
    folder: String,
    archives: Vec<ArchiveEntry>,
    total_count: usize,
    total_size_bytes: u64,
}

#[derive(Serialize)]
struct ArchiveEntry {
    name: String,
    path: String,
    size_bytes: u64,
    modified: String,
}

pub async fn run(args: ListArgs, session: &Session) -> Result<()> {
    let config = Config::load()?;
    let game = selected_game(args.game, &config);
    let folder = destination(args.dest, &config, &game_key(&game))?;

    let mut archives = if folder.is_dir() {
        backup::list_archives(&folder)
            .with_context(|| format!("Failed to read {}", folder.display()))?
    } else {
        Vec::new()
    };
    // Newest first
    archives.reverse();

    let entries: Vec<ArchiveEntry> = archives
        .iter()
        .map(|a| ArchiveEntry {
            name: a.name.clone(),
            path: a.path.to_string_lossy().to_string(),
            size_bytes: a.size,
            modified: a.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
        .collect();

    let result = ListResult {
        folder: folder.to_string_lossy().to_string(),
        total_count: entries.len(),
        total_size_bytes: entries.iter().map(|e| e.size_bytes).sum(),
        archives: entries,
    };

    print_formatted(&result, session.format, format_archive_list);

    Ok(())
}

fn format_archive_list(result: &ListResult) -> String {
    if result.archives.is_empty() {
        return format!("No backups found in {}", result.folder);
    }

    let mut lines = vec![format!(
        "Backups in {} ({} total):\n",
        result.folder, result.total_count
    )];

    lines.push(format!("{:<40} {:>10} {:>20}", "NAME", "SIZE", "MODIFIED"));
    lines.push("-".repeat(72));

    for archive in &result.archives {
        lines.push(format!(
            "{:<40} {:>10} {:>20}",
            archive.name,
            format_size(archive.size_bytes),
            archive.modified
        ));
    }

    lines.push(String::new());
    lines.push(format!("Total: {}", format_size(result.total_size_bytes)));

    lines.join("\n")
}
