//! Backup command

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::progress::{self, Confirm};
use super::{destination, resolve_profile, selected_game, Session};
use crate::channel::JobOutcome;
use crate::cli::output::print_formatted;
use crate::config::Config;
use crate::job::{self, BackupRequest};

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Game to back up (defaults to the last one used)
    pub game: Option<String>,

    /// Folder to write the archive to; remembered for this game
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Save-data folder, overriding automatic detection
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Archives to keep afterwards (0 = unlimited)
    #[arg(long, value_name = "N")]
    pub keep: Option<u32>,
}

#[derive(Serialize)]
struct BackupResult {
    game: String,
    destination: String,
    #[serde(flatten)]
    report: progress::JobReport,
}

pub async fn run(args: BackupArgs, session: &Session) -> Result<()> {
    let mut config = Config::load()?;
    let game = selected_game(args.game, &config);
    let profile = resolve_profile(&game, args.root)?;
    let key = profile.key();

    let remember_dest = args.dest.is_some();
    let dest_dir = destination(args.dest, &config, &key)?;

    if remember_dest {
        config.set_backup_path(&key, &dest_dir.to_string_lossy());
    }
    config.general.last_selected_game = profile.name.clone();
    config.save()?;

    let request = BackupRequest {
        profile: profile.clone(),
        dest_dir: dest_dir.clone(),
        max_count: args.keep.unwrap_or(config.backups.max_count),
    };

    let handle = job::spawn_backup(request, &session.job_options())?;
    let report = progress::drive(handle, session, Confirm::Prompt).await;

    let result = BackupResult {
        game: profile.name,
        destination: dest_dir.to_string_lossy().to_string(),
        report: report.into_result()?,
    };

    if session.prints_result() {
        print_formatted(&result, session.format, format_backup_text);
    }

    Ok(())
}

fn format_backup_text(result: &BackupResult) -> String {
    match result.report.result {
        JobOutcome::Cancelled => format!(
            "{} backup cancelled. The partial archive was kept in {}",
            result.game, result.destination
        ),
        _ => {
            let mut lines = vec![format!(
                "{} backup complete: {}",
                result.game, result.destination
            )];
            if let Some(sweep) = &result.report.sweep {
                lines.push(sweep.clone());
            }
            lines.join("\n")
        }
    }
}
