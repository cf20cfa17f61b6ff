//! Standalone retention sweep

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::progress::{self, Confirm};
use super::{destination, selected_game, Session};
use crate::cli::output::print_formatted;
use crate::config::Config;
use crate::games::game_key;
use crate::job;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Game whose backup folder to sweep (defaults to the last one used)
    pub game: Option<String>,

    /// Folder to sweep instead of the game's configured one
    #[arg(long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Archives to keep (0 = unlimited); defaults to backups.max_count
    #[arg(long, value_name = "N")]
    pub keep: Option<u32>,
}

#[derive(Serialize)]
struct SweepResult {
    folder: String,
    keep: u32,
    #[serde(flatten)]
    report: progress::JobReport,
}

pub async fn run(args: SweepArgs, session: &Session) -> Result<()> {
    let config = Config::load()?;
    let game = selected_game(args.game, &config);
    let folder = destination(args.dest, &config, &game_key(&game))?;
    let keep = args.keep.unwrap_or(config.backups.max_count);

    let handle = job::spawn_sweep(folder.clone(), keep, &session.job_options())?;
    let report = progress::drive(handle, session, Confirm::Prompt).await;

    let result = SweepResult {
        folder: folder.to_string_lossy().to_string(),
        keep,
        report: report.into_result()?,
    };

    if session.prints_result() {
        print_formatted(&result, session.format, |r| {
            r.report.sweep.clone().unwrap_or_else(|| r.report.outcome.clone())
        });
    }

    Ok(())
}
