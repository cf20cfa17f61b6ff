//! Restore command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use super::progress::{self, Confirm};
use super::{resolve_profile, selected_game, Session};
use crate::channel::JobOutcome;
use crate::cli::output::print_formatted;
use crate::config::Config;
use crate::job::{self, RestoreRequest};

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Backup archive to restore
    pub archive: PathBuf,

    /// Game the archive belongs to (defaults to the last one used)
    pub game: Option<String>,

    /// Save-data folder, overriding automatic detection
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Overwrite without asking
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Serialize)]
struct RestoreResult {
    game: String,
    archive: String,
    root: String,
    #[serde(flatten)]
    report: progress::JobReport,
}

pub async fn run(args: RestoreArgs, session: &Session) -> Result<()> {
    let config = Config::load()?;
    let game = selected_game(args.game, &config);
    let profile = resolve_profile(&game, args.root)
        .with_context(|| format!("Cannot restore {}", game))?;

    let request = RestoreRequest {
        profile: profile.clone(),
        archive: args.archive.clone(),
    };

    let confirm = if args.yes {
        Confirm::AssumeYes
    } else {
        Confirm::Prompt
    };

    let handle = job::spawn_restore(request, &session.job_options())?;
    let report = progress::drive(handle, session, confirm).await;

    let result = RestoreResult {
        game: profile.name,
        archive: args.archive.to_string_lossy().to_string(),
        root: profile.root.to_string_lossy().to_string(),
        report: report.into_result()?,
    };

    if session.prints_result() {
        print_formatted(&result, session.format, |r| match r.report.result {
            JobOutcome::Cancelled => "Restore cancelled. Your current saves were not changed.".to_string(),
            _ => format!("Restored {} save data to {}", r.game, r.root),
        });
    }

    Ok(())
}
