//! Scheduled silent backups

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Subcommand;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::Session;
use crate::channel::JobOutcome;
use crate::cli::output::{print_error, print_formatted, print_success};
use crate::config::Config;
use crate::games::{Game, GameProfile, SearchDirs};
use crate::job::{self, BackupRequest, JobOptions};
use crate::schedule::Schedule;

#[derive(Subcommand, Debug)]
pub enum ScheduleCommands {
    /// Show the current schedule
    Show,

    /// Back up every N hours (1-72)
    Interval {
        hours: u32,
    },

    /// Back up once a day at HH:MM
    Daily {
        time: String,
    },

    /// Remove the schedule
    Clear,

    /// Run scheduled backups in the foreground until interrupted
    Run {
        /// Back up every configured game once and exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Serialize)]
struct ScheduleResult {
    schedule: Option<Schedule>,
    next_run: Option<String>,
}

pub async fn run(command: ScheduleCommands, session: &Session) -> Result<()> {
    match command {
        ScheduleCommands::Show => show(session).await,
        ScheduleCommands::Interval { hours } => set(Schedule::interval(hours)?, session).await,
        ScheduleCommands::Daily { time } => set(Schedule::daily(&time)?, session).await,
        ScheduleCommands::Clear => clear(session).await,
        ScheduleCommands::Run { once } => {
            if once {
                run_due_backups(session).await.map(|_| ())
            } else {
                run_loop(session).await
            }
        }
    }
}

async fn show(session: &Session) -> Result<()> {
    let config = Config::load()?;
    let next_run = config
        .schedule
        .as_ref()
        .map(|s| s.next_after(Local::now().naive_local()).format("%Y-%m-%d %H:%M").to_string());

    let result = ScheduleResult {
        schedule: config.schedule,
        next_run,
    };

    print_formatted(&result, session.format, |r| match (&r.schedule, &r.next_run) {
        (Some(schedule), Some(next)) => {
            format!("Backups run {}.\nNext run: {}", schedule.description(), next)
        }
        _ => "No backup schedule set.".to_string(),
    });

    Ok(())
}

async fn set(schedule: Schedule, session: &Session) -> Result<()> {
    let mut config = Config::load()?;
    let description = schedule.description();
    config.schedule = Some(schedule);
    config.save()?;

    print_success(&format!("Backups will run {}.", description), session.quiet);
    Ok(())
}

async fn clear(session: &Session) -> Result<()> {
    let mut config = Config::load()?;
    config.schedule = None;
    config.save()?;

    print_success("Backup schedule cleared.", session.quiet);
    Ok(())
}

async fn run_loop(session: &Session) -> Result<()> {
    loop {
        // Reload each cycle so schedule and folder changes apply without a restart
        let config = Config::load()?;
        let schedule = config.schedule.context(
            "No backup schedule set. Use 'schedule interval <HOURS>' or 'schedule daily <HH:MM>'",
        )?;

        let now = Local::now().naive_local();
        let next = schedule.next_after(now);
        print_success(
            &format!("Next backup at {}", next.format("%Y-%m-%d %H:%M")),
            session.quiet,
        );

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                print_success("Scheduler stopped.", session.quiet);
                return Ok(());
            }
        }

        if run_due_backups(session).await? {
            print_success("Scheduler stopped.", session.quiet);
            return Ok(());
        }
    }
}

/// Back up every game that has a backup folder configured.
///
/// Games with different backup folders run concurrently. Games sharing a folder
/// are backed up one after another. Returns whether the run was interrupted
/// with Ctrl-C.
async fn run_due_backups(session: &Session) -> Result<bool> {
    let config = Config::load()?;
    let dirs = SearchDirs::from_env();
    let options = session.job_options();

    let mut queues: BTreeMap<PathBuf, Vec<(Game, BackupRequest)>> = BTreeMap::new();
    for game in Game::ALL {
        let Some(dest_dir) = config.backup_path(&game.key()) else {
            continue;
        };

        let profile = match GameProfile::resolve(game.name(), &dirs) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("Skipping scheduled backup: {}", e);
                continue;
            }
        };

        let request = BackupRequest {
            profile,
            dest_dir: dest_dir.clone(),
            max_count: config.backups.max_count,
        };
        queues.entry(dest_dir).or_default().push((game, request));
    }

    if queues.is_empty() {
        tracing::warn!("No games have a backup folder configured");
        return Ok(false);
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut jobs = JoinSet::new();
    for queue in queues.into_values() {
        jobs.spawn(run_queue(queue, options.clone(), stop_rx.clone()));
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            joined = jobs.join_next() => {
                let Some(joined) = joined else { break };
                match joined {
                    Ok(results) => {
                        for (game, outcome) in results {
                            report(game, outcome, session);
                        }
                    }
                    Err(e) => tracing::error!("Scheduled backup task failed: {}", e),
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                stop_tx.send_replace(true);
            }
        }
    }

    Ok(interrupted)
}

/// Run backups into one folder in order, cancelling the current one once `stop` is set
async fn run_queue(
    queue: Vec<(Game, BackupRequest)>,
    options: JobOptions,
    mut stop: watch::Receiver<bool>,
) -> Vec<(Game, JobOutcome)> {
    let mut results = Vec::new();

    for (game, request) in queue {
        if *stop.borrow() {
            results.push((game, JobOutcome::Cancelled));
            continue;
        }

        let handle = match job::spawn_backup(request, &options) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Skipping scheduled backup: {}", e);
                continue;
            }
        };

        let control = handle.control();
        let wait = handle.wait();
        tokio::pin!(wait);

        let outcome = tokio::select! {
            outcome = &mut wait => outcome,
            Ok(()) = stop.changed() => {
                control.cancel();
                wait.await
            }
        };
        results.push((game, outcome));
    }

    results
}

fn report(game: Game, outcome: JobOutcome, session: &Session) {
    match outcome {
        JobOutcome::Done => {
            print_success(&format!("{} backup complete.", game.name()), session.quiet)
        }
        JobOutcome::Cancelled => {
            print_success(&format!("{} backup cancelled.", game.name()), session.quiet)
        }
        JobOutcome::Failed(reason) => {
            print_error(&format!("{} backup failed: {}", game.name(), reason))
        }
    }
}
