//! Command-line interface
//!
//! Every operation of the utility is reachable from here: backups, restores,
//! retention sweeps, schedules and configuration.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use output::OutputFormat;

use crate::config::Config;

/// Sims Backup Utility - back up and restore Sims save data
#[derive(Parser, Debug)]
#[command(name = "sims-backup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[command(flatten)]
    pub output: OutputOptions,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output formatting options
#[derive(Parser, Debug, Clone)]
pub struct OutputOptions {
    /// Output in JSON format (for machine parsing)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Data directory for the activity log and restore scratch folders
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

impl OutputOptions {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Back up a game's save data
    Backup(commands::backup::BackupArgs),

    /// Restore save data from a backup archive
    Restore(commands::restore::RestoreArgs),

    /// List backup archives
    List(commands::list::ListArgs),

    /// Delete old archives beyond the retention limit
    Sweep(commands::sweep::SweepArgs),

    /// Show supported games and where their save data lives
    Games,

    /// Scheduled silent backups
    Schedule {
        #[command(subcommand)]
        command: commands::schedule::ScheduleCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> Result<()> {
    let data_dir = match cli.output.data_dir.clone() {
        Some(dir) => dir,
        None => Config::data_dir()?,
    };

    let session = commands::Session {
        format: cli.output.format(),
        quiet: cli.output.quiet,
        verbose: cli.output.verbose,
        data_dir,
    };

    match cli.command {
        Commands::Backup(args) => commands::backup::run(args, &session).await,
        Commands::Restore(args) => commands::restore::run(args, &session).await,
        Commands::List(args) => commands::list::run(args, &session).await,
        Commands::Sweep(args) => commands::sweep::run(args, &session).await,
        Commands::Games => commands::games::run(&session).await,
        Commands::Schedule { command } => commands::schedule::run(command, &session).await,
        Commands::Config { command } => commands::config::run(command, &session).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sims-backup",
            "backup",
            "sims 3",
            "--dest",
            "/backups",
            "--json",
            "--data-dir",
            "/tmp/sbu",
        ])
        .unwrap();

        assert!(cli.output.json);
        assert_eq!(cli.output.data_dir, Some(PathBuf::from("/tmp/sbu")));
        match cli.command {
            Commands::Backup(args) => {
                assert_eq!(args.game.as_deref(), Some("sims 3"));
                assert_eq!(args.dest, Some(PathBuf::from("/backups")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_restore_requires_archive() {
        assert!(Cli::try_parse_from(["sims-backup", "restore"]).is_err());
    }
}
