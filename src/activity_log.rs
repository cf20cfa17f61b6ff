//! Daily activity log.
//!
//! Every job log line is appended to a plain-text file in the application data
//! directory. The file only keeps the current day's entries: lines from earlier
//! days are pruned the first time a given day is written, after which lines
//! are appended through an open handle.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDate, NaiveDateTime};

/// File name of the activity log inside the data directory
pub const LOG_FILE_NAME: &str = "sbu_log.txt";

/// Append handle for the day it was opened on
#[derive(Debug)]
struct OpenDay {
    date: NaiveDate,
    file: File,
}

/// Append-only log of job activity, shared between concurrent jobs
#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    writer: Mutex<Option<OpenDay>>,
}

impl ActivityLog {
    /// Activity log stored in `data_dir`
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(LOG_FILE_NAME),
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a message stamped with the current local time
    pub fn append(&self, message: &str) -> io::Result<()> {
        self.append_at(Local::now().naive_local(), message)
    }

    fn append_at(&self, now: NaiveDateTime, message: &str) -> io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let today = now.date();
        if writer.as_ref().is_none_or(|open| open.date != today) {
            // Drop the old handle first so the rewrite below is the only writer
            *writer = None;
            self.prune_before(today)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            *writer = Some(OpenDay { date: today, file });
        }

        let Some(open) = writer.as_mut() else {
            return Ok(());
        };
        writeln!(
            open.file,
            "[{}] {}",
            now.format("%Y-%m-%d %H:%M:%S"),
            message
        )
    }

    /// Rewrite the file keeping only lines stamped with `today`
    fn prune_before(&self, today: NaiveDate) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let existing = match fs::read_to_string(&self.path) {
            Ok(existing) => existing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let today_prefix = today.format("[%Y-%m-%d").to_string();
        let kept: Vec<&str> = existing
            .lines()
            .filter(|line| line.starts_with(&today_prefix))
            .collect();
        if kept.len() == existing.lines().count() {
            return Ok(());
        }

        let mut content = kept.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&self.path, content)
    }
}
