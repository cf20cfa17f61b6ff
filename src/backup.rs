//! Backup functionality for archiving a game's save data.
//!
//! This module handles:
//! - Discovering save files under a game's configured subfolders
//! - Writing them into a timestamped ZIP archive with per-file progress
//! - Listing existing archives in a destination folder

use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::channel::JobContext;
use crate::games::GameProfile;

/// Extension of backup archives
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Errors that can occur during backup operations
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Save folder not found: {0}")]
    NotFound(PathBuf),

    #[error("No save files found to back up in {0}")]
    EmptyInput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// A file scheduled for backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Forward-slash path relative to the game root, used as the entry name
    pub relative: String,
}

/// How a backup run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Completed { archive: PathBuf, files: usize },
    /// Stopped on request; the archive holds the first `written` files
    Cancelled { archive: PathBuf, written: usize },
}

/// Metadata about an archive in a destination folder
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    /// File name without the .zip extension
    pub name: String,
    /// Full path to the archive
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: DateTime<Local>,
}

/// Enumerate the files to back up, in archive order.
///
/// Walks each configured subfolder in turn. If none of them yields a file the
/// whole root is walked instead, so unstructured save folders still back up.
pub fn collect_files(root: &Path, subfolders: &[String]) -> Result<Vec<SourceFile>, BackupError> {
    if !root.is_dir() {
        return Err(BackupError::NotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for folder in subfolders {
        let dir = root.join(folder);
        if dir.is_dir() {
            walk_files(root, &dir, &mut files)?;
        }
    }

    if files.is_empty() {
        walk_files(root, root, &mut files)?;
    }

    if files.is_empty() {
        return Err(BackupError::EmptyInput(root.to_path_buf()));
    }

    Ok(files)
}

fn walk_files(root: &Path, dir: &Path, files: &mut Vec<SourceFile>) -> Result<(), BackupError> {
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path().to_path_buf();
        let relative = path
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
            .to_string_lossy()
            .replace('\\', "/");

        files.push(SourceFile { path, relative });
    }
    Ok(())
}

/// Archive file name for a game at a point in time.
///
/// The timestamp is zero-padded so names sort in creation order.
pub fn archive_file_name(slug: &str, timestamp: DateTime<Local>) -> String {
    format!(
        "{}_backup_{}.{}",
        slug,
        timestamp.format("%Y%m%d_%H%M%S"),
        ARCHIVE_EXTENSION
    )
}

/// Create a new, empty archive file, appending `_2`, `_3`, ... to the name
/// until one can be created without replacing an existing file
pub fn create_unique_archive(
    dest_dir: &Path,
    slug: &str,
    timestamp: DateTime<Local>,
) -> io::Result<(PathBuf, File)> {
    let file_name = archive_file_name(slug, timestamp);
    let stem = file_name.trim_end_matches(&format!(".{}", ARCHIVE_EXTENSION));

    let mut candidate = dest_dir.join(&file_name);
    let mut counter = 2;
    loop {
        match File::create_new(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                candidate = dest_dir.join(format!("{}_{}.{}", stem, counter, ARCHIVE_EXTENSION));
                counter += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Back up a game's save data into a new archive under `dest_dir`.
///
/// Cancellation is checked before each file. A cancelled run finalizes the
/// archive with the files written so far and leaves it on disk.
pub fn create_archive(
    profile: &GameProfile,
    dest_dir: &Path,
    ctx: &dyn JobContext,
) -> Result<BackupOutcome, BackupError> {
    ctx.log(&format!("Starting {} backup...", profile.name));

    let files = collect_files(&profile.root, &profile.subfolders)?;
    let total = files.len();

    fs::create_dir_all(dest_dir)?;
    let (archive_path, file) = create_unique_archive(dest_dir, &profile.slug, Local::now())?;
    ctx.log(&format!("Creating backup: {}", archive_path.display()));

    ctx.bound(total);

    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (i, source) in files.iter().enumerate() {
        if ctx.is_cancelled() {
            zip.finish()?;
            ctx.log("Backup cancelled by user.");
            return Ok(BackupOutcome::Cancelled {
                archive: archive_path,
                written: i,
            });
        }

        zip.start_file(source.relative.as_str(), options)?;
        let mut input = File::open(&source.path)?;
        io::copy(&mut input, &mut zip)?;

        ctx.log(&format!("Added: {}", source.relative));
        ctx.progress(i + 1);
    }

    zip.finish()?;
    ctx.log("Backup complete.");

    Ok(BackupOutcome::Completed {
        archive: archive_path,
        files: total,
    })
}

/// List archives in a destination folder, oldest first by modification time
pub fn list_archives(dest_dir: &Path) -> io::Result<Vec<ArchiveInfo>> {
    if !dest_dir.exists() {
        return Ok(Vec::new());
    }

    let mut archives = Vec::new();
    for entry in fs::read_dir(dest_dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.extension().is_some_and(|e| e == ARCHIVE_EXTENSION) {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        archives.push(ArchiveInfo {
            name,
            size: metadata.len(),
            modified: metadata.modified()?.into(),
            path,
        });
    }

    archives.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.name.cmp(&b.name)));
    Ok(archives)
}
