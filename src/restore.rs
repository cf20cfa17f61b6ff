//! Restoring save data from a backup archive.
//!
//! The archive is first extracted into a per-game scratch directory. Live save
//! data is only touched after the user confirms, and the scratch directory is
//! removed on every exit path.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

use crate::channel::JobContext;
use crate::games::GameProfile;
use crate::util::copy_dir_merge;

/// Errors that can occur during restore operations
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Backup archive not found: {0}")]
    ArchiveNotFound(PathBuf),

    #[error("Save folder not found: {0}")]
    DestinationNotFound(PathBuf),

    #[error("Unsafe path in backup archive: {0}")]
    ZipIntegrity(String),

    #[error("Corrupt backup archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Backup contains nothing to restore")]
    NothingToRestore,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// How a restore run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Save data was copied into the live folder
    Restored,
    /// Stopped by cancellation or a declined confirmation; nothing was copied
    Cancelled,
}

/// What part of the extracted archive gets copied
#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    /// Known save subfolders found in the archive
    Subfolders(Vec<String>),
    /// Archive has no known layout; its whole content maps onto the root
    Root,
}

/// Scratch directory used by restores of one game
pub fn scratch_dir(data_dir: &Path, slug: &str) -> PathBuf {
    data_dir.join(format!("temp_{}_restore", slug))
}

/// Warning shown before live save data is overwritten
pub fn confirmation_message(profile: &GameProfile) -> String {
    format!(
        "This will overwrite your current {} save data in {}.\n\nAre you sure you want to continue?",
        profile.name,
        profile.root.display()
    )
}

type RemoveDir = fn(&Path) -> io::Result<()>;

/// Removes the scratch directory when dropped
struct ScratchDir<'a> {
    path: PathBuf,
    ctx: &'a dyn JobContext,
    remove: RemoveDir,
}

impl<'a> ScratchDir<'a> {
    /// Start from an empty directory, discarding anything a previous run left behind
    fn create(path: PathBuf, ctx: &'a dyn JobContext, remove: RemoveDir) -> io::Result<Self> {
        if path.exists() {
            remove_dir_all::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path, ctx, remove })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir<'_> {
    fn drop(&mut self) {
        tracing::debug!("Removing scratch directory {:?}", self.path);
        if let Err(e) = (self.remove)(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                self.ctx.log(&format!(
                    "[ERROR] Failed to clean temporary restore folder {}: {}",
                    self.path.display(),
                    e
                ));
            }
        }
    }
}

/// Restore `archive` into the profile's save folder.
///
/// `scratch` is where the archive is staged; it is created if needed and
/// always removed before this returns. Cancellation and a declined
/// confirmation both end in [`RestoreOutcome::Cancelled`] with the live folder
/// untouched.
pub fn restore_archive(
    archive: &Path,
    profile: &GameProfile,
    scratch: &Path,
    ctx: &dyn JobContext,
) -> Result<RestoreOutcome, RestoreError> {
    restore_with(archive, profile, scratch, ctx, |path| {
        remove_dir_all::remove_dir_all(path)
    })
}

fn restore_with(
    archive: &Path,
    profile: &GameProfile,
    scratch: &Path,
    ctx: &dyn JobContext,
    remove_scratch: RemoveDir,
) -> Result<RestoreOutcome, RestoreError> {
    ctx.log(&format!("Starting {} restore...", profile.name));

    if !archive.is_file() {
        return Err(RestoreError::ArchiveNotFound(archive.to_path_buf()));
    }
    if !profile.root.is_dir() {
        return Err(RestoreError::DestinationNotFound(profile.root.clone()));
    }

    let scratch = ScratchDir::create(scratch.to_path_buf(), ctx, remove_scratch)?;
    let result = stage_and_copy(archive, profile, scratch.path(), ctx);
    drop(scratch);

    match &result {
        Ok(RestoreOutcome::Restored) => ctx.log("Restore complete."),
        Ok(RestoreOutcome::Cancelled) => tracing::debug!("Restore of {:?} cancelled", archive),
        Err(e) => tracing::debug!("Restore of {:?} failed: {}", archive, e),
    }

    result
}

fn stage_and_copy(
    archive: &Path,
    profile: &GameProfile,
    scratch: &Path,
    ctx: &dyn JobContext,
) -> Result<RestoreOutcome, RestoreError> {
    tracing::debug!("Extracting {:?} into {:?}", archive, scratch);
    if !extract_archive(archive, scratch, ctx)? {
        ctx.log("Restore cancelled during extraction.");
        return Ok(RestoreOutcome::Cancelled);
    }

    let payload = find_payload(scratch, &profile.subfolders)?;
    if payload == Payload::Root && !profile.subfolders.is_empty() {
        ctx.log(&format!(
            "Backup has no {} folders; restoring its contents as-is.",
            profile.subfolders.join("/")
        ));
    }

    if !ctx.confirm(&confirmation_message(profile)) {
        ctx.log("Restore cancelled by user.");
        return Ok(RestoreOutcome::Cancelled);
    }
    if ctx.is_cancelled() {
        ctx.log("Restore cancelled before file copy.");
        return Ok(RestoreOutcome::Cancelled);
    }

    // Not atomic across subfolders: a failure here can leave a mix of old and new files
    match payload {
        Payload::Subfolders(folders) => {
            for folder in folders {
                let dest = profile.root.join(&folder);
                copy_dir_merge(&scratch.join(&folder), &dest)?;
                ctx.log(&format!("Restored {} to: {}", folder, dest.display()));
            }
        }
        Payload::Root => {
            copy_dir_merge(scratch, &profile.root)?;
            ctx.log(&format!("Restored backup contents to: {}", profile.root.display()));
        }
    }

    Ok(RestoreOutcome::Restored)
}

/// Extract every entry into `scratch`. Returns `false` if cancelled part way.
///
/// All entry names are checked before anything is written, so an archive with
/// an escaping path is rejected without extracting a single file.
fn extract_archive(
    archive_path: &Path,
    scratch: &Path,
    ctx: &dyn JobContext,
) -> Result<bool, RestoreError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let total = archive.len();

    for i in 0..total {
        let entry = archive.by_index_raw(i)?;
        if entry.enclosed_name().is_none() {
            return Err(RestoreError::ZipIntegrity(entry.name().to_string()));
        }
    }

    ctx.bound(total);

    for i in 0..total {
        if ctx.is_cancelled() {
            return Ok(false);
        }

        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| RestoreError::ZipIntegrity(name.clone()))?;
        let out_path = scratch.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out_file = File::create(&out_path)?;
            io::copy(&mut entry, &mut out_file)?;
        }

        ctx.log(&format!("Extracted: {}", name));
        ctx.progress(i + 1);
    }

    Ok(true)
}

/// Decide what to copy from the extracted archive
fn find_payload(scratch: &Path, subfolders: &[String]) -> Result<Payload, RestoreError> {
    let present: Vec<String> = subfolders
        .iter()
        .filter(|folder| scratch.join(folder.as_str()).is_dir())
        .cloned()
        .collect();

    if !present.is_empty() {
        return Ok(Payload::Subfolders(present));
    }

    if fs::read_dir(scratch)?.next().is_some() {
        return Ok(Payload::Root);
    }

    Err(RestoreError::NothingToRestore)
}
