//! Backup retention enforcement

use std::fs;
use std::io;
use std::path::Path;

use crate::backup::list_archives;
use crate::channel::JobContext;

/// Delete the oldest archives in `dest_dir` until at most `max_count` remain.
///
/// Age is file modification time, not the name. `max_count == 0` keeps
/// everything. A failed deletion is logged and the sweep moves on. Returns a
/// one-line summary for the user.
pub fn sweep(dest_dir: &Path, max_count: u32, ctx: &dyn JobContext) -> String {
    let remove = |path: &Path| fs::remove_file(path);
    let summary = match sweep_archives(dest_dir, max_count, ctx, &remove) {
        Ok(summary) => summary,
        Err(e) => format!("[ERROR] Cleanup error: {}", e),
    };
    ctx.log(&summary);
    summary
}

fn sweep_archives(
    dest_dir: &Path,
    max_count: u32,
    ctx: &dyn JobContext,
    remove: &dyn Fn(&Path) -> io::Result<()>,
) -> io::Result<String> {
    if max_count == 0 {
        return Ok("Unlimited backups is set!".to_string());
    }

    let archives = list_archives(dest_dir)?;
    let keep = max_count as usize;
    if archives.len() <= keep {
        return Ok("Cleanup complete. No old backups needed removal.".to_string());
    }

    let to_delete = archives.len() - keep;
    let mut removed = 0;

    for archive in archives.into_iter().take(to_delete) {
        match remove(&archive.path) {
            Ok(()) => {
                removed += 1;
                ctx.log(&format!("Deleted old backup: {}.zip", archive.name));
            }
            Err(e) => {
                tracing::warn!("Failed to delete old backup {}: {}", archive.name, e);
                ctx.log(&format!("[ERROR] Failed to delete {}.zip: {}", archive.name, e));
            }
        }
    }

    if removed == 0 {
        Ok("Cleanup complete. No old backups were removed.".to_string())
    } else {
        Ok(format!(
            "Cleanup complete. {} old backup(s) removed.",
            removed
        ))
    }
}
