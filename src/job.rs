//! Background jobs.
//!
//! Every backup or restore runs on its own blocking worker thread. The
//! foreground holds a [`JobHandle`] to read events, cancel, and collect the
//! terminal outcome. Errors inside a worker are logged and turned into
//! [`JobOutcome::Failed`]; they never reach the caller as a panic.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::activity_log::ActivityLog;
use crate::backup::{self, BackupOutcome};
use crate::channel::{ChannelContext, JobContext, JobControl, JobEvent, JobOutcome};
use crate::games::GameProfile;
use crate::restore::{self, RestoreOutcome};
use crate::retention;

/// Errors raised when starting a job
#[derive(Error, Debug)]
pub enum JobError {
    #[error("A backup or restore for {0} is already running")]
    AlreadyRunning(String),

    #[error("Another job is already using {0}")]
    DestinationBusy(PathBuf),
}

/// Settings shared by every job in a session
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Application data directory; holds scratch directories
    pub data_dir: PathBuf,
    /// Where job log lines are mirrored
    pub activity_log: Option<Arc<ActivityLog>>,
}

impl JobOptions {
    pub fn new(data_dir: PathBuf) -> Self {
        let activity_log = Some(Arc::new(ActivityLog::new(&data_dir)));
        Self {
            data_dir,
            activity_log,
        }
    }
}

/// Parameters of a backup job
#[derive(Debug, Clone)]
pub struct BackupRequest {
    pub profile: GameProfile,
    /// Folder the archive is written to
    pub dest_dir: PathBuf,
    /// Archives to keep in `dest_dir` afterwards; 0 keeps all
    pub max_count: u32,
}

/// Parameters of a restore job
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub profile: GameProfile,
    pub archive: PathBuf,
}

/// Foreground side of a running job
pub struct JobHandle {
    events: UnboundedReceiver<JobEvent>,
    control: Arc<JobControl>,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    /// Next event from the worker; `None` once the worker has finished
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Ask the worker to stop at its next checkpoint
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Shared control, for cancelling from another task
    pub fn control(&self) -> Arc<JobControl> {
        self.control.clone()
    }

    /// Wait for the worker and return its outcome, discarding unread events
    pub async fn wait(self) -> JobOutcome {
        drop(self.events);
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Job worker panicked: {}", e);
                JobOutcome::Failed(format!("Job worker panicked: {}", e))
            }
        }
    }
}

/// Something only one job at a time may work on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Resource {
    /// A game's live save folder and its restore scratch directory
    Game(String),
    /// A backup folder, written by backups and pruned by sweeps
    Destination(PathBuf),
}

impl Resource {
    fn destination(dir: &Path) -> Self {
        Resource::Destination(normalize_dir(dir))
    }

    fn busy(&self) -> JobError {
        match self {
            Resource::Game(slug) => JobError::AlreadyRunning(slug.clone()),
            Resource::Destination(dir) => JobError::DestinationBusy(dir.clone()),
        }
    }
}

/// Canonical form of a folder that may not exist yet
fn normalize_dir(dir: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(dir) {
        return canonical;
    }
    match (dir.parent(), dir.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| dir.to_path_buf()),
        _ => dir.to_path_buf(),
    }
}

/// Resources held by a job in flight in this process
fn active_resources() -> &'static Mutex<HashSet<Resource>> {
    static ACTIVE: OnceLock<Mutex<HashSet<Resource>>> = OnceLock::new();
    ACTIVE.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Marks resources busy until dropped
struct ActiveGuard(Vec<Resource>);

impl ActiveGuard {
    /// Claim every resource or none of them
    fn claim(resources: Vec<Resource>) -> Result<Self, JobError> {
        let mut active = active_resources()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(taken) = resources.iter().find(|r| active.contains(*r)) {
            return Err(taken.busy());
        }
        active.extend(resources.iter().cloned());
        Ok(Self(resources))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut active = active_resources()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for resource in &self.0 {
            active.remove(resource);
        }
    }
}

fn spawn_job<F>(
    resources: Vec<Resource>,
    options: &JobOptions,
    work: F,
) -> Result<JobHandle, JobError>
where
    F: FnOnce(&ChannelContext) -> JobOutcome + Send + 'static,
{
    let guard = ActiveGuard::claim(resources)?;
    let (tx, events) = mpsc::unbounded_channel();
    let control = Arc::new(JobControl::default());
    let ctx = ChannelContext::new(tx, control.clone(), options.activity_log.clone());

    let task = tokio::task::spawn_blocking(move || {
        let outcome = work(&ctx);
        // Release before the foreground can observe the end of the job
        drop(guard);
        ctx.finish(outcome.clone());
        outcome
    });

    Ok(JobHandle {
        events,
        control,
        task,
    })
}

/// Start a backup job.
///
/// On success the job also removes a stale restore scratch directory for the
/// same game and applies the retention policy to the destination. The game
/// and the destination folder are both held until the job ends.
pub fn spawn_backup(request: BackupRequest, options: &JobOptions) -> Result<JobHandle, JobError> {
    let slug = request.profile.slug.clone();
    let scratch = restore::scratch_dir(&options.data_dir, &slug);
    let resources = vec![
        Resource::Game(slug),
        Resource::destination(&request.dest_dir),
    ];

    spawn_job(resources, options, move |ctx| {
        match backup::create_archive(&request.profile, &request.dest_dir, ctx) {
            Ok(BackupOutcome::Completed { archive, files }) => {
                tracing::info!("Backed up {} files to {:?}", files, archive);
                remove_stale_scratch(&scratch, ctx);
                let summary = retention::sweep(&request.dest_dir, request.max_count, ctx);
                ctx.swept(summary);
                JobOutcome::Done
            }
            Ok(BackupOutcome::Cancelled { archive, written }) => {
                tracing::info!(
                    "Backup cancelled after {} files, partial archive kept at {:?}",
                    written,
                    archive
                );
                JobOutcome::Cancelled
            }
            Err(e) => {
                ctx.log(&format!("[ERROR] Backup failed: {}", e));
                JobOutcome::Failed(e.to_string())
            }
        }
    })
}

/// Start a restore job
pub fn spawn_restore(request: RestoreRequest, options: &JobOptions) -> Result<JobHandle, JobError> {
    let slug = request.profile.slug.clone();
    let scratch = restore::scratch_dir(&options.data_dir, &slug);

    spawn_job(vec![Resource::Game(slug)], options, move |ctx| {
        match restore::restore_archive(&request.archive, &request.profile, &scratch, ctx) {
            Ok(RestoreOutcome::Restored) => JobOutcome::Done,
            Ok(RestoreOutcome::Cancelled) => JobOutcome::Cancelled,
            Err(e) => {
                ctx.log(&format!("[ERROR] Restore failed: {}", e));
                JobOutcome::Failed(e.to_string())
            }
        }
    })
}

/// Start a standalone retention sweep of `dest_dir`.
///
/// Refused while a backup into the same folder is running.
pub fn spawn_sweep(
    dest_dir: PathBuf,
    max_count: u32,
    options: &JobOptions,
) -> Result<JobHandle, JobError> {
    let resources = vec![Resource::destination(&dest_dir)];
    spawn_job(resources, options, move |ctx| {
        let summary = retention::sweep(&dest_dir, max_count, ctx);
        ctx.swept(summary);
        JobOutcome::Done
    })
}

fn remove_stale_scratch(scratch: &Path, ctx: &dyn JobContext) {
    if !scratch.exists() {
        return;
    }
    match remove_dir_all::remove_dir_all(scratch) {
        Ok(()) => ctx.log("Temporary restore folder cleaned."),
        Err(e) => ctx.log(&format!("[ERROR] Failed to clean temp folder: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn options(temp_dir: &TempDir) -> JobOptions {
        JobOptions::new(temp_dir.path().join("data"))
    }

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Drain events until the terminal one, answering confirmations with `answer`
    async fn drive(handle: &mut JobHandle, answer: Option<bool>) -> (Vec<String>, JobOutcome) {
        let mut logs = Vec::new();
        while let Some(event) = handle.next_event().await {
            match event {
                JobEvent::Log(line) => logs.push(line),
                JobEvent::ConfirmationRequired(request) => match answer {
                    Some(confirmed) => request.answer(confirmed),
                    None => drop(request),
                },
                JobEvent::Finished(outcome) => return (logs, outcome),
                _ => {}
            }
        }
        panic!("job ended without a terminal event");
    }

    #[tokio::test]
    async fn test_backup_job_runs_retention_and_finishes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        write(&root.join("saves/a.save"), b"a");
        let dest = temp_dir.path().join("backups");
        for (age, name) in [(2, "old_1.zip"), (1, "old_2.zip")] {
            write(&dest.join(name), b"zip");
            fs::File::options()
                .write(true)
                .open(dest.join(name))
                .unwrap()
                .set_modified(SystemTime::now() - Duration::from_secs(age * 3600))
                .unwrap();
        }
        let options = options(&temp_dir);
        let profile = GameProfile::with_root("job backup game", root);

        let stale = restore::scratch_dir(&options.data_dir, &profile.slug);
        fs::create_dir_all(&stale).unwrap();

        let mut handle = spawn_backup(
            BackupRequest {
                profile,
                dest_dir: dest.clone(),
                max_count: 2,
            },
            &options,
        )
        .unwrap();

        let mut swept = None;
        let mut outcome = None;
        while let Some(event) = handle.next_event().await {
            match event {
                JobEvent::Swept(summary) => swept = Some(summary),
                JobEvent::Finished(o) => outcome = Some(o),
                _ => {}
            }
        }

        assert_eq!(outcome, Some(JobOutcome::Done));
        assert_eq!(
            swept.as_deref(),
            Some("Cleanup complete. 1 old backup(s) removed.")
        );
        let kept: Vec<String> = backup::list_archives(&dest)
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], "old_2");
        assert!(!stale.exists());
        assert_eq!(handle.wait().await, JobOutcome::Done);

        let activity = fs::read_to_string(options.data_dir.join("sbu_log.txt")).unwrap();
        assert!(activity.contains("Added: saves/a.save"));
    }

    #[tokio::test]
    async fn test_backup_job_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let profile = GameProfile::with_root("job missing game", temp_dir.path().join("missing"));

        let mut handle = spawn_backup(
            BackupRequest {
                profile,
                dest_dir: temp_dir.path().join("backups"),
                max_count: 0,
            },
            &options(&temp_dir),
        )
        .unwrap();

        let (logs, outcome) = drive(&mut handle, None).await;
        assert!(matches!(outcome, JobOutcome::Failed(_)));
        assert!(logs.last().unwrap().starts_with("[ERROR] Backup failed: Save folder not found"));
    }

    /// Root with live data plus an archive holding a newer `saves/slot.save`
    fn restore_fixture(temp_dir: &TempDir, game: &str) -> (GameProfile, PathBuf) {
        let root = temp_dir.path().join("live");
        write(&root.join("saves/slot.save"), b"live");
        let archive_src = temp_dir.path().join("archived");
        write(&archive_src.join("saves/slot.save"), b"archived");

        let source = GameProfile::with_root(game, archive_src);
        let ctx = crate::channel::testing::RecordingContext::new();
        let BackupOutcome::Completed { archive, .. } =
            backup::create_archive(&source, &temp_dir.path().join("backups"), &ctx).unwrap()
        else {
            panic!("fixture backup failed");
        };

        (GameProfile::with_root(game, root), archive)
    }

    #[tokio::test]
    async fn test_restore_job_confirmed() {
        let temp_dir = TempDir::new().unwrap();
        let (profile, archive) = restore_fixture(&temp_dir, "job restore yes");
        let options = options(&temp_dir);
        let root = profile.root.clone();
        let scratch = restore::scratch_dir(&options.data_dir, &profile.slug);

        let mut handle = spawn_restore(RestoreRequest { profile, archive }, &options).unwrap();
        let (logs, outcome) = drive(&mut handle, Some(true)).await;

        assert_eq!(outcome, JobOutcome::Done);
        assert_eq!(fs::read(root.join("saves/slot.save")).unwrap(), b"archived");
        assert!(!scratch.exists());
        assert_eq!(logs.last().unwrap(), "Restore complete.");
    }

    #[tokio::test]
    async fn test_restore_job_dismissed_confirmation_is_no() {
        let temp_dir = TempDir::new().unwrap();
        let (profile, archive) = restore_fixture(&temp_dir, "job restore dismissed");
        let options = options(&temp_dir);
        let root = profile.root.clone();

        let mut handle = spawn_restore(RestoreRequest { profile, archive }, &options).unwrap();
        let (_, outcome) = drive(&mut handle, None).await;

        assert_eq!(outcome, JobOutcome::Cancelled);
        assert_eq!(fs::read(root.join("saves/slot.save")).unwrap(), b"live");
    }

    #[tokio::test]
    async fn test_cancel_while_awaiting_confirmation() {
        let temp_dir = TempDir::new().unwrap();
        let (profile, archive) = restore_fixture(&temp_dir, "job restore cancel");
        let options = options(&temp_dir);
        let root = profile.root.clone();
        let scratch = restore::scratch_dir(&options.data_dir, &profile.slug);

        let mut handle = spawn_restore(RestoreRequest { profile, archive }, &options).unwrap();

        let mut pending = None;
        while let Some(event) = handle.next_event().await {
            if let JobEvent::ConfirmationRequired(request) = event {
                pending = Some(request);
                break;
            }
        }
        let request = pending.expect("restore should ask for confirmation");
        handle.cancel();

        let outcome = handle.wait().await;
        drop(request);

        assert_eq!(outcome, JobOutcome::Cancelled);
        assert_eq!(fs::read(root.join("saves/slot.save")).unwrap(), b"live");
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_second_job_for_same_game_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let (profile, archive) = restore_fixture(&temp_dir, "job busy game");
        let options = options(&temp_dir);

        let mut first = spawn_restore(
            RestoreRequest {
                profile: profile.clone(),
                archive: archive.clone(),
            },
            &options,
        )
        .unwrap();

        // Hold the first job at its confirmation gate
        let mut request = None;
        while let Some(event) = first.next_event().await {
            if let JobEvent::ConfirmationRequired(r) = event {
                request = Some(r);
                break;
            }
        }

        let second = spawn_backup(
            BackupRequest {
                profile: profile.clone(),
                dest_dir: temp_dir.path().join("backups"),
                max_count: 0,
            },
            &options,
        );
        assert!(matches!(second, Err(JobError::AlreadyRunning(_))));

        request.unwrap().answer(false);
        assert_eq!(first.wait().await, JobOutcome::Cancelled);

        // Released once the first job is over
        let third = spawn_restore(RestoreRequest { profile, archive }, &options).unwrap();
        third.cancel();
        assert_eq!(third.wait().await, JobOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_destination_is_shared_by_backups_and_sweeps() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("shared backups");
        let root = temp_dir.path().join("root");
        write(&root.join("saves/a.save"), b"a");
        let options = options(&temp_dir);

        // Stand in for a backup into `dest` that is still running
        let held = ActiveGuard::claim(vec![Resource::destination(&dest)]).unwrap();

        let sweep = spawn_sweep(dest.clone(), 1, &options);
        assert!(matches!(sweep, Err(JobError::DestinationBusy(_))));

        let other_game = spawn_backup(
            BackupRequest {
                profile: GameProfile::with_root("job other game", root.clone()),
                dest_dir: dest.clone(),
                max_count: 0,
            },
            &options,
        );
        assert!(matches!(other_game, Err(JobError::DestinationBusy(_))));

        // The same folder spelled differently is still the same destination
        let dotted = temp_dir.path().join(".").join("shared backups");
        assert!(matches!(
            spawn_sweep(dotted, 1, &options),
            Err(JobError::DestinationBusy(_))
        ));

        drop(held);

        let mut sweep = spawn_sweep(dest.clone(), 1, &options).unwrap();
        let mut swept = None;
        while let Some(event) = sweep.next_event().await {
            if let JobEvent::Swept(summary) = event {
                swept = Some(summary);
            }
        }
        assert_eq!(
            swept.as_deref(),
            Some("Cleanup complete. No old backups needed removal.")
        );
        assert_eq!(sweep.wait().await, JobOutcome::Done);
    }

    #[test]
    fn test_failed_claim_takes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let game = Resource::Game("job partial claim".to_string());
        let dest = Resource::destination(temp_dir.path());

        let held = ActiveGuard::claim(vec![dest.clone()]).unwrap();
        let refused = ActiveGuard::claim(vec![game.clone(), dest.clone()]);
        assert!(matches!(refused, Err(JobError::DestinationBusy(_))));

        // The game must not have been left marked busy by the refused claim
        let game_only = ActiveGuard::claim(vec![game]).unwrap();
        drop(game_only);
        drop(held);
    }
}
