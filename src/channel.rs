//! Progress and cancellation channel between a job worker and the foreground.
//!
//! The worker reports through a [`JobContext`]. In production that is a
//! [`ChannelContext`], which forwards events over an unbounded channel in the
//! order they happen and shares a [`JobControl`] with the foreground for
//! cancellation and restore confirmation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tokio::sync::mpsc::UnboundedSender;

use crate::activity_log::ActivityLog;

/// Terminal state of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    Cancelled,
    Failed(String),
}

impl JobOutcome {
    pub fn description(&self) -> String {
        match self {
            Self::Done => "Complete".to_string(),
            Self::Cancelled => "Cancelled".to_string(),
            Self::Failed(reason) => format!("Failed: {}", reason),
        }
    }
}

/// Notifications sent from a worker to the foreground
#[derive(Debug)]
pub enum JobEvent {
    /// Total number of steps; sent before the first progress tick
    Bound(usize),
    /// Steps completed so far (1-indexed, strictly increasing)
    Progress(usize),
    /// Human-readable log line
    Log(String),
    /// The worker is blocked until this request is answered
    ConfirmationRequired(ConfirmRequest),
    /// Retention sweep summary after a successful backup
    Swept(String),
    /// Last event of every job
    Finished(JobOutcome),
}

/// Answer to a restore confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confirmation {
    #[default]
    Pending,
    Yes,
    No,
}

/// State shared between the foreground and one job's worker
#[derive(Debug, Default)]
pub struct JobControl {
    cancelled: AtomicBool,
    confirmation: Mutex<Confirmation>,
    changed: Condvar,
}

impl JobControl {
    /// Request cancellation. Also wakes a worker waiting for confirmation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _state = self.lock_confirmation();
        self.changed.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Settle a pending confirmation. Later answers are ignored.
    pub fn resolve(&self, confirmed: bool) {
        let mut state = self.lock_confirmation();
        if *state == Confirmation::Pending {
            *state = if confirmed {
                Confirmation::Yes
            } else {
                Confirmation::No
            };
        }
        self.changed.notify_all();
    }

    /// Current confirmation state
    pub fn confirmation(&self) -> Confirmation {
        *self.lock_confirmation()
    }

    /// Block until the confirmation is settled or the job is cancelled.
    ///
    /// Cancellation counts as a negative answer.
    pub fn wait_for_confirmation(&self) -> bool {
        let mut state = self.lock_confirmation();
        loop {
            if self.is_cancelled() {
                return false;
            }
            match *state {
                Confirmation::Yes => return true,
                Confirmation::No => return false,
                Confirmation::Pending => {
                    state = self
                        .changed
                        .wait(state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
            }
        }
    }

    fn lock_confirmation(&self) -> MutexGuard<'_, Confirmation> {
        self.confirmation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A pending destructive-action confirmation.
///
/// Dropping the request without calling [`ConfirmRequest::answer`] counts as
/// "no", the same as dismissing a dialog.
pub struct ConfirmRequest {
    message: String,
    control: Arc<JobControl>,
    answered: bool,
}

impl ConfirmRequest {
    pub fn new(message: impl Into<String>, control: Arc<JobControl>) -> Self {
        Self {
            message: message.into(),
            control,
            answered: false,
        }
    }

    /// Warning text to present to the user
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn answer(mut self, confirmed: bool) {
        self.answered = true;
        self.control.resolve(confirmed);
    }
}

impl Drop for ConfirmRequest {
    fn drop(&mut self) {
        if !self.answered {
            self.control.resolve(false);
        }
    }
}

impl fmt::Debug for ConfirmRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfirmRequest")
            .field("message", &self.message)
            .finish()
    }
}

/// Reporting and control surface seen by a running job
pub trait JobContext {
    /// Announce the total number of steps
    fn bound(&self, total: usize);

    /// Report `step` completed steps
    fn progress(&self, step: usize);

    /// Emit a log line
    fn log(&self, line: &str);

    /// Whether cancellation has been requested
    fn is_cancelled(&self) -> bool;

    /// Ask for confirmation and block until answered; `false` on cancel
    fn confirm(&self, message: &str) -> bool;
}

/// [`JobContext`] that forwards everything to the foreground over a channel
pub struct ChannelContext {
    tx: UnboundedSender<JobEvent>,
    control: Arc<JobControl>,
    activity_log: Option<Arc<ActivityLog>>,
}

impl ChannelContext {
    pub fn new(
        tx: UnboundedSender<JobEvent>,
        control: Arc<JobControl>,
        activity_log: Option<Arc<ActivityLog>>,
    ) -> Self {
        Self {
            tx,
            control,
            activity_log,
        }
    }

    /// Report the retention sweep summary
    pub fn swept(&self, summary: String) {
        let _ = self.tx.send(JobEvent::Swept(summary));
    }

    /// Send the terminal event
    pub fn finish(&self, outcome: JobOutcome) {
        let _ = self.tx.send(JobEvent::Finished(outcome));
    }
}

impl JobContext for ChannelContext {
    fn bound(&self, total: usize) {
        let _ = self.tx.send(JobEvent::Bound(total));
    }

    fn progress(&self, step: usize) {
        let _ = self.tx.send(JobEvent::Progress(step));
    }

    fn log(&self, line: &str) {
        tracing::debug!("{}", line);
        if let Some(activity_log) = &self.activity_log {
            if let Err(e) = activity_log.append(line) {
                tracing::warn!("Failed to write activity log: {}", e);
            }
        }
        let _ = self.tx.send(JobEvent::Log(line.to_string()));
    }

    fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    fn confirm(&self, message: &str) -> bool {
        if self.control.is_cancelled() {
            return false;
        }
        let request = ConfirmRequest::new(message, self.control.clone());
        // If the foreground is gone the request comes back and is dropped as a "no"
        if self.tx.send(JobEvent::ConfirmationRequired(request)).is_err() {
            return false;
        }
        self.control.wait_for_confirmation()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_resolve_only_settles_once() {
        let control = JobControl::default();
        control.resolve(true);
        control.resolve(false);
        assert_eq!(control.confirmation(), Confirmation::Yes);
        assert!(control.wait_for_confirmation());
    }

    #[test]
    fn test_wait_wakes_on_answer() {
        let control = Arc::new(JobControl::default());
        let waiter = {
            let control = control.clone();
            thread::spawn(move || control.wait_for_confirmation())
        };

        thread::sleep(Duration::from_millis(20));
        control.resolve(true);

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_cancel_wakes_waiter_as_no() {
        let control = Arc::new(JobControl::default());
        let waiter = {
            let control = control.clone();
            thread::spawn(move || control.wait_for_confirmation())
        };

        thread::sleep(Duration::from_millis(20));
        control.cancel();

        assert!(!waiter.join().unwrap());
        assert_eq!(control.confirmation(), Confirmation::Pending);
    }

    #[test]
    fn test_dropped_request_counts_as_no() {
        let control = Arc::new(JobControl::default());
        let request = ConfirmRequest::new("Overwrite?", control.clone());
        assert_eq!(request.message(), "Overwrite?");
        drop(request);
        assert_eq!(control.confirmation(), Confirmation::No);
    }

    #[test]
    fn test_channel_context_preserves_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = ChannelContext::new(tx, Arc::new(JobControl::default()), None);

        ctx.bound(2);
        ctx.log("Added: a");
        ctx.progress(1);
        ctx.log("Added: b");
        ctx.progress(2);
        ctx.finish(JobOutcome::Done);

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(format!("{:?}", event));
        }
        assert_eq!(
            seen,
            vec![
                "Bound(2)",
                "Log(\"Added: a\")",
                "Progress(1)",
                "Log(\"Added: b\")",
                "Progress(2)",
                "Finished(Done)",
            ]
        );
    }

    #[test]
    fn test_confirm_without_receiver_is_no() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let ctx = ChannelContext::new(tx, Arc::new(JobControl::default()), None);
        assert!(!ctx.confirm("Overwrite?"));
    }

    #[test]
    fn test_confirm_after_cancel_sends_no_request() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let control = Arc::new(JobControl::default());
        let ctx = ChannelContext::new(tx, control.clone(), None);

        control.cancel();

        assert!(!ctx.confirm("Overwrite?"));
        assert!(rx.try_recv().is_err());
        assert_eq!(control.confirmation(), Confirmation::Pending);
    }
}
