//! Foreground rendering of a running job

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::Serialize;

use super::Session;
use crate::channel::{JobEvent, JobOutcome};
use crate::cli::output::{draw_progress, OutputFormat};
use crate::job::JobHandle;

/// What the foreground saw of a finished job
#[derive(Debug, Serialize)]
pub struct JobReport {
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep: Option<String>,
    pub log: Vec<String>,
    #[serde(skip)]
    pub result: JobOutcome,
}

impl JobReport {
    /// Cancelled runs are not errors; failed ones are
    pub fn into_result(self) -> Result<Self> {
        match &self.result {
            JobOutcome::Failed(reason) => Err(anyhow::anyhow!("{}", reason)),
            _ => Ok(self),
        }
    }
}

/// How confirmation requests are answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    Prompt,
    AssumeYes,
}

/// Consume a job's events until it finishes.
///
/// Progress goes to stderr. Ctrl-C requests cancellation once; the job then
/// stops at its next checkpoint.
pub async fn drive(mut handle: JobHandle, session: &Session, confirm: Confirm) -> JobReport {
    let control = handle.control();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut interrupted = false;
    let mut total = 0;
    let mut drawn = false;
    let mut sweep = None;
    let mut log = Vec::new();

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                match event {
                    JobEvent::Bound(n) => total = n,
                    JobEvent::Progress(step) => {
                        if session.shows_progress() && !session.verbose {
                            draw_progress(step, total);
                            drawn = true;
                        }
                    }
                    JobEvent::Log(line) => {
                        if session.verbose && session.format == OutputFormat::Text {
                            eprintln!("{}", line);
                        }
                        log.push(line);
                    }
                    JobEvent::ConfirmationRequired(request) => {
                        if drawn {
                            eprintln!();
                            drawn = false;
                        }
                        let answer = match confirm {
                            Confirm::AssumeYes => true,
                            Confirm::Prompt => prompt_yes_no(request.message().to_string()).await,
                        };
                        request.answer(answer);
                    }
                    JobEvent::Swept(summary) => sweep = Some(summary),
                    JobEvent::Finished(_) => break,
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if session.format == OutputFormat::Text {
                    eprintln!("\nCancelling...");
                }
                control.cancel();
            }
        }
    }

    if drawn {
        eprintln!();
    }

    let result = handle.wait().await;

    JobReport {
        outcome: result.description(),
        sweep,
        log,
        result,
    }
}

/// Ask a yes/no question on the terminal. Ctrl-C and end of input mean "no".
async fn prompt_yes_no(message: String) -> bool {
    let answer = tokio::task::spawn_blocking(move || {
        eprintln!("{}", message);
        let mut editor = DefaultEditor::new()?;
        loop {
            match editor.readline("Continue? [y/N] ") {
                Ok(line) => match parse_answer(&line) {
                    Some(answer) => return Ok(answer),
                    None => eprintln!("Please answer 'y' or 'n'."),
                },
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(false),
                Err(e) => return Err(e),
            }
        }
    })
    .await;

    match answer {
        Ok(Ok(answer)) => answer,
        Ok(Err(e)) => {
            tracing::warn!("Could not read confirmation: {}", e);
            false
        }
        Err(e) => {
            tracing::warn!("Confirmation prompt failed: {}", e);
            false
        }
    }
}

fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "" | "n" | "no" => Some(false),
        _ => None,
    }
}
