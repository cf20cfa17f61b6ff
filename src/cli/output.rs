//! Terminal output helpers shared by all commands.
//!
//! Results go to stdout (as text or pretty JSON); progress and prompts go to
//! stderr so piped output stays machine-readable.

use std::io::Write;

use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a serializable value as JSON or use custom text formatter
pub fn print_formatted<T, F>(value: &T, format: OutputFormat, text_formatter: F)
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Text => println!("{}", text_formatter(value)),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("Failed to serialize output: {}", e),
        },
    }
}

/// Print a success message (suppressed in quiet mode)
pub fn print_success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message);
    }
}

/// Print an error message (never suppressed)
pub fn print_error(message: &str) {
    eprintln!("Error: {}", message);
}

/// Print a line prefixed with `[OK]` or a blank box
pub fn print_status(ok: bool, message: &str) {
    let marker = if ok { "[OK]" } else { "[  ]" };
    println!("{} {}", marker, message);
}

/// One-line progress indicator, e.g. `[####------] 4/10 (40%)`
pub fn progress_line(step: usize, total: usize) -> String {
    const WIDTH: usize = 20;

    if total == 0 {
        return format!("[{}] 0/0", "-".repeat(WIDTH));
    }

    let step = step.min(total);
    let filled = step * WIDTH / total;
    format!(
        "[{}{}] {}/{} ({}%)",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        step,
        total,
        step * 100 / total
    )
}

/// Redraw the progress indicator in place on stderr
pub fn draw_progress(step: usize, total: usize) {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "\r{}   ", progress_line(step, total));
    let _ = stderr.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line() {
        assert_eq!(progress_line(0, 4), "[--------------------] 0/4 (0%)");
        assert_eq!(progress_line(2, 4), "[##########----------] 2/4 (50%)");
        assert_eq!(progress_line(4, 4), "[####################] 4/4 (100%)");
    }

    #[test]
    fn test_progress_line_handles_empty_and_overshoot() {
        assert_eq!(progress_line(0, 0), "[--------------------] 0/0");
        assert_eq!(progress_line(9, 3), "[####################] 3/3 (100%)");
    }
}
