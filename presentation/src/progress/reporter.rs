//! Progress reporting for runs

use cohort_application::ports::progress::{ProgressEvent, RunProgressNotifier};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Spinner-based reporter: the spinner shows the current phase, finished
/// steps and verification checks are printed above it.
pub struct ProgressReporter {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn with_spinner(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        let mut guard = match self.spinner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }

    fn println(&self, line: String) {
        self.with_spinner(|spinner| match spinner {
            Some(pb) => pb.println(line),
            None => eprintln!("{}", line),
        });
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl RunProgressNotifier for ProgressReporter {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { goal, dry_run, .. } => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(Self::spinner_style());
                pb.enable_steady_tick(Duration::from_millis(120));
                pb.set_prefix("starting");
                pb.set_message(goal.clone());
                self.with_spinner(|spinner| *spinner = Some(pb));
                if *dry_run {
                    self.println(format!("{} dry run: no files will be changed", "!".yellow()));
                }
            }
            ProgressEvent::Status {
                phase,
                unit_id,
                message,
            } => self.with_spinner(|spinner| {
                if let Some(pb) = spinner {
                    pb.set_prefix(phase.as_str());
                    match unit_id {
                        Some(id) => pb.set_message(format!("[{}] {}", id, message)),
                        None => pb.set_message(message.clone()),
                    }
                }
            }),
            ProgressEvent::Step { .. } | ProgressEvent::Verification { .. } => {
                if let Some(line) = format_event_line(event) {
                    self.println(line);
                }
            }
            ProgressEvent::Completed { status, .. } => self.with_spinner(|spinner| {
                if let Some(pb) = spinner.take() {
                    let text = if status.is_success() {
                        status.as_str().green()
                    } else {
                        status.as_str().red()
                    };
                    pb.finish_with_message(format!("run {}", text));
                }
            }),
            ProgressEvent::Failed { error } => self.with_spinner(|spinner| {
                if let Some(pb) = spinner.take() {
                    pb.abandon_with_message(format!("{} {}", "run failed:".red(), error));
                }
            }),
        }
    }
}

/// Plain line-per-event progress (no spinner)
pub struct SimpleProgress;

impl RunProgressNotifier for SimpleProgress {
    fn on_event(&self, event: &ProgressEvent) {
        if let Some(line) = format_event_line(event) {
            eprintln!("{}", line);
        }
    }
}

/// One-line rendering of an event; `None` for events that only update state.
pub fn format_event_line(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::Started { goal, dry_run, .. } => Some(format!(
            "{} {}{}",
            "->".cyan(),
            goal.bold(),
            if *dry_run { " (dry run)" } else { "" }
        )),
        ProgressEvent::Status {
            phase,
            unit_id,
            message,
        } => Some(match unit_id {
            Some(id) => format!("{} {} [{}] {}", "->".cyan(), phase, id, message),
            None => format!("{} {} {}", "->".cyan(), phase, message),
        }),
        ProgressEvent::Step {
            unit_id,
            role,
            action,
            summary,
            duration_ms,
        } => Some(format!(
            "  {} [{}] {} {}: {} {}",
            "v".green(),
            unit_id,
            role,
            action,
            summary,
            format!("({} ms)", duration_ms).dimmed()
        )),
        ProgressEvent::Verification {
            mode,
            command,
            ok,
            attempt,
            flaky_recovered,
        } => {
            let mark = if *ok { "v".green() } else { "x".red() };
            let mut line = format!("  {} {} `{}`", mark, mode, command);
            if *attempt > 1 {
                line.push_str(&format!(" (attempt {})", attempt));
            }
            if *flaky_recovered {
                line.push_str(&format!(" {}", "flaky".yellow()));
            }
            Some(line)
        }
        ProgressEvent::Completed { status, summary } => {
            Some(format!("{} run {}: {}", "=>".cyan(), status, summary))
        }
        ProgressEvent::Failed { error } => Some(format!("{} {}", "x".red(), error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_domain::{RunPhase, SubagentRole, VerificationMode};

    fn plain(line: Option<String>) -> String {
        colored::control::set_override(false);
        line.unwrap_or_default()
    }

    #[test]
    fn test_step_line() {
        let line = plain(format_event_line(&ProgressEvent::Step {
            unit_id: "api".into(),
            role: SubagentRole::Coder,
            action: "propose_changes".into(),
            summary: "2 changes".into(),
            duration_ms: 40,
        }));
        assert!(line.contains("[api] coder propose_changes: 2 changes"));
        assert!(line.contains("(40 ms)"));
    }

    #[test]
    fn test_flaky_verification_line() {
        let line = plain(format_event_line(&ProgressEvent::Verification {
            mode: VerificationMode::Final,
            command: "cargo test".into(),
            ok: true,
            attempt: 2,
            flaky_recovered: true,
        }));
        assert!(line.contains("final `cargo test` (attempt 2) flaky"));
    }

    #[test]
    fn test_unit_status_line() {
        let line = plain(format_event_line(&ProgressEvent::unit_status(
            RunPhase::Scheduling,
            "db",
            "attempt 2",
        )));
        assert!(line.contains("scheduling [db] attempt 2"));
    }
}
