//! Verification Runner
//!
//! Runs quality-gate commands through the [`CommandExecutor`] under the
//! verifier role. Failing test-like commands get a bounded number of extra
//! attempts; one that recovers is recorded as a flaky pass and quarantined.

use crate::ports::progress::{ProgressEvent, RunProgressNotifier};
use crate::use_cases::command_executor::{CommandError, CommandExecutor, ExecutorRole};
use crate::use_cases::observability::ObservabilityTracker;
use cohort_domain::core::string::truncate;
use cohort_domain::verification::is_test_like_command;
use cohort_domain::{VerificationCheckResult, VerificationMode, VerificationOutcome};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const MAX_CHECK_OUTPUT: usize = 4_000;

pub struct VerificationRunner {
    executor: Arc<CommandExecutor>,
    observability: Arc<ObservabilityTracker>,
    quarantine: Mutex<BTreeSet<String>>,
}

impl VerificationRunner {
    pub fn new(executor: Arc<CommandExecutor>, observability: Arc<ObservabilityTracker>) -> Self {
        Self {
            executor,
            observability,
            quarantine: Mutex::new(BTreeSet::new()),
        }
    }

    /// Commands that recovered on retry at some point during the run.
    pub fn quarantined(&self) -> Vec<String> {
        match self.quarantine.lock() {
            Ok(q) => q.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    fn quarantine(&self, command: &str) {
        let mut guard = match self.quarantine.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(command.to_string());
    }

    /// Run `commands` in order and AND their results.
    ///
    /// Only cancellation is returned as an error; every other command
    /// failure becomes a failing check.
    pub async fn run(
        &self,
        commands: &[String],
        mode: VerificationMode,
        progress: &dyn RunProgressNotifier,
    ) -> Result<VerificationOutcome, CommandError> {
        let mut outcome = VerificationOutcome::skipped(mode);
        let retries = mode.flaky_retries();

        for command in commands {
            let test_like = is_test_like_command(command);
            let mut attempt = 1;

            loop {
                let (ok, output, duration_ms, retryable) =
                    match self.executor.execute(command, ExecutorRole::Verifier).await {
                        Ok(result) => {
                            let ok = result.ok();
                            let output = if ok {
                                result.output.combined()
                            } else {
                                format!(
                                    "exit code {}\n{}",
                                    result
                                        .output
                                        .exit_code
                                        .map_or("none".to_string(), |c| c.to_string()),
                                    result.output.combined()
                                )
                            };
                            (ok, output, result.duration_ms, true)
                        }
                        Err(CommandError::Cancelled) => return Err(CommandError::Cancelled),
                        Err(e @ CommandError::Timeout { .. }) => (false, e.to_string(), 0, true),
                        Err(e) => (false, e.to_string(), 0, false),
                    };

                let flaky_recovered = ok && attempt > 1;
                let check = VerificationCheckResult {
                    attempt,
                    command: command.clone(),
                    ok,
                    output: truncate(&output, MAX_CHECK_OUTPUT),
                    duration_ms,
                    flaky_recovered,
                };
                progress.on_event(&ProgressEvent::Verification {
                    mode,
                    command: command.clone(),
                    ok,
                    attempt,
                    flaky_recovered,
                });
                outcome.checks.push(check);

                if ok {
                    if flaky_recovered {
                        info!(command = %command, attempt, "Flaky command recovered; quarantined");
                        self.quarantine(command);
                        outcome.quarantined.push(command.clone());
                    }
                    break;
                }

                if test_like && retryable && attempt <= retries {
                    warn!(command = %command, attempt, "Test command failed; retrying");
                    attempt += 1;
                    continue;
                }

                warn!(command = %command, mode = %mode, "Verification command failed");
                self.observability.record_verification_failure(command);
                outcome.passed = false;
                break;
            }
        }

        Ok(outcome)
    }
}
