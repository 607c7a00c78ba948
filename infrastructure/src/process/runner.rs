//! Process runner backed by `tokio::process`.
//!
//! Programs are spawned directly (no `sh -c`), with piped output and a hard
//! timeout. A timed-out child is killed and reported with `timed_out = true`.

use async_trait::async_trait;
use cohort_application::ports::process_runner::{
    ProcessError, ProcessOutput, ProcessRequest, ProcessRunner,
};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Maximum captured size per stream (1 MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput, ProcessError> {
        if !request.cwd.is_dir() {
            return Err(ProcessError::Io(format!(
                "Working directory does not exist: {}",
                request.cwd.display()
            )));
        }

        let child = Command::new(&request.program)
            .args(&request.args)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProcessError::Spawn {
                program: request.program.clone(),
                message: e.to_string(),
            })?;

        debug!(program = %request.program, args = ?request.args, "Spawned process");

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(request.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ProcessOutput {
                exit_code: output.status.code(),
                stdout: capture(&output.stdout),
                stderr: capture(&output.stderr),
                timed_out: false,
            }),
            Ok(Err(e)) => Err(ProcessError::Io(e.to_string())),
            Err(_) => {
                warn!(
                    program = %request.program,
                    timeout_secs = request.timeout.as_secs(),
                    "Process timed out"
                );
                Ok(ProcessOutput {
                    exit_code: None,
                    timed_out: true,
                    ..Default::default()
                })
            }
        }
    }

    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

fn capture(bytes: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if text.len() > MAX_OUTPUT_SIZE {
        let mut cut = MAX_OUTPUT_SIZE;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("\n... (output truncated)");
    }
    text
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(program: &str, args: &[&str], timeout: Duration) -> ProcessRequest {
        ProcessRequest {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: std::env::temp_dir(),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let runner = TokioProcessRunner::new();
        let output = runner
            .run(&request("echo", &["hello"], Duration::from_secs(10)))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_expanded() {
        let runner = TokioProcessRunner::new();
        let output = runner
            .run(&request("echo", &["$HOME", "&&", "ls"], Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "$HOME && ls");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = TokioProcessRunner::new();
        let output = runner
            .run(&request("sleep", &["5"], Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(output.timed_out);
        assert!(!output.success());
        assert_eq!(output.exit_code, None);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = TokioProcessRunner::new();
        let err = runner
            .run(&request(
                "definitely-not-a-real-program-xyz",
                &[],
                Duration::from_secs(1),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert!(!runner.is_available("definitely-not-a-real-program-xyz"));
    }

    #[test]
    fn test_capture_truncates_large_output() {
        let big = vec![b'a'; MAX_OUTPUT_SIZE + 10];
        let text = capture(&big);
        assert!(text.ends_with("(output truncated)"));
    }
}
