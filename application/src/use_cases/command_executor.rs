//! Command Executor
//!
//! Runs allow-listed programs through the [`ProcessRunner`] port with a fixed
//! timeout, a hard run budget and role-based permissions. No shell is ever
//! involved: commands are split into program and arguments first.

use crate::ports::process_runner::{ProcessOutput, ProcessRequest, ProcessRunner};
use crate::use_cases::shared::{Cancelled, cancellable, check_cancelled};
use cohort_domain::verification::{CommandSyntaxError, split_command};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Invalid command: {0}")]
    Syntax(#[from] CommandSyntaxError),

    #[error("Program not allow-listed: {0}")]
    NotAllowed(String),

    #[error("Subcommand denied by policy: {program} {subcommand}")]
    SubcommandDenied { program: String, subcommand: String },

    #[error("Role {role} is denied running {program}")]
    RoleDenied { role: ExecutorRole, program: String },

    #[error("Command budget exhausted ({max} runs)")]
    BudgetExhausted { max: usize },

    #[error("Program not found: {0}")]
    Unavailable(String),

    #[error("Failed to run {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("Command timed out after {secs}s: {command}")]
    Timeout { command: String, secs: u64 },

    #[error("Operation cancelled")]
    Cancelled,
}

impl CommandError {
    /// Refused by policy before anything ran.
    pub fn is_policy_denial(&self) -> bool {
        matches!(
            self,
            CommandError::NotAllowed(_)
                | CommandError::SubcommandDenied { .. }
                | CommandError::RoleDenied { .. }
                | CommandError::BudgetExhausted { .. }
        )
    }
}

impl From<Cancelled> for CommandError {
    fn from(_: Cancelled) -> Self {
        CommandError::Cancelled
    }
}

/// Who is asking to run a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorRole {
    /// Quality gates: any allow-listed program
    Verifier,
    /// Read-only inspection
    Inspector,
}

impl std::fmt::Display for ExecutorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorRole::Verifier => write!(f, "verifier"),
            ExecutorRole::Inspector => write!(f, "inspector"),
        }
    }
}

/// Subcommands that mutate shared state or publish, denied for every role.
const DENIED_SUBCOMMANDS: &[(&str, &[&str])] = &[
    (
        "git",
        &[
            "push", "commit", "reset", "checkout", "clean", "rebase", "merge", "stash", "tag",
            "remote", "config",
        ],
    ),
    ("cargo", &["publish", "install", "login", "yank", "owner"]),
    ("npm", &["publish", "login", "adduser", "unpublish", "deprecate"]),
    ("pnpm", &["publish", "login"]),
    ("yarn", &["publish", "login"]),
    ("go", &["install"]),
];

const INSPECTOR_PROGRAMS: &[&str] = &["ls", "cat", "rg", "grep", "git"];
const INSPECTOR_GIT_SUBCOMMANDS: &[&str] = &["status", "diff", "log", "show", "ls-files"];

/// Maximum characters of process output kept per command.
const MAX_OUTPUT_CHARS: usize = 20_000;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub command: String,
    pub output: ProcessOutput,
    pub duration_ms: u64,
}

impl CommandResult {
    pub fn ok(&self) -> bool {
        self.output.success()
    }
}

/// Budgeted, allow-listed command execution.
pub struct CommandExecutor {
    runner: Arc<dyn ProcessRunner>,
    cwd: PathBuf,
    allowed_programs: HashSet<String>,
    max_runs: usize,
    runs: AtomicUsize,
    timeout: Duration,
    availability: Mutex<HashMap<String, bool>>,
    cancellation: CancellationToken,
}

impl CommandExecutor {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        cwd: impl Into<PathBuf>,
        allowed_programs: impl IntoIterator<Item = String>,
        max_runs: usize,
    ) -> Self {
        Self {
            runner,
            cwd: cwd.into(),
            allowed_programs: allowed_programs.into_iter().collect(),
            max_runs,
            runs: AtomicUsize::new(0),
            timeout: Duration::from_secs(120),
            availability: Mutex::new(HashMap::new()),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn runs_used(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn max_runs(&self) -> usize {
        self.max_runs
    }

    /// Run `command` on behalf of `role`.
    ///
    /// A non-zero exit is still `Ok`; callers inspect [`CommandResult::ok`].
    pub async fn execute(
        &self,
        command: &str,
        role: ExecutorRole,
    ) -> Result<CommandResult, CommandError> {
        check_cancelled(&self.cancellation)?;

        let (program, args) = split_command(command)?;
        self.authorize(&program, &args, role)?;

        if !self.is_available(&program) {
            return Err(CommandError::Unavailable(program));
        }

        self.reserve_run()?;

        let request = ProcessRequest {
            program: program.clone(),
            args,
            cwd: self.cwd.clone(),
            timeout: self.timeout,
        };

        info!(command = %command, role = %role, "Running command");
        let start = Instant::now();
        let runner = self.runner.clone();
        let mut output = cancellable(&self.cancellation, async move {
            runner.run(&request).await.map_err(|e| CommandError::Spawn {
                command: command.to_string(),
                message: e.to_string(),
            })
        })
        .await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if output.timed_out {
            warn!(command = %command, "Command timed out");
            return Err(CommandError::Timeout {
                command: command.to_string(),
                secs: self.timeout.as_secs(),
            });
        }

        truncate_output(&mut output.stdout);
        truncate_output(&mut output.stderr);
        debug!(command = %command, exit_code = ?output.exit_code, duration_ms, "Command finished");

        Ok(CommandResult {
            command: command.to_string(),
            output,
            duration_ms,
        })
    }

    fn authorize(&self, program: &str, args: &[String], role: ExecutorRole) -> Result<(), CommandError> {
        if program.contains('/') || program.contains('\\') || !self.allowed_programs.contains(program)
        {
            return Err(CommandError::NotAllowed(program.to_string()));
        }

        let subcommand = args.iter().find(|a| !a.starts_with('-'));
        if let Some(sub) = subcommand
            && DENIED_SUBCOMMANDS
                .iter()
                .any(|(p, denied)| *p == program && denied.contains(&sub.as_str()))
        {
            return Err(CommandError::SubcommandDenied {
                program: program.to_string(),
                subcommand: sub.clone(),
            });
        }

        if role == ExecutorRole::Inspector {
            let read_only = INSPECTOR_PROGRAMS.contains(&program)
                && (program != "git"
                    || subcommand.is_some_and(|s| INSPECTOR_GIT_SUBCOMMANDS.contains(&s.as_str())));
            if !read_only {
                return Err(CommandError::RoleDenied {
                    role,
                    program: program.to_string(),
                });
            }
        }
        Ok(())
    }

    fn is_available(&self, program: &str) -> bool {
        let mut cache = match self.availability.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *cache
            .entry(program.to_string())
            .or_insert_with(|| self.runner.is_available(program))
    }

    /// Take one run from the budget, or fail without side effects.
    fn reserve_run(&self) -> Result<(), CommandError> {
        self.runs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.max_runs).then_some(used + 1)
            })
            .map(|_| ())
            .map_err(|_| CommandError::BudgetExhausted { max: self.max_runs })
    }
}

fn truncate_output(text: &mut String) {
    if text.len() > MAX_OUTPUT_CHARS {
        let mut end = MAX_OUTPUT_CHARS;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push_str("\n... (output truncated)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRunner;

    fn executor(runner: Arc<ScriptedRunner>, max_runs: usize) -> CommandExecutor {
        CommandExecutor::new(
            runner,
            "/work",
            ["cargo", "git", "ls", "npm"].iter().map(|s| s.to_string()),
            max_runs,
        )
    }

    #[tokio::test]
    async fn test_runs_allowed_command() {
        let runner = Arc::new(ScriptedRunner::passing());
        let exec = executor(runner.clone(), 5);
        let result = exec.execute("cargo test --workspace", ExecutorRole::Verifier).await.unwrap();
        assert!(result.ok());
        assert_eq!(exec.runs_used(), 1);
        assert_eq!(runner.calls(), vec!["cargo test --workspace".to_string()]);
    }

    #[tokio::test]
    async fn test_rejects_unlisted_program() {
        let runner = Arc::new(ScriptedRunner::passing());
        let exec = executor(runner.clone(), 5);
        let err = exec.execute("curl http://example.com", ExecutorRole::Verifier).await.unwrap_err();
        assert!(matches!(err, CommandError::NotAllowed(_)));
        assert!(err.is_policy_denial());
        assert_eq!(exec.runs_used(), 0);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_denied_subcommand() {
        let exec = executor(Arc::new(ScriptedRunner::passing()), 5);
        let err = exec.execute("git push origin main", ExecutorRole::Verifier).await.unwrap_err();
        assert!(matches!(err, CommandError::SubcommandDenied { .. }));
    }

    #[tokio::test]
    async fn test_inspector_is_read_only() {
        let exec = executor(Arc::new(ScriptedRunner::passing()), 5);
        assert!(exec.execute("git status", ExecutorRole::Inspector).await.is_ok());
        let err = exec.execute("cargo build", ExecutorRole::Inspector).await.unwrap_err();
        assert!(matches!(err, CommandError::RoleDenied { .. }));
    }

    #[tokio::test]
    async fn test_budget_rejects_before_side_effects() {
        let runner = Arc::new(ScriptedRunner::passing());
        let exec = executor(runner.clone(), 2);
        exec.execute("cargo check", ExecutorRole::Verifier).await.unwrap();
        exec.execute("cargo check", ExecutorRole::Verifier).await.unwrap();
        let err = exec.execute("cargo check", ExecutorRole::Verifier).await.unwrap_err();
        assert_eq!(err, CommandError::BudgetExhausted { max: 2 });
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(exec.runs_used(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_program() {
        let runner = Arc::new(ScriptedRunner::passing().without_program("npm"));
        let exec = executor(runner, 5);
        let err = exec.execute("npm test", ExecutorRole::Verifier).await.unwrap_err();
        assert_eq!(err, CommandError::Unavailable("npm".into()));
        assert_eq!(exec.runs_used(), 0);
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let runner = Arc::new(ScriptedRunner::passing().timing_out("cargo test"));
        let exec = executor(runner, 5);
        let err = exec.execute("cargo test", ExecutorRole::Verifier).await.unwrap_err();
        assert!(matches!(err, CommandError::Timeout { secs: 120, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_run() {
        let token = CancellationToken::new();
        token.cancel();
        let runner = Arc::new(ScriptedRunner::passing());
        let exec = executor(runner.clone(), 5).with_cancellation(token);
        let err = exec.execute("cargo test", ExecutorRole::Verifier).await.unwrap_err();
        assert_eq!(err, CommandError::Cancelled);
        assert!(runner.calls().is_empty());
    }
}
