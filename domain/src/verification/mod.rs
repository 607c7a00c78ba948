//! Verification domain: modes, check results and command heuristics.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

/// When in the run a verification pass happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// Informational pass before any unit runs
    Preflight,
    /// Curated pass after a unit applied changes
    Unit,
    /// Full pass after all units resolved
    Final,
}

impl VerificationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationMode::Preflight => "preflight",
            VerificationMode::Unit => "unit",
            VerificationMode::Final => "final",
        }
    }

    /// Extra attempts granted to a failing test-like command.
    pub fn flaky_retries(&self) -> usize {
        match self {
            VerificationMode::Preflight => 0,
            VerificationMode::Unit => 1,
            VerificationMode::Final => 2,
        }
    }
}

impl std::fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationCheckResult {
    /// 1-based attempt that produced this result
    pub attempt: usize,
    pub command: String,
    pub ok: bool,
    pub output: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub flaky_recovered: bool,
}

/// Result of one verification pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub mode: VerificationMode,
    pub passed: bool,
    pub checks: Vec<VerificationCheckResult>,
    /// Commands that failed at least once and then passed in this pass
    pub quarantined: Vec<String>,
}

impl VerificationOutcome {
    pub fn skipped(mode: VerificationMode) -> Self {
        Self {
            mode,
            passed: true,
            checks: Vec::new(),
            quarantined: Vec::new(),
        }
    }

    pub fn failed_commands(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| !c.ok)
            .map(|c| c.command.as_str())
            .collect()
    }
}

static TEST_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|[\s/])(test|tests|pytest|jest|vitest|mocha|ava|tap|rspec|phpunit|nextest|ctest)(\s|$)|\b(cargo|go|npm|pnpm|yarn|bun|deno|dotnet|mix|make)\s+(run\s+)?test\b",
    )
    .expect("static pattern")
});

static LINT_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(lint|eslint|ruff|flake8|mypy|pyright|typecheck|type-check|check|clippy|tsc|fmt|format|vet)\b")
        .expect("static pattern")
});

/// Whether a failing command is worth retrying as a possibly flaky test.
pub fn is_test_like_command(command: &str) -> bool {
    TEST_LIKE.is_match(command)
}

/// Maximum commands run after each unit.
pub const MAX_UNIT_COMMANDS: usize = 2;

/// Pick the quick lint/typecheck subset of `commands` for per-unit checks.
pub fn curate_unit_commands(commands: &[String]) -> Vec<String> {
    commands
        .iter()
        .filter(|c| LINT_LIKE.is_match(c))
        .take(MAX_UNIT_COMMANDS)
        .cloned()
        .collect()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandSyntaxError {
    #[error("empty command")]
    Empty,

    #[error("unterminated quote in command")]
    UnterminatedQuote,

    #[error("shell operator '{0}' is not supported; pass a single program invocation")]
    ShellOperator(String),
}

const SHELL_OPERATORS: &[&str] = &["|", "||", "&", "&&", ";", ">", ">>", "<", "$(", "`"];

/// Split a command line into program and arguments.
///
/// Single and double quotes group words; no shell expansion happens, so
/// pipes, redirects and command chaining are rejected.
pub fn split_command(command: &str) -> Result<(String, Vec<String>), CommandSyntaxError> {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in command.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_word = true;
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                c => {
                    if c == '`' || (c == '(' && current.ends_with('$')) {
                        return Err(CommandSyntaxError::ShellOperator(
                            if c == '`' { "`" } else { "$(" }.to_string(),
                        ));
                    }
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }
    if quote.is_some() {
        return Err(CommandSyntaxError::UnterminatedQuote);
    }
    if in_word {
        words.push(current);
    }

    if let Some(op) = words.iter().find(|w| SHELL_OPERATORS.contains(&w.as_str())) {
        return Err(CommandSyntaxError::ShellOperator(op.clone()));
    }

    let mut iter = words.into_iter();
    let program = iter.next().ok_or(CommandSyntaxError::Empty)?;
    Ok((program, iter.collect()))
}
