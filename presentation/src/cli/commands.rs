//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Output format for the run report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Full report as JSON
    Json,
}

/// CLI arguments for cohort
#[derive(Parser, Debug)]
#[command(name = "cohort")]
#[command(author, version, about = "Multi-agent work-unit orchestrator for coding goals")]
#[command(long_about = r#"
Cohort decomposes a coding goal into dependent work units and runs each one
through a Scout -> Planner -> Coder -> Critic pipeline, applying changes with
snapshots so a failed run can be rolled back.

Configuration files are loaded from (in priority order):
1. COHORT_* environment variables
2. --config <path>     Explicit config file
3. ./cohort.toml       Project-level config
4. ~/.config/cohort/config.toml   Global config

Example:
  cohort "Add a /health endpoint returning 200"
  cohort --verify "cargo test" --strict "Fix the failing parser tests"
  cohort --dry-run --ask db="Which database?" --answer db=postgres "Add persistence"
"#)]
pub struct Cli {
    /// The goal to accomplish (not required with --show-config)
    pub goal: Option<String>,

    /// Workspace root (defaults to the current directory)
    #[arg(short, long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Plan and review changes without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Treat verification failures as run failures
    #[arg(long)]
    pub strict: bool,

    /// Keep changes even when the run fails
    #[arg(long)]
    pub no_rollback: bool,

    /// Verification command (can be specified multiple times)
    #[arg(long = "verify", value_name = "CMD")]
    pub verify: Vec<String>,

    /// Maximum work units executed concurrently
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Maximum unit attempts across the run
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Pin every role to one model
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Require an answer before any change is made (id=question, repeatable)
    #[arg(long = "ask", value_name = "ID=QUESTION", value_parser = parse_answer)]
    pub questions: Vec<(String, String)>,

    /// Answer a clarification question (id=value, repeatable)
    #[arg(long = "answer", value_name = "ID=VALUE", value_parser = parse_answer)]
    pub answers: Vec<(String, String)>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Write diagnostic logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn answer_map(&self) -> BTreeMap<String, String> {
        self.answers.iter().cloned().collect()
    }
}

fn parse_answer(raw: &str) -> Result<(String, String), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{}'", raw))?;
    let id = id.trim();
    if id.is_empty() {
        return Err("answer id cannot be empty".to_string());
    }
    Ok((id.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_invocation() {
        let cli = Cli::try_parse_from([
            "cohort",
            "--dry-run",
            "--strict",
            "--verify",
            "cargo test",
            "--verify",
            "cargo clippy",
            "--answer",
            "db = postgres",
            "--max-parallel",
            "2",
            "-o",
            "json",
            "-vv",
            "Add persistence",
        ])
        .unwrap();

        assert_eq!(cli.goal.as_deref(), Some("Add persistence"));
        assert!(cli.dry_run);
        assert!(cli.strict);
        assert_eq!(cli.verify, vec!["cargo test", "cargo clippy"]);
        assert_eq!(cli.answer_map().get("db").map(String::as_str), Some("postgres"));
        assert_eq!(cli.max_parallel, Some(2));
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_questions_and_answers_pair_up() {
        let cli = Cli::try_parse_from([
            "cohort",
            "--ask",
            "db=Which database?",
            "--answer",
            "db=sqlite",
            "goal",
        ])
        .unwrap();
        assert_eq!(
            cli.questions,
            vec![("db".to_string(), "Which database?".to_string())]
        );
        assert_eq!(cli.answer_map().len(), 1);
    }

    #[test]
    fn test_answer_without_equals_is_rejected() {
        assert!(Cli::try_parse_from(["cohort", "--answer", "postgres", "goal"]).is_err());
        assert!(parse_answer("=x").is_err());
    }

    #[test]
    fn test_goal_is_optional() {
        let cli = Cli::try_parse_from(["cohort", "--show-config"]).unwrap();
        assert!(cli.goal.is_none());
        assert!(cli.show_config);
    }
}
