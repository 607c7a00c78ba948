//! CLI entrypoint for cohort
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use cohort_application::{
    FileStore, NoProgress, RunInput, RunOrchestrator, RunProgressNotifier, RunServices,
};
use cohort_domain::{Clarification, ClarificationQuestion, Model};
use cohort_infrastructure::{
    ConfigLoader, FileConfig, FileOutputFormat, HttpChatGateway, JsonCacheStore, JsonMemoryStore,
    JsonlRunLogger, LocalFileStore, ManifestIntelligence, MarkdownSkillsLoader, Severity,
    TokioProcessRunner,
};
use cohort_presentation::{Cli, ConsoleFormatter, OutputFormat, ProgressReporter, SimpleProgress};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    let workspace_dir = match &cli.workspace {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };

    if cli.show_config {
        for line in ConfigLoader::describe_sources(&workspace_dir, cli.config.as_deref()) {
            println!("{}", line);
        }
        return Ok(());
    }

    let goal = match &cli.goal {
        Some(goal) if !goal.trim().is_empty() => goal.clone(),
        _ => bail!("A goal is required. Run `cohort --help` for usage."),
    };

    // === Configuration ===
    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref(), &workspace_dir)
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?
    };
    check_config(&file_config)?;

    let mut config = file_config
        .to_run_config()
        .with_dry_run(cli.dry_run)
        .with_strict_verification(cli.strict || file_config.verification.strict);
    if cli.no_rollback {
        config = config.with_rollback(false);
    }
    if !cli.verify.is_empty() {
        config = config.with_verification_commands(cli.verify.clone());
    }
    if let Some(max) = cli.max_parallel {
        config = config.with_max_parallel(max);
    }
    if let Some(max) = cli.max_iterations {
        config = config.with_max_iterations(max);
    }

    let mut routing = file_config.to_model_routing();
    if let Some(model) = &cli.model {
        let model = model.parse::<Model>().unwrap_or_else(|e| match e {});
        routing = routing.with_override(Some(model));
    }

    // === Dependency Injection ===
    let files = LocalFileStore::open(&workspace_dir).with_context(|| {
        format!("Workspace '{}' is not accessible", workspace_dir.display())
    })?;
    let root = files.root().to_path_buf();
    info!("Starting cohort in {}", root.display());

    let gateway = HttpChatGateway::new(file_config.provider.to_settings())
        .context("Failed to create model gateway")?;

    let services = RunServices {
        gateway: Arc::new(gateway),
        files: Arc::new(files),
        processes: Arc::new(TokioProcessRunner::new()),
        memory: Arc::new(JsonMemoryStore::for_workspace(&root)),
        intelligence: Arc::new(ManifestIntelligence::new()),
        skills: Arc::new(MarkdownSkillsLoader::for_workspace(&root)),
        cache: Arc::new(JsonCacheStore::for_workspace(&root)),
    };

    let progress: Arc<dyn RunProgressNotifier> = if cli.quiet {
        Arc::new(NoProgress)
    } else if cli.verbose > 0 {
        // Spinner redraws would interleave with log lines
        Arc::new(SimpleProgress)
    } else {
        Arc::new(ProgressReporter::new())
    };

    let cancellation = CancellationToken::new();
    let ctrl_c_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            ctrl_c_token.cancel();
        }
    });

    let mut orchestrator = RunOrchestrator::new(services, config, routing)
        .with_progress(progress)
        .with_cancellation(cancellation);
    if let Some(logger) = JsonlRunLogger::new(run_log_path(&root)) {
        orchestrator = orchestrator.with_logger(Arc::new(logger));
    }

    let input = RunInput::new(goal).with_clarification(clarification(&cli));
    let report = orchestrator.run(input).await?;

    // Output results
    let format = cli.output.unwrap_or(match file_config.output.format {
        FileOutputFormat::Text => OutputFormat::Text,
        FileOutputFormat::Json => OutputFormat::Json,
    });
    if !file_config.output.color {
        colored::control::set_override(false);
    }
    let output = match format {
        OutputFormat::Text => ConsoleFormatter::format(&report),
        OutputFormat::Json => ConsoleFormatter::format_json(&report),
    };
    println!("{}", output);

    if !report.is_success() {
        // exit() skips destructors; flush the file layer first
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}

/// Install the stderr subscriber and, when requested, a non-blocking file layer.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn check_config(config: &FileConfig) -> Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            Severity::Warning => eprintln!("config warning: {}", issue.message),
            Severity::Error => eprintln!("config error: {}", issue.message),
        }
    }
    if issues.iter().any(|issue| issue.is_error()) {
        bail!("Invalid configuration");
    }
    Ok(())
}

fn clarification(cli: &Cli) -> Clarification {
    Clarification {
        required: !cli.questions.is_empty(),
        questions: cli
            .questions
            .iter()
            .map(|(id, question)| ClarificationQuestion::required(id, question))
            .collect(),
        answers: cli.answer_map(),
    }
}

fn run_log_path(root: &Path) -> PathBuf {
    root.join(".cohort")
        .join("logs")
        .join(format!("run-{}.jsonl", chrono::Local::now().format("%Y%m%d-%H%M%S")))
}
