//! Console output formatter for run reports

use crate::output::formatter::OutputFormatter;
use cohort_application::RunReport;
use cohort_domain::{RunStatus, UnitStatus, VerificationOutcome};
use colored::Colorize;

/// Formats run reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete report
    pub fn format(report: &RunReport) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Cohort Run Report"));
        output.push('\n');
        output.push_str(&format!("{} {}\n", "Goal:".cyan().bold(), report.goal));
        output.push_str(&format!(
            "{} {}{}\n",
            "Status:".cyan().bold(),
            Self::status(report.status),
            if report.dry_run { " (dry run)" } else { "" }
        ));
        if let Some(note) = &report.status_note {
            output.push_str(&format!("{} {}\n", "Note:".cyan().bold(), note));
        }
        output.push_str(&format!("{} {}\n", "Run:".dimmed(), report.run_id));

        if !report.open_questions.is_empty() {
            output.push_str(&Self::section_header("Clarification Needed"));
            for question in &report.open_questions {
                output.push_str(&format!("  * [{}] {}\n", question.id, question.question));
            }
            output.push_str(&format!(
                "\nRe-run with {} for each question.\n",
                "--answer <id>=<value>".bold()
            ));
            output.push_str(&Self::footer());
            return output;
        }

        let units = &report.multi_agent_report.work_units;
        if !units.is_empty() {
            output.push_str(&Self::section_header("Work Units"));
            if !report.multi_agent_report.strategy.is_empty() {
                output.push_str(&format!(
                    "{} {}\n\n",
                    "Strategy:".dimmed(),
                    report.multi_agent_report.strategy
                ));
            }
            for state in units {
                let mark = match state.status {
                    UnitStatus::Completed => "v".green(),
                    UnitStatus::Failed => "x".red(),
                    UnitStatus::Blocked => "-".yellow(),
                    UnitStatus::Pending | UnitStatus::Running => "?".dimmed(),
                };
                output.push_str(&format!(
                    "  {} {} {} ({}, {} attempt(s))\n",
                    mark,
                    state.id().bold(),
                    state.unit.title,
                    state.status,
                    state.attempts
                ));
                if let Some(summary) = &state.summary {
                    output.push_str(&format!("      {}\n", summary));
                }
                if let Some(error) = &state.last_error
                    && state.status != UnitStatus::Completed
                {
                    output.push_str(&format!("      {} {}\n", "error:".red(), error));
                }
                for warning in &state.warnings {
                    output.push_str(&format!("      {} {}\n", "warning:".yellow(), warning));
                }
            }
        }

        if !report.change_journal.is_empty() {
            output.push_str(&Self::section_header("Changes"));
            for entry in &report.change_journal {
                output.push_str(&format!(
                    "  {:<6} {}{}\n",
                    entry.op.as_str(),
                    entry.path,
                    if entry.dry_run { " [dry run]" } else { "" }
                ));
            }
        }

        for verification in [&report.preflight, &report.final_verification]
            .into_iter()
            .flatten()
        {
            output.push_str(&Self::verification(verification));
        }

        if let Some(rollback) = &report.rollback {
            output.push_str(&Self::section_header("Rollback"));
            output.push_str(&format!(
                "  restored {}, deleted {}, failures {}\n",
                rollback.restored.len(),
                rollback.deleted.len(),
                rollback.failures.len()
            ));
            for failure in &rollback.failures {
                output.push_str(&format!("  {} {}: {}\n", "x".red(), failure.path, failure.error));
            }
        }

        let b = &report.budgets;
        output.push_str(&Self::section_header("Budgets"));
        output.push_str(&format!(
            "  iterations {}/{}  writes {}/{}  commands {}/{}  replans {}/{}\n",
            b.iterations_used,
            b.max_iterations,
            b.file_writes_used,
            b.max_file_writes,
            b.command_runs_used,
            b.max_command_runs,
            b.replans_used,
            b.max_replans
        ));
        let totals = &report.multi_agent_report.observability.totals;
        output.push_str(&format!(
            "  model calls {} (cache hits {}, retries {}, escalations {})  est. cost ${:.4}\n",
            totals.calls, totals.cache_hits, totals.retries, totals.escalations, totals.cost_estimate
        ));
        let heatmap = &report.multi_agent_report.failure_heatmap;
        if !heatmap.is_empty() {
            let cells: Vec<String> = heatmap.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            output.push_str(&format!("  failures {}\n", cells.join(" ")));
        }

        output.push_str(&Self::section_header("Summary"));
        output.push_str(&format!("{}\n", report.synthesis.summary));
        if !report.synthesis.highlights.is_empty() {
            output.push_str(&format!("\n{}\n", "Highlights:".green().bold()));
            for point in &report.synthesis.highlights {
                output.push_str(&format!("  * {}\n", point));
            }
        }
        if !report.synthesis.follow_ups.is_empty() {
            output.push_str(&format!("\n{}\n", "Follow-ups:".yellow().bold()));
            for point in &report.synthesis.follow_ups {
                output.push_str(&format!("  * {}\n", point));
            }
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(report: &RunReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn status(status: RunStatus) -> colored::ColoredString {
        match status {
            RunStatus::Completed => status.as_str().green().bold(),
            RunStatus::NeedsClarification | RunStatus::Cancelled => status.as_str().yellow().bold(),
            _ => status.as_str().red().bold(),
        }
    }

    fn verification(outcome: &VerificationOutcome) -> String {
        let mut output = Self::section_header(&format!("Verification ({})", outcome.mode));
        for check in &outcome.checks {
            let mark = if check.ok { "v".green() } else { "x".red() };
            output.push_str(&format!(
                "  {} {} (attempt {}, {} ms)\n",
                mark, check.command, check.attempt, check.duration_ms
            ));
        }
        if !outcome.quarantined.is_empty() {
            output.push_str(&format!(
                "  {} {}\n",
                "quarantined:".yellow(),
                outcome.quarantined.join(", ")
            ));
        }
        output
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, report: &RunReport) -> String {
        Self::format(report)
    }

    fn format_json(&self, report: &RunReport) -> String {
        Self::format_json(report)
    }
}
