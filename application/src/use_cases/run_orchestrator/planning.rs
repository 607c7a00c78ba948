//! Context gathering and goal decomposition.

use super::RunOrchestrator;
use super::types::RunError;
use crate::ports::memory_store::MemoryQuery;
use crate::ports::skills_loader::render_skills;
use crate::use_cases::command_executor::{CommandExecutor, ExecutorRole};
use crate::use_cases::subagent::{SubagentCall, SubagentCaller, SubagentError};
use crate::use_cases::unit_pipeline::RunContext;
use cohort_domain::work_unit::plan_parser::{build_work_units, fallback_unit};
use cohort_domain::{
    Clarification, RolePromptTemplate, SubagentRole, SupervisorPlanOutput, UnitPromptContext,
    WorkUnit,
};
use tracing::{debug, info, warn};

/// Read-only snapshot of uncommitted changes, run as the inspector role.
const WORKSPACE_STATUS_COMMAND: &str = "git status --porcelain";

/// Status lines kept in the project context.
const MAX_STATUS_LINES: usize = 20;

/// Outcome of the planning phase.
pub(super) struct PlannedRun {
    pub units: Vec<WorkUnit>,
    pub strategy: String,
    /// The supervisor plan was unusable and the whole goal became one unit
    pub fallback: bool,
}

impl RunOrchestrator {
    /// Collect everything the prompts share: workspace tree, memory,
    /// project insights, uncommitted changes, skills and clarification answers.
    ///
    /// Returns the context and the previous run's continuation hint.
    pub(super) async fn gather_context(
        &self,
        goal: &str,
        clarification: &Clarification,
        executor: &CommandExecutor,
    ) -> (RunContext, String) {
        let files = &self.services.files;
        let tree_preview = files.tree_preview(self.config.pipeline.tree_preview_entries);

        let retrieval = match self.services.memory.retrieve(&MemoryQuery::new(goal)).await {
            Ok(retrieval) => retrieval,
            Err(e) => {
                warn!(error = %e, "Memory retrieval failed; continuing without memory");
                Default::default()
            }
        };
        if retrieval.diagnostics.conflict_count > 0 {
            info!(
                conflicts = retrieval.diagnostics.conflict_count,
                "Memory reports conflicting guidance"
            );
        }
        let continuation_hint = retrieval
            .latest_continuation
            .as_ref()
            .map(|packet| packet.render_hint())
            .unwrap_or_default();

        let insights = self.services.intelligence.analyze(files.root()).await;
        let mut project_context = insights.render();
        if let Some(status) = self.workspace_status(executor).await {
            if !project_context.is_empty() {
                project_context.push('\n');
            }
            project_context.push_str("Uncommitted changes (git status):\n");
            project_context.push_str(&status);
        }
        let skills = self.services.skills.load(&self.config.skills);
        debug!(skills = skills.len(), "Loaded skills");

        let mut memory_context = retrieval.context_block;
        if !retrieval.diagnostics.guidance.is_empty() {
            memory_context.push_str("\nGuidance:\n");
            memory_context.push_str(&retrieval.diagnostics.guidance.join("\n"));
        }

        let context = RunContext {
            goal: goal.to_string(),
            tree_preview,
            memory_context,
            project_context,
            skills_context: render_skills(&skills),
            clarifications: clarification.render_answers(),
            verification_required: retrieval.diagnostics.requires_verification_before_mutation,
            dry_run: self.config.dry_run,
        };
        (context, continuation_hint)
    }

    /// Porcelain status of a git workspace, or `None` when it is clean,
    /// not a repository, or the inspection is refused.
    async fn workspace_status(&self, executor: &CommandExecutor) -> Option<String> {
        if !self.services.files.exists(".git/HEAD") {
            return None;
        }
        let result = match executor
            .execute(WORKSPACE_STATUS_COMMAND, ExecutorRole::Inspector)
            .await
        {
            Ok(result) if result.ok() => result,
            Ok(result) => {
                debug!(exit_code = ?result.output.exit_code, "Workspace status unavailable");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "Skipping workspace status");
                return None;
            }
        };

        let lines: Vec<&str> = result
            .output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();
        if lines.is_empty() {
            return None;
        }
        let mut status = lines
            .iter()
            .take(MAX_STATUS_LINES)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        if lines.len() > MAX_STATUS_LINES {
            status.push_str(&format!("\n... ({} more)", lines.len() - MAX_STATUS_LINES));
        }
        Some(status)
    }

    /// Ask the supervisor for work units, falling back to a single unit.
    pub(super) async fn plan_units(
        &self,
        caller: &SubagentCaller,
        context: &RunContext,
        continuation_hint: &str,
    ) -> Result<PlannedRun, RunError> {
        let ctx = UnitPromptContext {
            goal: &context.goal,
            unit: None,
            tree_preview: &context.tree_preview,
            memory_context: &context.memory_context,
            project_context: &context.project_context,
            skills_context: &context.skills_context,
            artifact_context: "",
            clarifications: &context.clarifications,
        };
        let system = RolePromptTemplate::system(SubagentRole::Supervisor);
        let prompt = RolePromptTemplate::supervisor_plan(&ctx, continuation_hint);

        let plan = match caller
            .call::<SupervisorPlanOutput>(SubagentCall::new(
                SubagentRole::Supervisor,
                &system,
                &prompt,
            ))
            .await
        {
            Ok(response) => response.parsed,
            Err(SubagentError::Cancelled) => return Err(RunError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Supervisor planning failed; using a single fallback unit");
                return Ok(fallback_plan(&context.goal));
            }
        };

        match build_work_units(&plan) {
            Ok(units) => {
                info!(units = units.len(), "Planned work units");
                let strategy = if plan.strategy.trim().is_empty() {
                    plan.summary
                } else {
                    plan.strategy
                };
                Ok(PlannedRun {
                    units,
                    strategy,
                    fallback: false,
                })
            }
            Err(e) => {
                warn!(error = %e, "Supervisor plan rejected; using a single fallback unit");
                Ok(fallback_plan(&context.goal))
            }
        }
    }
}

fn fallback_plan(goal: &str) -> PlannedRun {
    PlannedRun {
        units: vec![fallback_unit(goal)],
        strategy: "Single unit covering the whole goal".to_string(),
        fallback: true,
    }
}
