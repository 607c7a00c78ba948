//! Unit Pipeline
//!
//! Runs one attempt of a work unit: Scout and Planner concurrently, then
//! Coder (with confidence escalation), Critic (with near-miss re-review),
//! the gate decision, the serialized apply and optional unit verification.

use crate::config::{PipelineConfig, VerificationConfig};
use crate::ports::memory_store::{MemoryQuery, MemoryStore};
use crate::ports::progress::{ProgressEvent, RunProgressNotifier};
use crate::use_cases::artifacts::ArtifactStore;
use crate::use_cases::change_applier::{ChangeError, WriteQueue};
use crate::use_cases::command_executor::CommandError;
use crate::use_cases::scheduler::{UnitAttempt, UnitExecutor};
use crate::use_cases::subagent::{SubagentCall, SubagentCaller, SubagentError, SubagentResponse};
use crate::use_cases::verification::VerificationRunner;
use async_trait::async_trait;
use cohort_domain::review::gate::{
    EvidenceInput, evidence_gate, prefer_escalated, should_escalate_coder, should_rereview,
};
use cohort_domain::verification::curate_unit_commands;
use cohort_domain::{
    ArtifactRecord, CoderOutput, CriticOutput, FileSnippet, GateDecision, GateInput,
    PlannerOutput, RolePromptTemplate, ScoutOutput, SubagentOutput, SubagentRole,
    UnitCompletion, UnitFailureCategory, UnitPromptContext, VerificationMode, WorkUnit, decide,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone)]
pub enum UnitError {
    #[error(transparent)]
    Subagent(#[from] SubagentError),

    #[error("Scout and planner both failed: {0}")]
    Preparation(String),

    #[error(transparent)]
    Change(#[from] ChangeError),

    #[error("Critic gate rejected changes: {0}")]
    Gate(String),

    #[error("{0}")]
    Evidence(String),

    #[error("Coder produced no changes")]
    NoChanges,

    #[error("Unit verification failed: {0}")]
    Verification(String),

    #[error("Iteration budget exhausted")]
    BudgetExhausted,

    #[error("Operation cancelled")]
    Cancelled,
}

impl UnitError {
    /// Whether another attempt of the same unit could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UnitError::Cancelled | UnitError::BudgetExhausted => false,
            UnitError::Change(e) => !e.is_policy_denial(),
            UnitError::Subagent(SubagentError::Cancelled) => false,
            _ => true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            UnitError::Cancelled | UnitError::Subagent(SubagentError::Cancelled)
        )
    }

    pub fn category(&self) -> UnitFailureCategory {
        match self {
            UnitError::Subagent(SubagentError::ParseExhausted { .. }) => {
                UnitFailureCategory::ParseError
            }
            UnitError::Change(e) if e.is_policy_denial() => UnitFailureCategory::SafetyPolicy,
            UnitError::Gate(_) | UnitError::Evidence(_) | UnitError::NoChanges => {
                UnitFailureCategory::CriticGate
            }
            UnitError::Verification(_) => UnitFailureCategory::Verification,
            UnitError::BudgetExhausted => UnitFailureCategory::SafetyPolicy,
            other => UnitFailureCategory::classify(&other.to_string()),
        }
    }
}

impl From<CommandError> for UnitError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::Cancelled => UnitError::Cancelled,
            other => UnitError::Verification(other.to_string()),
        }
    }
}

/// Run-wide context shared by every unit prompt.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub goal: String,
    pub tree_preview: String,
    pub memory_context: String,
    pub project_context: String,
    pub skills_context: String,
    pub clarifications: String,
    /// Run-level memory asks for verification before any mutation
    pub verification_required: bool,
    pub dry_run: bool,
}

/// Executes work units through Scout → Planner → Coder → Critic → apply.
pub struct UnitPipeline {
    context: Arc<RunContext>,
    caller: Arc<SubagentCaller>,
    writes: Arc<WriteQueue>,
    verifier: Arc<VerificationRunner>,
    artifacts: Arc<ArtifactStore>,
    memory: Arc<dyn MemoryStore>,
    progress: Arc<dyn RunProgressNotifier>,
    config: PipelineConfig,
    verification: VerificationConfig,
}

impl UnitPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: Arc<RunContext>,
        caller: Arc<SubagentCaller>,
        writes: Arc<WriteQueue>,
        verifier: Arc<VerificationRunner>,
        artifacts: Arc<ArtifactStore>,
        memory: Arc<dyn MemoryStore>,
        progress: Arc<dyn RunProgressNotifier>,
        config: PipelineConfig,
        verification: VerificationConfig,
    ) -> Self {
        Self {
            context,
            caller,
            writes,
            verifier,
            artifacts,
            memory,
            progress,
            config,
            verification,
        }
    }

    async fn run_attempt(
        &self,
        unit: &WorkUnit,
        attempt: &UnitAttempt,
    ) -> Result<UnitCompletion, UnitError> {
        let unit_memory = match self
            .memory
            .retrieve(&MemoryQuery::new(&unit.objective).for_unit(&unit.id))
            .await
        {
            Ok(retrieval) => retrieval,
            Err(e) => {
                warn!(unit = %unit.id, error = %e, "Unit memory retrieval failed");
                Default::default()
            }
        };
        let memory_context = [
            self.context.memory_context.as_str(),
            unit_memory.context_block.as_str(),
        ]
        .iter()
        .filter(|block| !block.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n");

        // Scout and planner see the artifacts of earlier attempts only.
        let prior_artifacts = self.artifacts.render_context(&unit.id);
        let ctx = UnitPromptContext {
            goal: &self.context.goal,
            unit: Some(unit),
            tree_preview: &self.context.tree_preview,
            memory_context: &memory_context,
            project_context: &self.context.project_context,
            skills_context: &self.context.skills_context,
            artifact_context: &prior_artifacts,
            clarifications: &self.context.clarifications,
        };

        // ==================== Scout ∥ Planner ====================
        let scout_system = RolePromptTemplate::system(SubagentRole::Scout);
        let scout_prompt = RolePromptTemplate::scout(&ctx);
        let planner_system = RolePromptTemplate::system(SubagentRole::Planner);
        let planner_prompt = RolePromptTemplate::planner(&ctx);

        let (scout, planner) = tokio::join!(
            self.call_role::<ScoutOutput>(
                unit,
                SubagentCall::new(SubagentRole::Scout, &scout_system, &scout_prompt),
                "scan workspace",
                |o| o.summary.clone(),
            ),
            self.call_role::<PlannerOutput>(
                unit,
                SubagentCall::new(SubagentRole::Planner, &planner_system, &planner_prompt),
                "plan unit",
                |o| o.summary.clone(),
            ),
        );
        let (scout, planner) = match (scout, planner) {
            (Ok(scout), Ok(planner)) => (scout.parsed, planner.parsed),
            (Err(SubagentError::Cancelled), _) | (_, Err(SubagentError::Cancelled)) => {
                return Err(UnitError::Cancelled);
            }
            (Err(a), Err(b)) => {
                return Err(UnitError::Preparation(format!("scout: {a}; planner: {b}")));
            }
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e.into()),
        };

        // ==================== Evidence ====================
        let snippets = self.collect_snippets(unit, &scout, &planner).await;
        debug!(unit = %unit.id, snippets = snippets.len(), "Collected file snippets");

        evidence_gate(EvidenceInput {
            verification_required: self.context.verification_required
                || unit_memory.diagnostics.requires_verification_before_mutation,
            file_snippets: snippets.len(),
            scout_relevant_files: scout.relevant_files.len(),
            planner_test_focus: planner.test_focus.len(),
        })
        .map_err(UnitError::Evidence)?;

        let artifact_context = self.artifacts.render_context(&unit.id);
        let ctx = UnitPromptContext {
            artifact_context: &artifact_context,
            ..ctx
        };

        // ==================== Coder ====================
        let coder_system = RolePromptTemplate::system(SubagentRole::Coder);
        let coder_prompt =
            RolePromptTemplate::coder(&ctx, &snippets, attempt.previous_error.as_deref());
        let mut coder = self
            .call_role::<CoderOutput>(
                unit,
                SubagentCall::new(SubagentRole::Coder, &coder_system, &coder_prompt),
                "propose changes",
                |o| o.summary.clone(),
            )
            .await?;

        if should_escalate_coder(coder.parsed.confidence) {
            info!(unit = %unit.id, confidence = coder.parsed.confidence, "Escalating coder");
            let prompt = RolePromptTemplate::coder_escalation(&coder_prompt, &coder.raw);
            match self
                .call_role::<CoderOutput>(
                    unit,
                    SubagentCall::new(SubagentRole::Coder, &coder_system, &prompt).escalated(),
                    "escalate changes",
                    |o| o.summary.clone(),
                )
                .await
            {
                Ok(escalated)
                    if prefer_escalated(coder.parsed.confidence, escalated.parsed.confidence) =>
                {
                    coder = escalated;
                }
                Ok(escalated) => debug!(
                    unit = %unit.id,
                    escalated = escalated.parsed.confidence,
                    "Keeping original coder output"
                ),
                Err(SubagentError::Cancelled) => return Err(UnitError::Cancelled),
                Err(e) => warn!(unit = %unit.id, error = %e, "Coder escalation failed"),
            }
        }

        if coder.parsed.changes.is_empty() {
            return Err(UnitError::NoChanges);
        }

        // ==================== Critic ====================
        let artifact_context = self.artifacts.render_context(&unit.id);
        let ctx = UnitPromptContext {
            artifact_context: &artifact_context,
            ..ctx
        };
        let proposal = serde_json::to_string_pretty(&coder.parsed)
            .unwrap_or_else(|_| coder.raw.clone());
        let critic_system = RolePromptTemplate::system(SubagentRole::Critic);
        let critic_prompt = RolePromptTemplate::critic(&ctx, &proposal, &snippets);
        let mut critic = self
            .call_role::<CriticOutput>(
                unit,
                SubagentCall::new(SubagentRole::Critic, &critic_system, &critic_prompt),
                "review changes",
                |o| o.summary.clone(),
            )
            .await?;

        let threshold = self.config.critic_threshold;
        if should_rereview(
            critic.parsed.score,
            critic.parsed.blocking_issues.len(),
            threshold,
        ) {
            let prompt = RolePromptTemplate::critic_rereview(&critic_prompt, &critic.raw);
            match self
                .call_role::<CriticOutput>(
                    unit,
                    SubagentCall::new(SubagentRole::Critic, &critic_system, &prompt).escalated(),
                    "re-review changes",
                    |o| o.summary.clone(),
                )
                .await
            {
                Ok(second) if second.parsed.score >= critic.parsed.score => critic = second,
                Ok(_) => debug!(unit = %unit.id, "Keeping first critic review"),
                Err(SubagentError::Cancelled) => return Err(UnitError::Cancelled),
                Err(e) => warn!(unit = %unit.id, error = %e, "Critic re-review failed"),
            }
        }

        // ==================== Gate ====================
        let decision = decide(GateInput {
            critic_score: critic.parsed.score,
            blocking_issues: critic.parsed.blocking_issues.len(),
            coder_confidence: coder.parsed.confidence,
            threshold,
            final_attempt: attempt.is_final(),
        });
        let mut warnings = Vec::new();
        match decision {
            GateDecision::Accept => {}
            GateDecision::AcceptWithWarning(warning) => {
                warn!(unit = %unit.id, %warning, "Last-resort acceptance");
                warnings.push(warning);
            }
            GateDecision::Reject(reason) => {
                let reason = if critic.parsed.blocking_issues.is_empty() {
                    reason
                } else {
                    format!("{}: {}", reason, critic.parsed.blocking_issues.join("; "))
                };
                return Err(UnitError::Gate(reason));
            }
        }

        // ==================== Apply ====================
        let started = Instant::now();
        let batch = self
            .writes
            .apply_batch(&coder.parsed.changes, &unit.id)
            .await?;
        self.progress.on_event(&ProgressEvent::Step {
            unit_id: unit.id.clone(),
            role: SubagentRole::Coder,
            action: "apply changes".to_string(),
            summary: format!(
                "{} change(s) applied to {} file(s)",
                batch.outcomes.len(),
                batch.files_touched.len()
            ),
            duration_ms: started.elapsed().as_millis() as u64,
        });

        // ==================== Unit verification ====================
        let mut verification_passed = None;
        if self.verification.strict && !self.context.dry_run && !batch.files_touched.is_empty() {
            let commands = curate_unit_commands(&self.verification.commands);
            if !commands.is_empty() {
                let outcome = self
                    .verifier
                    .run(&commands, VerificationMode::Unit, self.progress.as_ref())
                    .await?;
                if !outcome.passed {
                    return Err(UnitError::Verification(
                        outcome.failed_commands().join(", "),
                    ));
                }
                warnings.extend(
                    outcome
                        .quarantined
                        .iter()
                        .map(|c| format!("Flaky command quarantined: {}", c)),
                );
                verification_passed = Some(true);
            }
        }

        Ok(UnitCompletion {
            summary: coder.parsed.summary,
            critic_score: Some(critic.parsed.score),
            verification_passed,
            files_touched: batch.files_touched,
            warnings,
        })
    }

    /// Call one role, recording its output as an artifact and a step event.
    async fn call_role<T: SubagentOutput>(
        &self,
        unit: &WorkUnit,
        call: SubagentCall<'_>,
        action: &str,
        summary: impl Fn(&T) -> String,
    ) -> Result<SubagentResponse<T>, SubagentError> {
        let started = Instant::now();
        let response = self.caller.call::<T>(call).await?;
        let summary = summary(&response.parsed);

        self.artifacts.record(ArtifactRecord::new(
            call.role,
            &unit.id,
            &summary,
            serde_json::to_value(&response.parsed).unwrap_or_default(),
        ));
        self.progress.on_event(&ProgressEvent::Step {
            unit_id: unit.id.clone(),
            role: call.role,
            action: action.to_string(),
            summary,
            duration_ms: started.elapsed().as_millis() as u64,
        });
        Ok(response)
    }

    /// Best-effort reads of the files the unit is likely to touch.
    async fn collect_snippets(
        &self,
        unit: &WorkUnit,
        scout: &ScoutOutput,
        planner: &PlannerOutput,
    ) -> Vec<FileSnippet> {
        let mut candidates: Vec<&str> = Vec::new();
        let paths = unit
            .files_hint
            .iter()
            .map(String::as_str)
            .chain(scout.relevant_files.iter().map(|f| f.path.as_str()))
            .chain(planner.write_targets.iter().map(|t| t.path.as_str()));
        for path in paths {
            if !candidates.contains(&path) {
                candidates.push(path);
            }
        }

        let mut snippets = Vec::new();
        for path in candidates {
            if snippets.len() >= self.config.max_snippets {
                break;
            }
            if let Some(snippet) = self
                .writes
                .read_snippet(path, self.config.snippet_max_lines)
                .await
            {
                snippets.push(snippet);
            }
        }
        snippets
    }
}

#[async_trait]
impl UnitExecutor for UnitPipeline {
    async fn execute(
        &self,
        unit: &WorkUnit,
        attempt: &UnitAttempt,
    ) -> Result<UnitCompletion, UnitError> {
        info!(unit = %unit.id, attempt = attempt.number, "Running unit attempt");
        let result = self.run_attempt(unit, attempt).await;
        if let Err(e) = &result {
            warn!(unit = %unit.id, attempt = attempt.number, error = %e, "Unit attempt failed");
        }
        result
    }

    fn retries_enabled(&self) -> bool {
        self.config.auto_fix
    }
}
