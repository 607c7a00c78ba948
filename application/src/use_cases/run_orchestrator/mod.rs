//! Run Orchestrator
//!
//! Top-level driver of one run:
//!
//! | Phase                 | Notes                                              |
//! |-----------------------|----------------------------------------------------|
//! | 1. Clarifying         | unanswered required questions stop the run         |
//! | 2. Planning           | supervisor decomposition, single-unit fallback     |
//! | 3. Preflight          | optional, informational only                       |
//! | 4. Scheduling         | [`DependencyScheduler`] over the [`UnitPipeline`]  |
//! | 5. Final verification | optional full command list                         |
//! | 6. Synthesis          | synthesizer summary, rollback, memory persistence  |

mod planning;
mod synthesis;
mod types;

pub use types::{BudgetUsage, MultiAgentReport, RunError, RunInput, RunReport};

use crate::config::{ModelRouting, RunConfig};
use crate::ports::cache_persistence::SubagentCachePersistence;
use crate::ports::file_store::FileStore;
use crate::ports::memory_store::{MemoryEntry, MemoryStore};
use crate::ports::model_gateway::ModelGateway;
use crate::ports::process_runner::ProcessRunner;
use crate::ports::progress::{NoProgress, ProgressEvent, RunProgressNotifier};
use crate::ports::project_intelligence::ProjectIntelligence;
use crate::ports::run_logger::{NoRunLogger, RunEventLogger, RunLogEvent};
use crate::ports::skills_loader::SkillsLoader;
use crate::use_cases::artifacts::ArtifactStore;
use crate::use_cases::change_applier::{ChangeApplier, WriteQueue};
use crate::use_cases::command_executor::CommandExecutor;
use crate::use_cases::observability::ObservabilityTracker;
use crate::use_cases::scheduler::{DependencyScheduler, RunIdentity, SupervisorReplanner};
use crate::use_cases::shared::check_cancelled;
use crate::use_cases::subagent::{SubagentCache, SubagentCaller};
use crate::use_cases::unit_pipeline::UnitPipeline;
use crate::use_cases::verification::VerificationRunner;
use chrono::{DateTime, Utc};
use cohort_domain::run::status::{RunOutcomeFacts, derive_run_status, likely_requires_code_changes};
use cohort_domain::{
    ClarificationQuestion, ContinuationPacket, ExecutionMode, PathPolicy, RunPhase, RunStatus,
    SynthesisOutput, VerificationMode, VerificationOutcome,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Ports a run is wired against.
#[derive(Clone)]
pub struct RunServices {
    pub gateway: Arc<dyn ModelGateway>,
    pub files: Arc<dyn FileStore>,
    pub processes: Arc<dyn ProcessRunner>,
    pub memory: Arc<dyn MemoryStore>,
    pub intelligence: Arc<dyn ProjectIntelligence>,
    pub skills: Arc<dyn SkillsLoader>,
    pub cache: Arc<dyn SubagentCachePersistence>,
}

/// Services that live for exactly one run.
struct RunScope {
    observability: Arc<ObservabilityTracker>,
    artifacts: Arc<ArtifactStore>,
    cache: Arc<SubagentCache>,
    caller: Arc<SubagentCaller>,
    writes: Arc<WriteQueue>,
    executor: Arc<CommandExecutor>,
    verifier: Arc<VerificationRunner>,
}

/// Progress notifier that also appends every event to the run log.
struct LoggedProgress {
    inner: Arc<dyn RunProgressNotifier>,
    logger: Arc<dyn RunEventLogger>,
}

impl RunProgressNotifier for LoggedProgress {
    fn on_event(&self, event: &ProgressEvent) {
        self.inner.on_event(event);
        match serde_json::to_value(event) {
            Ok(payload) => self.logger.log(RunLogEvent::new(event.event_type(), payload)),
            Err(e) => debug!(error = %e, "Failed to serialize progress event"),
        }
    }
}

/// Use case for running a goal end to end
pub struct RunOrchestrator {
    services: RunServices,
    config: RunConfig,
    routing: ModelRouting,
    progress: Arc<dyn RunProgressNotifier>,
    logger: Arc<dyn RunEventLogger>,
    cancellation: CancellationToken,
}

impl RunOrchestrator {
    pub fn new(services: RunServices, config: RunConfig, routing: ModelRouting) -> Self {
        Self {
            services,
            config,
            routing,
            progress: Arc::new(NoProgress),
            logger: Arc::new(NoRunLogger),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn RunProgressNotifier>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn RunEventLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run `input` to a terminal status.
    ///
    /// Every outcome except cancellation produces a [`RunReport`]; a failed
    /// run is a report with a failing status, not an error.
    pub async fn run(&self, input: RunInput) -> Result<RunReport, RunError> {
        let goal = input.goal.trim().to_string();
        if goal.is_empty() {
            return Err(RunError::EmptyGoal);
        }

        let run_id = Uuid::new_v4().to_string();
        let events: Arc<dyn RunProgressNotifier> = Arc::new(LoggedProgress {
            inner: self.progress.clone(),
            logger: self.logger.clone(),
        });
        info!(run_id = %run_id, goal = %goal, dry_run = self.config.dry_run, "Starting run");
        events.on_event(&ProgressEvent::Started {
            run_id: run_id.clone(),
            goal: goal.clone(),
            dry_run: self.config.dry_run,
        });

        match self.execute(&run_id, &goal, &input, events.clone()).await {
            Ok(report) => {
                info!(run_id = %run_id, status = %report.status, "Run finished");
                events.on_event(&ProgressEvent::Completed {
                    status: report.status,
                    summary: report.synthesis.summary.clone(),
                });
                Ok(report)
            }
            Err(e) => {
                if e.is_cancelled() {
                    warn!(run_id = %run_id, "Run cancelled");
                    events.on_event(&ProgressEvent::Completed {
                        status: RunStatus::Cancelled,
                        summary: "Run cancelled".to_string(),
                    });
                } else {
                    events.on_event(&ProgressEvent::Failed {
                        error: e.to_string(),
                    });
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run_id: &str,
        goal: &str,
        input: &RunInput,
        events: Arc<dyn RunProgressNotifier>,
    ) -> Result<RunReport, RunError> {
        let started_at = Utc::now();
        let config = &self.config;
        let budgets = &config.budgets;

        // ==================== Clarifying ====================
        events.on_event(&ProgressEvent::status(
            RunPhase::Clarifying,
            "checking clarification answers",
        ));
        let missing: Vec<ClarificationQuestion> = input
            .clarification
            .missing_answers()
            .into_iter()
            .cloned()
            .collect();
        if !missing.is_empty() {
            info!(missing = missing.len(), "Clarification required");
            return Ok(self.clarification_report(run_id, goal, started_at, missing));
        }
        check_cancelled(&self.cancellation)?;

        // ==================== Run-scoped services ====================
        let observability = Arc::new(ObservabilityTracker::new());
        let artifacts = Arc::new(ArtifactStore::new());
        let cache = Arc::new(SubagentCache::load(
            self.services.cache.clone(),
            config.cache.max_entries,
        ));
        let caller = Arc::new(
            SubagentCaller::new(
                self.services.gateway.clone(),
                self.routing.clone(),
                cache.clone(),
                observability.clone(),
            )
            .with_max_attempts(config.pipeline.subagent_max_attempts)
            .with_generation(config.pipeline.temperature, config.pipeline.max_tokens)
            .with_cancellation(self.cancellation.clone()),
        );
        let policy = config
            .safety
            .protected_paths
            .iter()
            .fold(PathPolicy::default(), |policy, prefix| {
                policy.with_protected_prefix(prefix.clone())
            });
        let writes = Arc::new(WriteQueue::new(
            ChangeApplier::new(self.services.files.clone(), policy, budgets.max_file_writes)
                .with_dry_run(config.dry_run),
        ));
        let executor = Arc::new(
            CommandExecutor::new(
                self.services.processes.clone(),
                self.services.files.root().to_path_buf(),
                config.safety.allowed_programs.iter().cloned(),
                budgets.max_command_runs,
            )
            .with_timeout(budgets.command_timeout)
            .with_cancellation(self.cancellation.clone()),
        );
        let verifier = Arc::new(VerificationRunner::new(
            executor.clone(),
            observability.clone(),
        ));
        let scope = RunScope {
            observability,
            artifacts,
            cache,
            caller,
            writes,
            executor,
            verifier,
        };

        match self
            .drive(run_id, goal, input, events, &scope, started_at)
            .await
        {
            Err(RunError::Cancelled) => {
                self.rollback_cancelled(&scope.writes).await;
                Err(RunError::Cancelled)
            }
            other => other,
        }
    }

    /// Planning through persistence, against the run-scoped services.
    async fn drive(
        &self,
        run_id: &str,
        goal: &str,
        input: &RunInput,
        events: Arc<dyn RunProgressNotifier>,
        scope: &RunScope,
        started_at: DateTime<Utc>,
    ) -> Result<RunReport, RunError> {
        let RunScope {
            observability,
            artifacts,
            cache,
            caller,
            writes,
            executor,
            verifier,
        } = scope;
        let config = &self.config;
        let budgets = &config.budgets;
        let execution_mode = ExecutionMode::from_dry_run(config.dry_run);

        // ==================== Planning ====================
        events.on_event(&ProgressEvent::status(
            RunPhase::Planning,
            "decomposing goal into work units",
        ));
        let (context, continuation_hint) = self
            .gather_context(goal, &input.clarification, executor)
            .await;
        let context = Arc::new(context);
        let plan = self.plan_units(&caller, &context, &continuation_hint).await?;
        events.on_event(&ProgressEvent::status(
            RunPhase::Planning,
            if plan.fallback {
                "planning failed; running the goal as a single unit".to_string()
            } else {
                format!("{} work unit(s) planned", plan.units.len())
            },
        ));

        let pending: Vec<_> = plan
            .units
            .iter()
            .cloned()
            .map(cohort_domain::WorkUnitState::new)
            .collect();
        self.save_continuation(ContinuationPacket::from_states(
            run_id,
            execution_mode,
            goal,
            &pending,
        ))
        .await;

        // ==================== Preflight ====================
        let commands = &config.verification.commands;
        let preflight = if config.verification.preflight && !commands.is_empty() {
            events.on_event(&ProgressEvent::status(RunPhase::Preflight, "running preflight checks"));
            Some(
                self.verify(&verifier, commands, VerificationMode::Preflight, events.as_ref())
                    .await?,
            )
        } else {
            None
        };

        // ==================== Scheduling ====================
        events.on_event(&ProgressEvent::status(
            RunPhase::Scheduling,
            "executing work units",
        ));
        let pipeline = Arc::new(UnitPipeline::new(
            context.clone(),
            caller.clone(),
            writes.clone(),
            verifier.clone(),
            artifacts.clone(),
            self.services.memory.clone(),
            events.clone(),
            config.pipeline.clone(),
            config.verification.clone(),
        ));
        let scheduler = DependencyScheduler::new(
            pipeline,
            Arc::new(SupervisorReplanner::new(caller.clone(), goal)),
            self.services.memory.clone(),
            observability.clone(),
            events.clone(),
            budgets.clone(),
            config.pipeline.max_unit_attempts,
            RunIdentity {
                run_id: run_id.to_string(),
                goal: goal.to_string(),
                execution_mode,
            },
        )
        .with_cancellation(self.cancellation.clone());
        let outcome = scheduler.run(plan.units).await?;

        // ==================== Final verification ====================
        let final_verification = if !commands.is_empty() && !outcome.budget_exhausted {
            events.on_event(&ProgressEvent::status(
                RunPhase::FinalVerification,
                "running final verification",
            ));
            Some(
                self.verify(&verifier, commands, VerificationMode::Final, events.as_ref())
                    .await?,
            )
        } else {
            None
        };

        let files_written = writes.files_written().await;
        let derived = derive_run_status(&RunOutcomeFacts {
            budget_exhausted: outcome.budget_exhausted,
            final_verification_passed: final_verification.as_ref().map(|v| v.passed),
            strict_verification: config.verification.strict,
            coding_goal: likely_requires_code_changes(goal),
            files_written: files_written.len(),
            dry_run: config.dry_run,
            ..RunOutcomeFacts::from_states(&outcome.states)
        });
        check_cancelled(&self.cancellation)?;

        // ==================== Rollback ====================
        let rollback = if derived.status != RunStatus::Completed
            && config.safety.rollback_on_failure
            && !config.dry_run
        {
            let report = writes.rollback().await;
            if !report.is_clean() {
                warn!(failures = report.failures.len(), "Rollback incomplete");
            }
            info!(restored = report.touched(), "Rolled back run changes");
            Some(report)
        } else {
            None
        };

        // ==================== Synthesis ====================
        events.on_event(&ProgressEvent::status(RunPhase::Synthesis, "summarizing run"));
        let mut notes: Vec<String> = derived.note.iter().cloned().collect();
        if let Some(verification) = &final_verification
            && !verification.passed
        {
            notes.push(format!(
                "Final verification failed: {}",
                verification.failed_commands().join(", ")
            ));
        }
        if let Some(rollback) = &rollback {
            notes.push(format!(
                "Rolled back {} file(s); {} rollback failure(s)",
                rollback.touched(),
                rollback.failures.len()
            ));
        }
        let quarantined = verifier.quarantined();
        if !quarantined.is_empty() {
            notes.push(format!("Quarantined flaky commands: {}", quarantined.join(", ")));
        }

        let synthesis = self
            .synthesize(&caller, goal, derived.status, &outcome.states, &notes)
            .await?;

        // ==================== Persistence ====================
        self.remember_outcome(run_id, goal, derived.status, &synthesis)
            .await;
        self.save_continuation(
            ContinuationPacket::from_states(run_id, execution_mode, goal, &outcome.states)
                .with_summary(synthesis.summary.clone()),
        )
        .await;
        if let Err(e) = cache.persist() {
            warn!(error = %e, "Failed to persist subagent cache");
        }
        events.on_event(&ProgressEvent::status(RunPhase::Done, derived.status.as_str()));

        let observability = observability.snapshot();
        Ok(RunReport {
            run_id: run_id.to_string(),
            goal: goal.to_string(),
            status: derived.status,
            status_note: derived.note,
            dry_run: config.dry_run,
            started_at,
            finished_at: Utc::now(),
            open_questions: Vec::new(),
            budgets: BudgetUsage {
                iterations_used: outcome.iterations_used,
                max_iterations: budgets.max_iterations,
                file_writes_used: writes.writes_used().await,
                max_file_writes: budgets.max_file_writes,
                command_runs_used: executor.runs_used(),
                max_command_runs: budgets.max_command_runs,
                replans_used: outcome.replans_used,
                max_replans: budgets.max_replans,
            },
            preflight,
            final_verification,
            change_journal: writes.journal().await,
            files_written,
            rollback,
            synthesis,
            multi_agent_report: MultiAgentReport {
                strategy: plan.strategy,
                work_units: outcome.states,
                artifacts: artifacts.all(),
                quarantined_commands: quarantined,
                failure_heatmap: observability.failure_heatmap.clone(),
                observability,
            },
        })
    }

    /// Undo applied changes after cancellation when rollback is enabled.
    async fn rollback_cancelled(&self, writes: &WriteQueue) {
        if !self.config.safety.rollback_on_failure || self.config.dry_run {
            return;
        }
        let report = writes.rollback().await;
        if report.touched() == 0 && report.is_clean() {
            return;
        }
        if !report.is_clean() {
            warn!(failures = report.failures.len(), "Rollback after cancellation incomplete");
        }
        info!(restored = report.touched(), "Rolled back changes of cancelled run");
    }

    /// Only cancellation escapes the verification runner as an error.
    async fn verify(
        &self,
        verifier: &VerificationRunner,
        commands: &[String],
        mode: VerificationMode,
        events: &dyn RunProgressNotifier,
    ) -> Result<VerificationOutcome, RunError> {
        verifier
            .run(commands, mode, events)
            .await
            .map_err(|_| RunError::Cancelled)
    }

    async fn save_continuation(&self, packet: ContinuationPacket) {
        if let Err(e) = self.services.memory.save_continuation_packet(&packet).await {
            warn!(error = %e, "Failed to save continuation packet");
        }
    }

    async fn remember_outcome(
        &self,
        run_id: &str,
        goal: &str,
        status: RunStatus,
        synthesis: &SynthesisOutput,
    ) {
        let entry = MemoryEntry::new(
            "run_outcome",
            format!("Goal: {}\nStatus: {}\n{}", goal, status, synthesis.summary),
        )
        .with_tag(status.as_str())
        .with_tag(format!("run:{}", run_id));
        if let Err(e) = self.services.memory.add(vec![entry]).await {
            warn!(error = %e, "Failed to record run outcome in memory");
        }
    }

    fn clarification_report(
        &self,
        run_id: &str,
        goal: &str,
        started_at: DateTime<Utc>,
        missing: Vec<ClarificationQuestion>,
    ) -> RunReport {
        let budgets = &self.config.budgets;
        RunReport {
            run_id: run_id.to_string(),
            goal: goal.to_string(),
            status: RunStatus::NeedsClarification,
            status_note: Some(format!(
                "{} required question(s) unanswered",
                missing.len()
            )),
            dry_run: self.config.dry_run,
            started_at,
            finished_at: Utc::now(),
            budgets: BudgetUsage {
                max_iterations: budgets.max_iterations,
                max_file_writes: budgets.max_file_writes,
                max_command_runs: budgets.max_command_runs,
                max_replans: budgets.max_replans,
                ..Default::default()
            },
            preflight: None,
            final_verification: None,
            change_journal: Vec::new(),
            files_written: Vec::new(),
            rollback: None,
            synthesis: SynthesisOutput {
                summary: "Clarification is required before the run can start".to_string(),
                highlights: Vec::new(),
                follow_ups: missing
                    .iter()
                    .map(|q| format!("Answer {}: {}", q.id, q.question))
                    .collect(),
            },
            open_questions: missing,
            multi_agent_report: MultiAgentReport::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::cache_persistence::NoCachePersistence;
    use crate::ports::memory_store::NoMemory;
    use crate::ports::project_intelligence::NoProjectIntelligence;
    use crate::ports::skills_loader::NoSkills;
    use crate::test_support::{MemoryFileStore, ScriptedGateway, ScriptedRunner};
    use cohort_domain::{Clarification, SubagentRole, UnitStatus};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl RunProgressNotifier for RecordingProgress {
        fn on_event(&self, event: &ProgressEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[derive(Default)]
    struct RecordingLogger {
        types: Mutex<Vec<&'static str>>,
    }

    impl RunEventLogger for RecordingLogger {
        fn log(&self, event: RunLogEvent) {
            self.types.lock().unwrap().push(event.event_type);
        }
    }

    struct Fixture {
        gateway: Arc<ScriptedGateway>,
        store: Arc<MemoryFileStore>,
        runner: Arc<ScriptedRunner>,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)], runner: ScriptedRunner) -> Self {
            Self {
                gateway: Arc::new(ScriptedGateway::new()),
                store: Arc::new(MemoryFileStore::with_files(files)),
                runner: Arc::new(runner),
            }
        }

        fn orchestrator(&self, config: RunConfig) -> RunOrchestrator {
            let services = RunServices {
                gateway: self.gateway.clone(),
                files: self.store.clone(),
                processes: self.runner.clone(),
                memory: Arc::new(NoMemory),
                intelligence: Arc::new(NoProjectIntelligence),
                skills: Arc::new(NoSkills),
                cache: Arc::new(NoCachePersistence),
            };
            RunOrchestrator::new(services, config, ModelRouting::default())
        }

        fn script_unit_roles(&self) {
            self.gateway.respond_json(
                SubagentRole::Scout,
                json!({"summary": "found router", "relevant_files": [{"path": "src/app.rs"}]}),
            );
            self.gateway.respond_json(
                SubagentRole::Planner,
                json!({"summary": "add module", "test_focus": ["health route"]}),
            );
            self.gateway.respond_json(
                SubagentRole::Coder,
                json!({"summary": "write health module", "confidence": 0.9,
                       "changes": [{"kind": "write_file", "path": "src/health.rs",
                                    "content": "pub fn health() {}\n"}]}),
            );
            self.gateway
                .respond_json(SubagentRole::Critic, json!({"summary": "ok", "score": 0.9}));
        }
    }

    fn two_unit_plan() -> serde_json::Value {
        json!({
            "summary": "two steps",
            "strategy": "module first, then wiring",
            "work_units": [
                {"id": "module", "title": "Add module", "objective": "Create src/health.rs"},
                {"id": "wire", "title": "Wire route", "objective": "Use the module",
                 "depends_on": ["module"]}
            ]
        })
    }

    #[tokio::test]
    async fn test_successful_run() {
        let fixture = Fixture::new(&[("src/app.rs", "fn main() {}\n")], ScriptedRunner::passing());
        fixture.gateway.respond_json(SubagentRole::Supervisor, two_unit_plan());
        fixture.script_unit_roles();
        fixture.gateway.respond_json(
            SubagentRole::Synthesizer,
            json!({"summary": "Health endpoint added", "highlights": ["new module"]}),
        );
        let progress = Arc::new(RecordingProgress::default());
        let logger = Arc::new(RecordingLogger::default());
        let config = RunConfig::default().with_verification_commands(vec!["cargo test".into()]);

        let report = fixture
            .orchestrator(config)
            .with_progress(progress.clone())
            .with_logger(logger.clone())
            .run(RunInput::new("Add a health endpoint"))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.synthesis.summary, "Health endpoint added");
        assert_eq!(report.files_written, vec!["src/health.rs".to_string()]);
        assert_eq!(report.unit_count(), 2);
        assert!(report
            .multi_agent_report
            .work_units
            .iter()
            .all(|s| s.status == UnitStatus::Completed));
        assert_eq!(report.multi_agent_report.strategy, "module first, then wiring");
        assert_eq!(report.final_verification.as_ref().map(|v| v.passed), Some(true));
        assert!(report.rollback.is_none());
        assert_eq!(report.budgets.iterations_used, 2);
        assert_eq!(report.budgets.command_runs_used, 1);
        assert_eq!(
            fixture.store.content("src/health.rs").as_deref(),
            Some("pub fn health() {}\n")
        );

        let events = progress.events.lock().unwrap();
        assert!(matches!(events.first(), Some(ProgressEvent::Started { .. })));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::Completed {
                status: RunStatus::Completed,
                ..
            })
        ));
        assert!(events.iter().any(|e| matches!(e, ProgressEvent::Step { .. })));
        assert_eq!(logger.types.lock().unwrap().len(), events.len());
    }

    #[tokio::test]
    async fn test_missing_clarification_stops_before_any_work() {
        let fixture = Fixture::new(&[], ScriptedRunner::passing());
        let clarification = Clarification {
            required: true,
            questions: vec![ClarificationQuestion::required("db", "Which database?")],
            answers: Default::default(),
        };
        let report = fixture
            .orchestrator(RunConfig::default())
            .run(RunInput::new("Add persistence").with_clarification(clarification))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::NeedsClarification);
        assert_eq!(report.open_questions.len(), 1);
        assert_eq!(fixture.gateway.call_count(SubagentRole::Supervisor), 0);
        assert!(fixture.runner.calls().is_empty());
        assert!(fixture.store.paths().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_plan_falls_back_to_single_unit() {
        let fixture = Fixture::new(&[("src/app.rs", "fn main() {}\n")], ScriptedRunner::passing());
        fixture.gateway.respond(SubagentRole::Supervisor, "I would split this into steps.");
        fixture.script_unit_roles();
        fixture
            .gateway
            .respond_json(SubagentRole::Synthesizer, json!({"summary": "done"}));

        let report = fixture
            .orchestrator(RunConfig::default())
            .run(RunInput::new("Add a health endpoint"))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.multi_agent_report.work_units.len(), 1);
        assert_eq!(report.multi_agent_report.work_units[0].id(), "complete-goal");
    }

    #[tokio::test]
    async fn test_failed_final_verification_rolls_back() {
        let runner = ScriptedRunner::passing().failing("cargo test", 10);
        let fixture = Fixture::new(&[("src/app.rs", "fn main() {}\n")], runner);
        fixture.gateway.respond_json(SubagentRole::Supervisor, two_unit_plan());
        fixture.script_unit_roles();
        fixture
            .gateway
            .respond_json(SubagentRole::Synthesizer, json!({"summary": "tests fail"}));
        let config = RunConfig::default()
            .with_strict_verification(true)
            .with_verification_commands(vec!["cargo test".into()]);

        let report = fixture
            .orchestrator(config)
            .run(RunInput::new("Add a health endpoint"))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::VerificationFailed);
        let rollback = report.rollback.expect("rollback report");
        assert!(rollback.is_clean());
        assert_eq!(rollback.deleted, vec!["src/health.rs".to_string()]);
        assert!(fixture.store.content("src/health.rs").is_none());
        // Final mode retries a failing test command twice
        assert_eq!(fixture.runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_synthesis_failure_uses_local_summary() {
        let fixture = Fixture::new(&[("src/app.rs", "fn main() {}\n")], ScriptedRunner::passing());
        fixture.gateway.respond_json(SubagentRole::Supervisor, two_unit_plan());
        fixture.script_unit_roles();
        fixture.gateway.respond(SubagentRole::Synthesizer, "no summary today");

        let report = fixture
            .orchestrator(RunConfig::default())
            .run(RunInput::new("Add a health endpoint"))
            .await
            .unwrap();
        assert_eq!(report.synthesis.summary, "Run completed: 2/2 work units completed");
    }

    #[tokio::test]
    async fn test_dry_run_leaves_workspace_untouched() {
        let fixture = Fixture::new(&[("src/app.rs", "fn main() {}\n")], ScriptedRunner::passing());
        fixture.gateway.respond_json(SubagentRole::Supervisor, two_unit_plan());
        fixture.script_unit_roles();
        fixture
            .gateway
            .respond_json(SubagentRole::Synthesizer, json!({"summary": "previewed"}));

        let report = fixture
            .orchestrator(RunConfig::default().with_dry_run(true))
            .run(RunInput::new("Add a health endpoint"))
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert!(report.files_written.is_empty());
        assert!(report.change_journal.iter().all(|e| e.dry_run));
        assert_eq!(report.budgets.file_writes_used, 2);
        assert_eq!(fixture.store.paths(), vec!["src/app.rs".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_an_error() {
        let fixture = Fixture::new(&[], ScriptedRunner::passing());
        let token = CancellationToken::new();
        token.cancel();
        let progress = Arc::new(RecordingProgress::default());

        let err = fixture
            .orchestrator(RunConfig::default())
            .with_progress(progress.clone())
            .with_cancellation(token)
            .run(RunInput::new("Add a health endpoint"))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(matches!(
            progress.events.lock().unwrap().last(),
            Some(ProgressEvent::Completed {
                status: RunStatus::Cancelled,
                ..
            })
        ));
        assert_eq!(fixture.gateway.call_count(SubagentRole::Supervisor), 0);
    }

    #[tokio::test]
    async fn test_git_workspace_status_reaches_the_supervisor() {
        let fixture = Fixture::new(
            &[("src/app.rs", "fn main() {}\n"), (".git/HEAD", "ref: refs/heads/main\n")],
            ScriptedRunner::passing(),
        );
        fixture.gateway.respond_json(SubagentRole::Supervisor, two_unit_plan());
        fixture.script_unit_roles();
        fixture
            .gateway
            .respond_json(SubagentRole::Synthesizer, json!({"summary": "done"}));

        let report = fixture
            .orchestrator(RunConfig::default())
            .run(RunInput::new("Add a health endpoint"))
            .await
            .unwrap();

        assert_eq!(fixture.runner.calls(), vec!["git status --porcelain".to_string()]);
        assert_eq!(report.budgets.command_runs_used, 1);
        let prompt = &fixture.gateway.prompts(SubagentRole::Supervisor)[0];
        assert!(prompt.contains("Uncommitted changes (git status):\nok"));
    }

    #[tokio::test]
    async fn test_workspace_status_skipped_outside_git() {
        let fixture = Fixture::new(&[("src/app.rs", "fn main() {}\n")], ScriptedRunner::passing());
        fixture.gateway.respond_json(SubagentRole::Supervisor, two_unit_plan());
        fixture.script_unit_roles();
        fixture
            .gateway
            .respond_json(SubagentRole::Synthesizer, json!({"summary": "done"}));

        fixture
            .orchestrator(RunConfig::default())
            .run(RunInput::new("Add a health endpoint"))
            .await
            .unwrap();

        assert!(fixture.runner.calls().is_empty());
        assert!(!fixture.gateway.prompts(SubagentRole::Supervisor)[0].contains("Uncommitted"));
    }

    /// Cancels the run as soon as `unit` reports completion.
    struct CancelAfterUnit {
        unit: &'static str,
        token: CancellationToken,
    }

    impl RunProgressNotifier for CancelAfterUnit {
        fn on_event(&self, event: &ProgressEvent) {
            if let ProgressEvent::Status {
                unit_id: Some(id),
                message,
                ..
            } = event
                && id == self.unit
                && message == "completed"
            {
                self.token.cancel();
            }
        }
    }

    async fn cancel_after_module(fixture: &Fixture, config: RunConfig) -> RunError {
        fixture.gateway.respond_json(SubagentRole::Supervisor, two_unit_plan());
        fixture.script_unit_roles();
        let token = CancellationToken::new();
        let progress = Arc::new(CancelAfterUnit {
            unit: "module",
            token: token.clone(),
        });

        fixture
            .orchestrator(config)
            .with_progress(progress)
            .with_cancellation(token)
            .run(RunInput::new("Add a health endpoint"))
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_cancellation_rolls_back_applied_units() {
        let fixture = Fixture::new(&[("src/app.rs", "fn main() {}\n")], ScriptedRunner::passing());

        let err = cancel_after_module(&fixture, RunConfig::default()).await;

        assert!(err.is_cancelled());
        assert_eq!(fixture.gateway.call_count(SubagentRole::Coder), 1);
        assert!(fixture.store.content("src/health.rs").is_none());
        assert_eq!(
            fixture.store.content("src/app.rs").as_deref(),
            Some("fn main() {}\n")
        );
    }

    #[tokio::test]
    async fn test_cancellation_keeps_changes_without_rollback() {
        let fixture = Fixture::new(&[("src/app.rs", "fn main() {}\n")], ScriptedRunner::passing());

        let err = cancel_after_module(&fixture, RunConfig::default().with_rollback(false)).await;

        assert!(err.is_cancelled());
        assert_eq!(
            fixture.store.content("src/health.rs").as_deref(),
            Some("pub fn health() {}\n")
        );
    }

    #[tokio::test]
    async fn test_empty_goal_is_rejected() {
        let fixture = Fixture::new(&[], ScriptedRunner::passing());
        let err = fixture
            .orchestrator(RunConfig::default())
            .run(RunInput::new("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::EmptyGoal));
    }
}
