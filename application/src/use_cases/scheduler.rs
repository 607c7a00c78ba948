//! Dependency Scheduler
//!
//! Owns the work-unit board for a run. Each round it blocks dependents of
//! failed units, releases the ready set in bounded-parallel batches and,
//! when nothing can run, asks the supervisor to revise dependencies.

use crate::config::BudgetConfig;
use crate::ports::memory_store::MemoryStore;
use crate::ports::progress::{ProgressEvent, RunProgressNotifier};
use crate::use_cases::observability::ObservabilityTracker;
use crate::use_cases::shared::{Cancelled, check_cancelled};
use crate::use_cases::subagent::{SubagentCall, SubagentCaller, SubagentError};
use crate::use_cases::unit_pipeline::UnitError;
use async_trait::async_trait;
use cohort_domain::work_unit::graph::{find_cycle, revise_dependencies, units_on_cycles};
use cohort_domain::{
    ContinuationPacket, ExecutionMode, ReplanOutput, RolePromptTemplate, RunPhase, SubagentRole,
    UnitBoard, UnitCompletion, UnitFailureCategory, WorkUnit, WorkUnitState,
};
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One attempt of a unit, as seen by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitAttempt {
    /// 1-based attempt number
    pub number: usize,
    pub max_attempts: usize,
    /// Error from the previous attempt, fed back to the coder
    pub previous_error: Option<String>,
}

impl UnitAttempt {
    pub fn is_final(&self) -> bool {
        self.number >= self.max_attempts
    }
}

/// Runs a single attempt of a work unit.
#[async_trait]
pub trait UnitExecutor: Send + Sync {
    async fn execute(
        &self,
        unit: &WorkUnit,
        attempt: &UnitAttempt,
    ) -> Result<UnitCompletion, UnitError>;

    /// Whether a retryable failure earns another attempt.
    fn retries_enabled(&self) -> bool {
        true
    }
}

/// Proposes new `depends_on` edges when the graph cannot make progress.
#[async_trait]
pub trait DependencyReplanner: Send + Sync {
    async fn replan(&self, units: &[WorkUnit], problem: &str) -> Result<ReplanOutput, SubagentError>;
}

/// Replanner backed by the supervisor role.
pub struct SupervisorReplanner {
    caller: Arc<SubagentCaller>,
    goal: String,
}

impl SupervisorReplanner {
    pub fn new(caller: Arc<SubagentCaller>, goal: impl Into<String>) -> Self {
        Self {
            caller,
            goal: goal.into(),
        }
    }
}

#[async_trait]
impl DependencyReplanner for SupervisorReplanner {
    async fn replan(&self, units: &[WorkUnit], problem: &str) -> Result<ReplanOutput, SubagentError> {
        let system = RolePromptTemplate::system(SubagentRole::Supervisor);
        let prompt = RolePromptTemplate::supervisor_replan(&self.goal, units, problem);
        let response = self
            .caller
            .call::<ReplanOutput>(SubagentCall::new(SubagentRole::Supervisor, &system, &prompt))
            .await?;
        Ok(response.parsed)
    }
}

/// Final scheduler state handed back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOutcome {
    pub states: Vec<WorkUnitState>,
    pub budget_exhausted: bool,
    pub iterations_used: usize,
    pub replans_used: usize,
}

/// Identity of the run, stamped on continuation packets.
#[derive(Debug, Clone)]
pub struct RunIdentity {
    pub run_id: String,
    pub goal: String,
    pub execution_mode: ExecutionMode,
}

/// Shared iteration counter; one unit attempt costs one iteration.
struct IterationBudget {
    used: AtomicUsize,
    max: usize,
    exhausted: AtomicBool,
}

impl IterationBudget {
    fn new(max: usize) -> Self {
        Self {
            used: AtomicUsize::new(0),
            max,
            exhausted: AtomicBool::new(false),
        }
    }

    fn try_consume(&self) -> bool {
        let ok = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.max).then_some(used + 1)
            })
            .is_ok();
        if !ok {
            self.exhausted.store(true, Ordering::SeqCst);
        }
        ok
    }

    fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    fn remaining(&self) -> usize {
        self.max.saturating_sub(self.used())
    }

    fn mark_exhausted(&self) {
        self.exhausted.store(true, Ordering::SeqCst);
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }
}

struct UnitRun {
    id: String,
    attempts: usize,
    result: Result<UnitCompletion, UnitError>,
}

pub struct DependencyScheduler {
    executor: Arc<dyn UnitExecutor>,
    replanner: Arc<dyn DependencyReplanner>,
    memory: Arc<dyn MemoryStore>,
    observability: Arc<ObservabilityTracker>,
    progress: Arc<dyn RunProgressNotifier>,
    budgets: BudgetConfig,
    max_unit_attempts: usize,
    identity: RunIdentity,
    cancellation: CancellationToken,
}

impl DependencyScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executor: Arc<dyn UnitExecutor>,
        replanner: Arc<dyn DependencyReplanner>,
        memory: Arc<dyn MemoryStore>,
        observability: Arc<ObservabilityTracker>,
        progress: Arc<dyn RunProgressNotifier>,
        budgets: BudgetConfig,
        max_unit_attempts: usize,
        identity: RunIdentity,
    ) -> Self {
        Self {
            executor,
            replanner,
            memory,
            observability,
            progress,
            budgets,
            max_unit_attempts: max_unit_attempts.max(1),
            identity,
            cancellation: CancellationToken::new(),
        }
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Execute `units` until every one is resolved or the budget runs out.
    pub async fn run(&self, units: Vec<WorkUnit>) -> Result<SchedulerOutcome, Cancelled> {
        let mut board = UnitBoard::new(units);
        let budget = IterationBudget::new(self.budgets.max_iterations);
        let mut replans_used = 0;

        if let Some(cycle) = find_cycle(&board.units()) {
            let problem = format!("Dependency cycle: {}", cycle.join(" -> "));
            warn!(%problem, "Initial plan has a cycle");
            self.repair(&mut board, &mut replans_used, &problem).await?;
        }

        loop {
            check_cancelled(&self.cancellation)?;

            for id in board.block_dependents_of_failed() {
                self.observability
                    .record_unit_failure(UnitFailureCategory::Dependency);
                self.progress.on_event(&ProgressEvent::unit_status(
                    RunPhase::Scheduling,
                    &id,
                    "blocked by a failed dependency",
                ));
            }

            if !board.has_pending() {
                break;
            }
            if budget.remaining() == 0 {
                budget.mark_exhausted();
                warn!(used = budget.used(), "Iteration budget exhausted");
                break;
            }

            let ready = board.ready();
            if ready.is_empty() {
                let units = board.units();
                let problem = match find_cycle(&units) {
                    Some(cycle) => format!("Dependency cycle: {}", cycle.join(" -> ")),
                    None => format!(
                        "No unit can start; pending: {}",
                        board.pending_ids().join(", ")
                    ),
                };
                warn!(%problem, "Scheduling deadlock");
                if self.repair(&mut board, &mut replans_used, &problem).await? {
                    continue;
                }
                self.block_unreachable(&mut board);
                break;
            }

            let batch: Vec<WorkUnit> = ready
                .into_iter()
                .take(self.budgets.max_parallel_work_units.max(1).min(budget.remaining()))
                .collect();
            info!(
                units = ?batch.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(),
                "Dispatching batch"
            );
            for unit in &batch {
                if let Some(state) = board.get_mut(&unit.id) {
                    state.mark_running();
                }
                self.progress.on_event(&ProgressEvent::unit_status(
                    RunPhase::Scheduling,
                    &unit.id,
                    format!("started: {}", unit.title),
                ));
            }

            let runs = join_all(batch.into_iter().map(|unit| self.run_unit(unit, &budget))).await;

            let mut cancelled = false;
            for run in runs {
                let Some(state) = board.get_mut(&run.id) else {
                    continue;
                };
                state.attempts = run.attempts;
                match run.result {
                    Ok(completion) => {
                        state.mark_completed(completion);
                        self.progress.on_event(&ProgressEvent::unit_status(
                            RunPhase::Scheduling,
                            &run.id,
                            "completed",
                        ));
                    }
                    Err(e) if e.is_cancelled() => cancelled = true,
                    // Never attempted, so it stays eligible for a continuation
                    Err(UnitError::BudgetExhausted) if run.attempts == 0 => {
                        state.mark_not_started();
                        self.progress.on_event(&ProgressEvent::unit_status(
                            RunPhase::Scheduling,
                            &run.id,
                            "not started: iteration budget exhausted",
                        ));
                    }
                    Err(e) => {
                        let category = e.category();
                        state.mark_failed(e.to_string(), category);
                        self.observability.record_unit_failure(category);
                        self.progress.on_event(&ProgressEvent::unit_status(
                            RunPhase::Scheduling,
                            &run.id,
                            format!("failed: {}", e),
                        ));
                    }
                }
            }

            self.save_continuation(&board).await;

            if cancelled {
                return Err(Cancelled);
            }
            if budget.is_exhausted() {
                warn!(used = budget.used(), "Iteration budget exhausted");
                break;
            }
        }

        let budget_exhausted = budget.is_exhausted();
        Ok(SchedulerOutcome {
            states: board.into_states(),
            budget_exhausted,
            iterations_used: budget.used(),
            replans_used,
        })
    }

    async fn run_unit(&self, unit: WorkUnit, budget: &IterationBudget) -> UnitRun {
        let mut previous_error = None;
        let mut attempts = 0;

        for number in 1..=self.max_unit_attempts {
            if self.cancellation.is_cancelled() {
                return UnitRun {
                    id: unit.id,
                    attempts,
                    result: Err(UnitError::Cancelled),
                };
            }
            if !budget.try_consume() {
                return UnitRun {
                    id: unit.id,
                    attempts,
                    result: Err(UnitError::BudgetExhausted),
                };
            }
            attempts = number;

            let attempt = UnitAttempt {
                number,
                max_attempts: self.max_unit_attempts,
                previous_error: previous_error.take(),
            };
            match self.executor.execute(&unit, &attempt).await {
                Ok(completion) => {
                    return UnitRun {
                        id: unit.id,
                        attempts,
                        result: Ok(completion),
                    };
                }
                Err(e) => {
                    let retry = !attempt.is_final()
                        && e.is_retryable()
                        && self.executor.retries_enabled();
                    if !retry {
                        return UnitRun {
                            id: unit.id,
                            attempts,
                            result: Err(e),
                        };
                    }
                    debug!(unit = %unit.id, attempt = number, "Retrying unit");
                    previous_error = Some(e.to_string());
                }
            }
        }

        UnitRun {
            id: unit.id,
            attempts,
            result: Err(UnitError::BudgetExhausted),
        }
    }

    /// Ask for revised dependencies until one applies or the replan budget
    /// is spent. Returns whether the board changed.
    async fn repair(
        &self,
        board: &mut UnitBoard,
        replans_used: &mut usize,
        problem: &str,
    ) -> Result<bool, Cancelled> {
        while *replans_used < self.budgets.max_replans {
            check_cancelled(&self.cancellation)?;
            *replans_used += 1;
            self.progress.on_event(&ProgressEvent::status(
                RunPhase::Scheduling,
                format!("replanning dependencies ({}/{})", replans_used, self.budgets.max_replans),
            ));

            let units = board.units();
            let proposal = match self.replanner.replan(&units, problem).await {
                Ok(proposal) => proposal,
                Err(SubagentError::Cancelled) => return Err(Cancelled),
                Err(e) => {
                    warn!(error = %e, "Dependency replan failed");
                    continue;
                }
            };

            match revise_dependencies(&units, &proposal.depends_on) {
                Ok(revised) => {
                    info!(rationale = %proposal.rationale, "Applied dependency revision");
                    board.replace_dependencies(&revised);
                    return Ok(true);
                }
                Err(rejected) => warn!(reason = %rejected, "Rejected dependency revision"),
            }
        }
        Ok(false)
    }

    /// Block every pending unit once no revision can help.
    fn block_unreachable(&self, board: &mut UnitBoard) {
        let units = board.units();
        let on_cycles = units_on_cycles(&units);
        let cycle_path = find_cycle(&units).map(|c| c.join(" -> "));

        let blocked = board.block_pending(|id| match &cycle_path {
            Some(path) if on_cycles.contains(id) => {
                format!("Dependency cycle could not be repaired: {}", path)
            }
            _ => "Dependency failed: prerequisites can never complete".to_string(),
        });
        for id in blocked {
            self.observability
                .record_unit_failure(UnitFailureCategory::Dependency);
            self.progress.on_event(&ProgressEvent::unit_status(
                RunPhase::Scheduling,
                &id,
                "blocked",
            ));
        }
    }

    async fn save_continuation(&self, board: &UnitBoard) {
        let states: Vec<WorkUnitState> = board.states().cloned().collect();
        let packet = ContinuationPacket::from_states(
            &self.identity.run_id,
            self.identity.execution_mode,
            &self.identity.goal,
            &states,
        );
        if let Err(e) = self.memory.save_continuation_packet(&packet).await {
            warn!(error = %e, "Failed to save continuation packet");
        }
    }
}
