//! Domain layer for cohort
//!
//! Pure types and rules for multi-agent work-unit orchestration. Nothing in
//! this crate performs I/O; the application layer drives it through ports.
//!
//! # Core Concepts
//!
//! ## Work units
//!
//! A goal is decomposed into [`WorkUnit`]s forming a dependency graph. The
//! scheduler releases a unit only once every dependency is completed, and
//! repairs cycles or deadlocks by asking the supervisor for new edges
//! ([`work_unit::graph::revise_dependencies`]).
//!
//! ## Subagent roles
//!
//! Each unit runs through Scout → Planner → Coder → Critic. Every role returns
//! one JSON object, decoded into its schema type in [`subagent::outputs`].
//!
//! ## Changes
//!
//! Coder output is a list of [`FileChange`]s, checked by [`PathPolicy`] and
//! applied with literal, ambiguity-checked patching ([`change::patch`]).

pub mod artifact;
pub mod change;
pub mod core;
pub mod observability;
pub mod prompt;
pub mod review;
pub mod run;
pub mod session;
pub mod subagent;
pub mod verification;
pub mod work_unit;

// Re-export commonly used types
pub use artifact::{ARTIFACT_CONTEXT_WINDOW, ArtifactRecord, render_artifact_context};
pub use change::{
    entities::{
        ChangeJournalEntry, ChangeOp, ChangeOutcome, FileChange, FileSnapshot, FileSnippet,
        PatchHunk, RollbackFailure, RollbackReport,
    },
    patch::{MAX_FILE_CHARS, PatchError, apply_hunks},
    path_policy::{PathPolicy, PathPolicyViolation, RUN_STATE_DIR},
};
pub use core::{error::DomainError, model::Model};
pub use observability::{ObservabilityMetric, ObservabilitySummary};
pub use prompt::{RolePromptTemplate, UnitPromptContext};
pub use review::{GateDecision, GateInput, decide};
pub use run::{
    clarification::{Clarification, ClarificationQuestion},
    continuation::{ContinuationPacket, ExecutionMode},
    failure::UnitFailureCategory,
    status::{RunPhase, RunStatus},
};
pub use session::entities::{Message, Role};
pub use subagent::{
    outputs::{
        CoderOutput, CriticOutput, PlannerOutput, ReplanOutput, ScoutOutput, SubagentOutput,
        SupervisorPlanOutput, SynthesisOutput,
    },
    parsing::{ParseError, extract_json_object},
    role::{ModelTier, SubagentRole},
};
pub use verification::{VerificationCheckResult, VerificationMode, VerificationOutcome};
pub use work_unit::{
    board::UnitBoard,
    entities::{UnitCompletion, UnitStatus, WorkUnit, WorkUnitState},
};
