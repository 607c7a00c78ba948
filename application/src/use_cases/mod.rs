//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod artifacts;
pub mod change_applier;
pub mod command_executor;
pub mod observability;
pub mod run_orchestrator;
pub mod scheduler;
pub mod shared;
pub mod subagent;
pub mod unit_pipeline;
pub mod verification;
