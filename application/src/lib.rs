//! Application layer for cohort
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{ModelRouting, RunConfig};
pub use ports::{
    cache_persistence::{CachedSubagentArtifact, NoCachePersistence, SubagentCachePersistence},
    file_store::FileStore,
    memory_store::{MemoryStore, NoMemory},
    model_gateway::{GatewayError, ModelGateway},
    process_runner::ProcessRunner,
    progress::{CompositeProgress, NoProgress, ProgressEvent, RunProgressNotifier},
    project_intelligence::{NoProjectIntelligence, ProjectIntelligence},
    run_logger::{NoRunLogger, RunEventLogger, RunLogEvent},
    skills_loader::{NoSkills, SkillDocument, SkillsLoader},
};
pub use use_cases::run_orchestrator::{
    BudgetUsage, MultiAgentReport, RunError, RunInput, RunOrchestrator, RunReport, RunServices,
};
