//! Application-level configuration.
//!
//! - [`RunConfig`]: budgets, pipeline tuning, verification and safety for one run
//! - [`ModelRouting`]: role/tier to model resolution

pub mod model_routing;
pub mod run_config;

pub use model_routing::ModelRouting;
pub use run_config::{
    BudgetConfig, CacheConfig, PipelineConfig, RunConfig, SafetyConfig, VerificationConfig,
};
