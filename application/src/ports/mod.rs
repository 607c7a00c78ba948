//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod cache_persistence;
pub mod file_store;
pub mod memory_store;
pub mod model_gateway;
pub mod process_runner;
pub mod progress;
pub mod project_intelligence;
pub mod run_logger;
pub mod skills_loader;
