//! Infrastructure layer for cohort
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod context;
pub mod gateway;
pub mod logging;
pub mod persistence;
pub mod process;
pub mod workspace;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigLoader, FileConfig, FileOutputFormat, Severity};
pub use context::{ManifestIntelligence, MarkdownSkillsLoader};
pub use gateway::{HttpChatGateway, HttpGatewaySettings};
pub use logging::JsonlRunLogger;
pub use persistence::{JsonCacheStore, JsonMemoryStore};
pub use process::TokioProcessRunner;
pub use workspace::LocalFileStore;
