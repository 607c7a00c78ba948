//! Configuration file loading for cohort
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `COHORT_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./cohort.toml` or `./.cohort.toml`
//! 4. Global: `~/.config/cohort/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigIssue, FileBudgetsConfig, FileConfig, FileModelsConfig, FileOutputConfig,
    FileOutputFormat, FileProviderConfig, FileSafetyConfig, Severity,
};
pub use loader::ConfigLoader;
