//! `[provider]` and `[output]` sections.

use crate::gateway::HttpGatewaySettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat-completions endpoint configuration
///
/// # Example
///
/// ```toml
/// [provider]
/// base_url = "http://localhost:4141/v1"
/// api_key_env = "COHORT_API_KEY"
/// request_timeout_secs = 300
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    pub base_url: String,
    /// Environment variable holding the bearer token
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        let defaults = HttpGatewaySettings::default();
        Self {
            base_url: defaults.base_url,
            api_key_env: "COHORT_API_KEY".to_string(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

impl FileProviderConfig {
    /// Resolve settings, reading the key from the environment.
    pub fn to_settings(&self) -> HttpGatewaySettings {
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        HttpGatewaySettings {
            base_url: self.base_url.clone(),
            api_key,
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    pub format: FileOutputFormat,
    /// Enable colored terminal output
    pub color: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            format: FileOutputFormat::Text,
            color: true,
        }
    }
}
