//! Project intelligence port

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a scan of the workspace learned about the project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInsights {
    pub stack_hints: Vec<String>,
    pub hotspots: Vec<String>,
    pub risk_signals: Vec<String>,
}

impl ProjectInsights {
    pub fn is_empty(&self) -> bool {
        self.stack_hints.is_empty() && self.hotspots.is_empty() && self.risk_signals.is_empty()
    }

    /// Prompt-ready rendering; empty when nothing was found.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        if !self.stack_hints.is_empty() {
            lines.push(format!("Stack: {}", self.stack_hints.join(", ")));
        }
        if !self.hotspots.is_empty() {
            lines.push(format!("Hotspots: {}", self.hotspots.join(", ")));
        }
        if !self.risk_signals.is_empty() {
            lines.push(format!("Risks: {}", self.risk_signals.join("; ")));
        }
        lines.join("\n")
    }
}

#[async_trait]
pub trait ProjectIntelligence: Send + Sync {
    /// Best-effort scan; failures yield empty insights.
    async fn analyze(&self, root: &Path) -> ProjectInsights;
}

pub struct NoProjectIntelligence;

#[async_trait]
impl ProjectIntelligence for NoProjectIntelligence {
    async fn analyze(&self, _root: &Path) -> ProjectInsights {
        ProjectInsights::default()
    }
}
