//! Manifest-based project intelligence.
//!
//! Detects the stack from well-known build manifests, ranks the largest
//! source files as hotspots and flags a few workspace risks.

use crate::workspace::walk::walk_pruned;
use async_trait::async_trait;
use cohort_application::ports::project_intelligence::{ProjectInsights, ProjectIntelligence};
use glob::glob;
use std::path::Path;
use tracing::{debug, warn};

const MANIFESTS: &[(&str, &str)] = &[
    ("Cargo.toml", "rust (cargo)"),
    ("package.json", "javascript/typescript (npm)"),
    ("pyproject.toml", "python (pyproject)"),
    ("requirements.txt", "python (pip)"),
    ("go.mod", "go (modules)"),
    ("pom.xml", "java (maven)"),
    ("build.gradle", "jvm (gradle)"),
    ("*.csproj", "dotnet (msbuild)"),
    ("*.sln", "dotnet (solution)"),
    ("Makefile", "make"),
];

const SOURCE_EXTENSIONS: &[&str] = &["rs", "ts", "tsx", "js", "jsx", "py", "go", "java", "kt"];
const SKIP_DIRS: &[&str] = &["target", "node_modules", ".git", ".cohort", "dist", "build", ".venv"];
const MAX_HOTSPOTS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct ManifestIntelligence;

impl ManifestIntelligence {
    pub fn new() -> Self {
        Self
    }

    fn scan(root: &Path) -> ProjectInsights {
        let mut insights = ProjectInsights::default();

        for (pattern, hint) in MANIFESTS {
            if Self::has_root_match(root, pattern) {
                insights.stack_hints.push((*hint).to_string());
            }
        }

        let mut sources: Vec<(u64, String)> = Vec::new();
        let mut has_tests = false;
        let entries = walk_pruned(root, SKIP_DIRS).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to walk workspace");
            Vec::new()
        });
        for entry in entries.into_iter().filter(|e| !e.is_dir) {
            let relative = entry.relative.to_string_lossy().replace('\\', "/");
            if relative.split('/').any(|part| part == "tests" || part == "test")
                || relative.contains("_test.")
                || relative.contains(".test.")
            {
                has_tests = true;
            }
            let is_source = entry
                .relative
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e));
            if is_source && let Ok(meta) = root.join(&entry.relative).metadata() {
                sources.push((meta.len(), relative));
            }
        }

        sources.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        insights.hotspots = sources
            .into_iter()
            .take(MAX_HOTSPOTS)
            .map(|(_, path)| path)
            .collect();

        if insights.stack_hints.is_empty() {
            insights
                .risk_signals
                .push("no build manifest found; verification commands may not apply".into());
        }
        if !has_tests && !insights.hotspots.is_empty() {
            insights
                .risk_signals
                .push("no test files detected; changes are hard to verify".into());
        }
        if root.join(".env").exists() {
            insights
                .risk_signals
                .push(".env present; secrets must not be edited or echoed".into());
        }
        insights
    }
}

impl ManifestIntelligence {
    /// Whether a file directly under `root` matches the manifest `pattern`.
    fn has_root_match(root: &Path, pattern: &str) -> bool {
        let full = format!("{}/{}", glob::Pattern::escape(&root.to_string_lossy()), pattern);
        match glob(&full) {
            Ok(mut paths) => paths.any(|p| p.is_ok_and(|p| p.is_file())),
            Err(e) => {
                debug!(pattern, error = %e, "Invalid manifest pattern");
                false
            }
        }
    }
}

#[async_trait]
impl ProjectIntelligence for ManifestIntelligence {
    async fn analyze(&self, root: &Path) -> ProjectInsights {
        let root = root.to_path_buf();
        match tokio::task::spawn_blocking(move || Self::scan(&root)).await {
            Ok(insights) => insights,
            Err(e) => {
                warn!(error = %e, "Project scan failed");
                ProjectInsights::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_detects_stack_hotspots_and_risks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/big.rs"), "x".repeat(500)).unwrap();
        fs::write(root.join("src/small.rs"), "x").unwrap();
        fs::create_dir_all(root.join("target")).unwrap();
        fs::write(root.join("target/huge.rs"), "x".repeat(5000)).unwrap();
        fs::write(root.join(".env"), "KEY=1").unwrap();

        let insights = ManifestIntelligence::new().analyze(root).await;
        assert_eq!(insights.stack_hints, vec!["rust (cargo)".to_string()]);
        assert_eq!(insights.hotspots, vec!["src/big.rs", "src/small.rs"]);
        assert!(insights.risk_signals.iter().any(|r| r.contains("no test files")));
        assert!(insights.risk_signals.iter().any(|r| r.contains(".env")));
    }

    #[tokio::test]
    async fn test_manifest_patterns_match_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("Service.csproj"), "<Project />").unwrap();
        fs::create_dir_all(root.join("node_modules/pkg/tests")).unwrap();
        fs::write(root.join("node_modules/pkg/tests/huge.js"), "x".repeat(5000)).unwrap();
        fs::write(root.join("Program.java"), "class P {}").unwrap();

        let insights = ManifestIntelligence::new().analyze(root).await;
        assert_eq!(insights.stack_hints, vec!["dotnet (msbuild)".to_string()]);
        assert_eq!(insights.hotspots, vec!["Program.java"]);
        assert!(insights.risk_signals.iter().any(|r| r.contains("no test files")));
    }

    #[tokio::test]
    async fn test_empty_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let insights = ManifestIntelligence::new().analyze(dir.path()).await;
        assert!(insights.stack_hints.is_empty());
        assert!(insights.hotspots.is_empty());
        assert_eq!(insights.risk_signals.len(), 1);
    }
}
