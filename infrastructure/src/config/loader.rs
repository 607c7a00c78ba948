//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: &[&str] = &["cohort.toml", ".cohort.toml"];
const ENV_PREFIX: &str = "COHORT_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Environment: `COHORT_*` (`COHORT_BUDGETS__MAX_ITERATIONS=5`, plus
    ///    `COHORT_LIGHT_MODEL`, `COHORT_HEAVY_MODEL`, `COHORT_MODEL_OVERRIDE`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./cohort.toml` or `./.cohort.toml`
    /// 4. Global: `~/.config/cohort/config.toml`
    /// 5. Default values
    pub fn load(
        config_path: Option<&Path>,
        project_dir: &Path,
    ) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path(project_dir) {
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = config_path {
            if !path.is_file() {
                return Err(Box::new(figment::Error::from(format!(
                    "config file not found: {}",
                    path.display()
                ))));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).map(|key| env_key(key.as_str()).into()));

        figment.extract().map_err(Box::new)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path (`~/.config/cohort/config.toml`)
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cohort").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path(project_dir: &Path) -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(|name| project_dir.join(name))
            .find(|path| path.exists())
    }

    /// Describe the config file locations being used (for `--show-config`)
    pub fn describe_sources(project_dir: &Path, config_path: Option<&Path>) -> Vec<String> {
        let mut lines = vec!["Configuration sources (in priority order):".to_string()];
        lines.push(format!("  [ENV  ] {}*", ENV_PREFIX));

        if let Some(path) = config_path {
            let found = if path.is_file() { "FOUND" } else { "     " };
            lines.push(format!("  [{}] Explicit: {}", found, path.display()));
        }

        match Self::project_config_path(project_dir) {
            Some(path) => lines.push(format!("  [FOUND] Project: {}", path.display())),
            None => lines.push("  [     ] Project: ./cohort.toml or ./.cohort.toml".to_string()),
        }

        if let Some(path) = Self::global_config_path() {
            let found = if path.exists() { "FOUND" } else { "     " };
            lines.push(format!("  [{}] Global:  {}", found, path.display()));
        }

        lines.push("  [     ] Default: built-in defaults".to_string());
        lines
    }
}

/// Map a prefix-stripped environment key to its config path.
fn env_key(key: &str) -> String {
    match key.to_ascii_lowercase().as_str() {
        "light_model" => "models.light".to_string(),
        "heavy_model" => "models.heavy".to_string(),
        "model_override" => "models.override".to_string(),
        other => other.replace("__", "."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert!(config.models.light.is_none());
        assert!(config.safety.rollback_on_failure);
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        assert!(path.unwrap().to_string_lossy().contains("cohort"));
    }

    #[test]
    fn test_explicit_file_overrides_project_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("cohort.toml"),
            "[budgets]\nmax_iterations = 7\nmax_replans = 1\n",
        )
        .unwrap();
        let explicit = dir.path().join("explicit.toml");
        fs::write(&explicit, "[budgets]\nmax_iterations = 3\n").unwrap();

        let config = ConfigLoader::load(Some(&explicit), dir.path()).unwrap();
        assert_eq!(config.budgets.max_iterations, 3);
        assert_eq!(config.budgets.max_replans, 1);
        assert_eq!(config.budgets.max_file_writes, 40);
    }

    #[test]
    fn test_hidden_project_file_is_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".cohort.toml"), "skills = [\"a\"]\n").unwrap();
        assert!(ConfigLoader::project_config_path(dir.path()).is_some());
        let config = ConfigLoader::load(None, dir.path()).unwrap();
        assert_eq!(config.skills, vec!["a".to_string()]);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(ConfigLoader::load(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn test_env_key_mapping() {
        assert_eq!(env_key("LIGHT_MODEL"), "models.light");
        assert_eq!(env_key("heavy_model"), "models.heavy");
        assert_eq!(env_key("MODEL_OVERRIDE"), "models.override");
        assert_eq!(env_key("budgets__max_iterations"), "budgets.max_iterations");
    }
}
