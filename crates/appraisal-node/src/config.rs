use anyhow::{Context, Result};
use appraisal_session::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for the `appraisal` targets when `RUST_LOG` is unset
    pub level: String,
    /// `pretty`, `compact` or `json`
    pub format: String,
    /// Also append log lines to this file
    #[serde(default)]
    pub file_output: Option<PathBuf>,
    /// Extra `target = level` directives
    #[serde(default)]
    pub module_filters: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub show_boot_banner: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: HashMap::new(),
            show_boot_banner: true,
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        // Env overrides are left to main.rs so it controls precedence
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.engine.apply_env_overrides();

        if let Ok(level) = env::var("APPRAISAL_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(format) = env::var("APPRAISAL_LOG_FORMAT") {
            if !format.is_empty() {
                self.logging.format = format;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            anyhow::bail!("unknown log format '{}'", self.logging.format);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        let mut config = NodeConfig::default();
        env::set_var("APPRAISAL_LOG_LEVEL", "debug");
        env::set_var("APPRAISAL_LOG_FORMAT", "json");
        env::set_var("APPRAISAL_MIN_STAKE", "7");
        config.apply_env_overrides();
        env::remove_var("APPRAISAL_LOG_LEVEL");
        env::remove_var("APPRAISAL_LOG_FORMAT");
        env::remove_var("APPRAISAL_MIN_STAKE");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.engine.min_stake, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let mut config = NodeConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
