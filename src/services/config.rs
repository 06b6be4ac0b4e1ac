//! Configuration management for the chartwright engine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("Failed to read configuration: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed for {field}: {reason}")]
    ValidationError { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub iteration: IterationConfig,
    pub ledger: LedgerConfig,
    pub artifacts: ArtifactsConfig,
    pub logging: LoggingConfig,
}

/// Bounds for the two-level convergence loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    /// Critic feedback rounds per outer iteration (1-5).
    pub max_critic_turns: u32,
    /// User feedback iterations per run (1-10).
    pub max_user_iterations: u32,
    /// Regeneration attempts within one failed critic turn (1-5).
    pub max_regen_attempts: u32,
    /// Minimum quality score for critic approval (0.5-1.0).
    pub critic_threshold: f64,
    /// Past critic feedback items included in the writer context (1-10).
    pub critic_context_depth: usize,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            max_critic_turns: 3,
            max_user_iterations: 5,
            max_regen_attempts: 2,
            critic_threshold: 0.7,
            critic_context_depth: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { capacity: 250 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub base_dir: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            base_dir: "artifacts".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load() -> Result<Self, ConfigError> {
        let path = Path::new("chartwright.toml");
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Config::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CHARTWRIGHT_MAX_CRITIC_TURNS") {
            if let Ok(v) = val.parse() { self.iteration.max_critic_turns = v; }
        }
        if let Ok(val) = std::env::var("CHARTWRIGHT_CRITIC_THRESHOLD") {
            if let Ok(v) = val.parse() { self.iteration.critic_threshold = v; }
        }
        if let Ok(val) = std::env::var("CHARTWRIGHT_ARTIFACTS_DIR") {
            self.artifacts.base_dir = val;
        }
        if let Ok(val) = std::env::var("CHARTWRIGHT_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let it = &self.iteration;
        if !(1..=5).contains(&it.max_critic_turns) {
            return Err(ConfigError::ValidationError {
                field: "iteration.max_critic_turns".to_string(),
                reason: "must be between 1 and 5".to_string(),
            });
        }
        if !(1..=10).contains(&it.max_user_iterations) {
            return Err(ConfigError::ValidationError {
                field: "iteration.max_user_iterations".to_string(),
                reason: "must be between 1 and 10".to_string(),
            });
        }
        if !(1..=5).contains(&it.max_regen_attempts) {
            return Err(ConfigError::ValidationError {
                field: "iteration.max_regen_attempts".to_string(),
                reason: "must be between 1 and 5".to_string(),
            });
        }
        if !(0.5..=1.0).contains(&it.critic_threshold) {
            return Err(ConfigError::ValidationError {
                field: "iteration.critic_threshold".to_string(),
                reason: "must be between 0.5 and 1.0".to_string(),
            });
        }
        if !(1..=10).contains(&it.critic_context_depth) {
            return Err(ConfigError::ValidationError {
                field: "iteration.critic_context_depth".to_string(),
                reason: "must be between 1 and 10".to_string(),
            });
        }
        if self.ledger.capacity == 0 {
            return Err(ConfigError::ValidationError {
                field: "ledger.capacity".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn sample_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.iteration.max_critic_turns, 3);
        assert!((config.iteration.critic_threshold - 0.7).abs() < 1e-9);
        assert_eq!(config.ledger.capacity, 250);
    }

    #[test]
    fn out_of_range_turns_rejected() {
        let mut config = Config::default();
        config.iteration.max_critic_turns = 6;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { field, .. }) if field == "iteration.max_critic_turns"
        ));
    }

    #[test]
    fn threshold_range_enforced() {
        let mut config = Config::default();
        config.iteration.critic_threshold = 0.4;
        assert!(config.validate().is_err());
        config.iteration.critic_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sample_toml_round_trips() {
        let sample = Config::sample_toml();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str("[iteration]\nmax_critic_turns = 5\n").unwrap();
        assert_eq!(parsed.iteration.max_critic_turns, 5);
        assert_eq!(parsed.iteration.max_regen_attempts, 2);
        assert_eq!(parsed.ledger.capacity, 250);
    }
}
