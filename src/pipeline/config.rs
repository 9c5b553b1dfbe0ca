//! Configuration for the puzzle forge.
//!
//! Values come from defaults, an optional YAML file, then `FORGE_*`
//! environment variables, in that order of precedence (last wins).

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agents::{
    BatchConfig, CalibratorConfig, GeneratorConfig, OrchestratorConfig, QualityPipelineConfig,
    UniquenessConfig,
};
use crate::llm::{ModelTiers, RetryPolicy};
use crate::quality::RobustnessScale;

/// Default API base when only an OpenRouter key is configured.
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Top-level configuration for the puzzle forge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    // Generative service
    /// OpenAI-compatible API base URL.
    pub api_base: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub models: ModelTiers,
    /// Hard wall-clock limit on each generative call.
    pub call_timeout_secs: u64,
    pub retry: RetryPolicy,

    // Orchestration
    pub max_attempts: u32,
    pub quality_threshold: f64,
    pub acceptable_floor: f64,
    pub run_adversarial: bool,
    pub robustness_scale: RobustnessScale,
    pub persist: bool,
    pub avoid_recent_answers: usize,

    // Uniqueness
    pub recent_limit: usize,
    pub conflict_threshold: f64,
    pub hard_reject_threshold: f64,
    pub component_window_days: i64,
    pub pattern_window_days: i64,
    pub max_pattern_uses: usize,

    // Storage
    /// SQLite file; history is kept in memory when unset.
    pub database_path: Option<PathBuf>,

    // Batch
    pub batch_attempts_per_item: u32,
    pub batch_concurrency: usize,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: None,
            models: ModelTiers::default(),
            call_timeout_secs: 60,
            retry: RetryPolicy::default(),

            max_attempts: 3,
            quality_threshold: 85.0,
            acceptable_floor: 70.0,
            run_adversarial: true,
            robustness_scale: RobustnessScale::Strict,
            persist: true,
            avoid_recent_answers: 20,

            recent_limit: 100,
            conflict_threshold: 0.7,
            hard_reject_threshold: 0.8,
            component_window_days: 30,
            pattern_window_days: 3,
            max_pattern_uses: 1,

            database_path: None,

            batch_attempts_per_item: 2,
            batch_concurrency: 1,
        }
    }
}

impl ForgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with the environment, then validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::default().apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a YAML file; missing keys keep their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays environment variables on this configuration.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Generative service
        if let Some(key) = var("OPENROUTER_API_KEY") {
            self.api_key = Some(key);
            if self.api_base.is_none() {
                self.api_base = Some(OPENROUTER_API_BASE.to_string());
            }
        }
        if let Some(base) = var("LITELLM_API_BASE") {
            self.api_base = Some(base);
        }
        if let Some(key) = var("LITELLM_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = var("FORGE_MODEL") {
            self.models = ModelTiers::uniform(model);
        }
        if let Some(model) = var("FORGE_MODEL_FAST") {
            self.models = self.models.with_fast(model);
        }
        if let Some(model) = var("FORGE_MODEL_SMART") {
            self.models = self.models.with_smart(model);
        }
        if let Some(model) = var("FORGE_MODEL_CREATIVE") {
            self.models = self.models.with_creative(model);
        }
        if let Some(val) = var("FORGE_CALL_TIMEOUT_SECS") {
            self.call_timeout_secs = parse_env_value(&val, "FORGE_CALL_TIMEOUT_SECS")?;
        }
        if let Some(val) = var("FORGE_MAX_RETRIES") {
            self.retry.max_retries = parse_env_value(&val, "FORGE_MAX_RETRIES")?;
        }

        // Orchestration
        if let Some(val) = var("FORGE_MAX_ATTEMPTS") {
            self.max_attempts = parse_env_value(&val, "FORGE_MAX_ATTEMPTS")?;
        }
        if let Some(val) = var("FORGE_QUALITY_THRESHOLD") {
            self.quality_threshold = parse_env_value(&val, "FORGE_QUALITY_THRESHOLD")?;
        }
        if let Some(val) = var("FORGE_ACCEPTABLE_FLOOR") {
            self.acceptable_floor = parse_env_value(&val, "FORGE_ACCEPTABLE_FLOOR")?;
        }
        if let Some(val) = var("FORGE_ADVERSARIAL") {
            self.run_adversarial = parse_env_bool(&val, "FORGE_ADVERSARIAL")?;
        }
        if let Some(val) = var("FORGE_ROBUSTNESS_SCALE") {
            self.robustness_scale =
                val.parse()
                    .map_err(|message| ConfigError::InvalidValue {
                        key: "FORGE_ROBUSTNESS_SCALE".to_string(),
                        message,
                    })?;
        }
        if let Some(val) = var("FORGE_PERSIST") {
            self.persist = parse_env_bool(&val, "FORGE_PERSIST")?;
        }

        // Storage
        if let Some(val) = var("FORGE_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(val));
        }

        // Batch
        if let Some(val) = var("FORGE_BATCH_ATTEMPTS") {
            self.batch_attempts_per_item = parse_env_value(&val, "FORGE_BATCH_ATTEMPTS")?;
        }
        if let Some(val) = var("FORGE_BATCH_CONCURRENCY") {
            self.batch_concurrency = parse_env_value(&val, "FORGE_BATCH_CONCURRENCY")?;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.call_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "call_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.quality_threshold) {
            return Err(ConfigError::ValidationFailed(
                "quality_threshold must be between 0 and 100".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.acceptable_floor) {
            return Err(ConfigError::ValidationFailed(
                "acceptable_floor must be between 0 and 100".to_string(),
            ));
        }

        if self.acceptable_floor > self.quality_threshold {
            return Err(ConfigError::ValidationFailed(
                "acceptable_floor cannot exceed quality_threshold".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.conflict_threshold)
            || !(0.0..=1.0).contains(&self.hard_reject_threshold)
        {
            return Err(ConfigError::ValidationFailed(
                "similarity thresholds must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.conflict_threshold > self.hard_reject_threshold {
            return Err(ConfigError::ValidationFailed(
                "conflict_threshold cannot exceed hard_reject_threshold".to_string(),
            ));
        }

        if self.component_window_days < 0 || self.pattern_window_days < 0 {
            return Err(ConfigError::ValidationFailed(
                "windows cannot be negative".to_string(),
            ));
        }

        if self.batch_attempts_per_item == 0 || self.batch_concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "batch attempts and concurrency must be greater than 0".to_string(),
            ));
        }

        if self.models.fast.is_empty()
            || self.models.smart.is_empty()
            || self.models.creative.is_empty()
        {
            return Err(ConfigError::ValidationFailed(
                "model names cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// API base, or an error naming the variables that set it.
    pub fn require_api_base(&self) -> Result<&str, ConfigError> {
        self.api_base.as_deref().ok_or_else(|| {
            ConfigError::MissingEnvVar("LITELLM_API_BASE or OPENROUTER_API_KEY".to_string())
        })
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let timeout = self.call_timeout();
        OrchestratorConfig::new()
            .with_max_attempts(self.max_attempts)
            .with_quality_threshold(self.quality_threshold)
            .with_acceptable_floor(self.acceptable_floor)
            .with_persist_on_success(self.persist)
            .with_avoid_recent_answers(self.avoid_recent_answers)
            .with_generator_config(GeneratorConfig::default().with_timeout(timeout))
            .with_uniqueness_config(
                UniquenessConfig::new()
                    .with_recent_limit(self.recent_limit)
                    .with_conflict_threshold(self.conflict_threshold)
                    .with_hard_reject_threshold(self.hard_reject_threshold)
                    .with_component_window(ChronoDuration::days(self.component_window_days))
                    .with_pattern_window(ChronoDuration::days(self.pattern_window_days))
                    .with_max_pattern_uses(self.max_pattern_uses),
            )
            .with_calibrator_config(CalibratorConfig::default().with_timeout(timeout))
            .with_quality_config(
                QualityPipelineConfig::new()
                    .with_adversarial(self.run_adversarial)
                    .with_robustness_scale(self.robustness_scale)
                    .with_timeout(timeout),
            )
    }

    pub fn batch_config(&self, count: usize) -> BatchConfig {
        BatchConfig::new(count)
            .with_attempts_per_item(self.batch_attempts_per_item)
            .with_concurrency(self.batch_concurrency)
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn with_adversarial(mut self, enabled: bool) -> Self {
        self.run_adversarial = enabled;
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }
}

fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ForgeConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.quality_threshold, 85.0);
        assert_eq!(config.acceptable_floor, 70.0);
        assert!(config.run_adversarial);
        assert_eq!(config.call_timeout(), Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_openrouter_key_sets_default_base() {
        let config = ForgeConfig::default()
            .apply_vars(vars(&[("OPENROUTER_API_KEY", "sk-or-test")]))
            .expect("apply");
        assert_eq!(config.api_base.as_deref(), Some(OPENROUTER_API_BASE));
        assert_eq!(config.api_key.as_deref(), Some("sk-or-test"));
    }

    #[test]
    fn test_litellm_base_wins() {
        let config = ForgeConfig::default()
            .apply_vars(vars(&[
                ("OPENROUTER_API_KEY", "sk-or-test"),
                ("LITELLM_API_BASE", "http://localhost:4000"),
                ("FORGE_MAX_ATTEMPTS", "5"),
                ("FORGE_ADVERSARIAL", "off"),
                ("FORGE_ROBUSTNESS_SCALE", "rescale"),
            ]))
            .expect("apply");
        assert_eq!(config.require_api_base().ok(), Some("http://localhost:4000"));
        assert_eq!(config.max_attempts, 5);
        assert!(!config.run_adversarial);
        assert_eq!(config.robustness_scale, RobustnessScale::RescaleFractions);
    }

    #[test]
    fn test_invalid_env_values() {
        let err = ForgeConfig::default()
            .apply_vars(vars(&[("FORGE_MAX_ATTEMPTS", "three")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "FORGE_MAX_ATTEMPTS"));

        let err = ForgeConfig::default()
            .apply_vars(vars(&[("FORGE_PERSIST", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_api_base() {
        let config = ForgeConfig::default();
        assert!(matches!(
            config.require_api_base(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_validation() {
        assert!(ForgeConfig::new().with_max_attempts(0).validate().is_err());
        assert!(ForgeConfig::new()
            .with_quality_threshold(60.0)
            .validate()
            .is_err());

        let mut config = ForgeConfig::new();
        config.conflict_threshold = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "max_attempts: 4\nrun_adversarial: false\nmodels:\n  fast: a\n  smart: b\n  creative: c\ndatabase_path: /tmp/puzzles.db"
        )
        .expect("write");

        let config = ForgeConfig::from_yaml_file(file.path()).expect("load");
        assert_eq!(config.max_attempts, 4);
        assert!(!config.run_adversarial);
        assert_eq!(config.models.smart, "b");
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/puzzles.db")));
        assert_eq!(config.quality_threshold, 85.0);
    }

    #[test]
    fn test_orchestrator_config_mapping() {
        let config = ForgeConfig::new().with_adversarial(false).with_persist(false);
        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.max_attempts, 3);
        assert!(!orchestrator.quality.run_adversarial);
        assert!(!orchestrator.persist_on_success);
        assert_eq!(orchestrator.uniqueness.pattern_window, ChronoDuration::days(3));

        let batch = config.batch_config(6);
        assert_eq!(batch.count, 6);
        assert_eq!(batch.attempts_per_item, 2);
    }
}
