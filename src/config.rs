//! On-disk configuration for the stagers CLI

use crate::core::grouping::GroupingConfig;
use crate::services::scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "config.json";
const API_KEY_ENV_VARS: [&str; 2] = ["STAGERS_EMBEDDING_API_KEY", "GEMINI_API_KEY"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    Gemini,
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// sled directory for cached vectors; memory only when unset.
    pub cache_path: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Gemini,
            model: "text-embedding-004".to_string(),
            base_url: None,
            api_key: None,
            timeout_secs: 30,
            cache_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagersConfig {
    pub grouping: GroupingConfig,
    pub embedding: EmbeddingConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
}

impl StagersConfig {
    /// `<config_dir>/stagers/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stagers").join(CONFIG_FILE_NAME))
    }

    /// Load from `explicit` when given, else from the default location if a
    /// file exists there, else defaults. Environment overrides are applied
    /// and the result is validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => {
                    log::debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// The first non-empty API key variable wins over the file value.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty());

        if let Some(key) = from_env {
            self.embedding.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let grouping = &self.grouping;

        check_unit_interval("grouping.feature_gate", grouping.feature_gate)?;
        check_unit_interval("grouping.match_threshold", grouping.match_threshold)?;

        if !(grouping.window_decay.is_finite() && grouping.window_decay > 0.0) {
            return Err(ConfigError::Invalid {
                field: "grouping.window_decay",
                message: format!("must be positive, got {}", grouping.window_decay),
            });
        }

        let weights = &grouping.weights;
        let all = [
            weights.flooring,
            weights.windows,
            weights.features,
            weights.embedding,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Invalid {
                field: "grouping.weights",
                message: "weights must be non-negative".to_string(),
            });
        }
        if weights.total() <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "grouping.weights",
                message: "weights must not all be zero".to_string(),
            });
        }

        if self.scheduler.max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.max_concurrent",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

fn check_unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            message: format!("must be within [0, 1], got {}", value),
        })
    }
}
