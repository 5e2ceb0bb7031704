//! Scorer configuration, loaded from a JSON file. Secrets are never stored here; the
//! config names the environment variables that hold them.

use crate::model::{ModelFormat, ProbabilityConvention};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Where user log records come from
    pub store: StoreConfig,
    /// The two risk models
    pub models: ModelsConfig,
    /// Aggregation parameters
    pub features: FeaturesConfig,
    pub scoring: ScoringConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON fixture file (`{ "<user>": [records] }`); empty when no path is given
    Memory {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    /// Local SQLite database with encrypted record payloads
    Sqlite {
        path: PathBuf,
        #[serde(default = "default_store_secret_env")]
        secret_env: String,
    },
    /// PostgREST-style table (e.g. Supabase)
    Rest {
        endpoint: String,
        #[serde(default = "default_rest_table")]
        table: String,
        #[serde(default = "default_user_column")]
        user_column: String,
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_store_secret_env() -> String {
    "STABILITY_STORE_SECRET".to_string()
}

fn default_rest_table() -> String {
    "profiles".to_string()
}

fn default_user_column() -> String {
    "id".to_string()
}

fn default_api_key_env() -> String {
    "STABILITY_STORE_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub heart_failure: ModelConfig,
    pub diabetes: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Inferred from the file extension when absent
    #[serde(default)]
    pub format: Option<ModelFormat>,
    #[serde(default)]
    pub convention: ProbabilityConvention,
    /// Refuse to load unless the file's SHA-256 matches (hex)
    #[serde(default)]
    pub sha256: Option<String>,
    /// ONNX output holding class probabilities
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Only the most recent N records are aggregated; all when unset
    pub window_records: Option<NonZeroUsize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Run the two model inferences on separate threads
    pub parallel_inference: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            models: ModelsConfig::default(),
            features: FeaturesConfig::default(),
            scoring: ScoringConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite {
            path: PathBuf::from(".stability/records.db"),
            secret_env: default_store_secret_env(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            heart_failure: ModelConfig {
                path: PathBuf::from("models/heart_failure.onnx"),
                format: None,
                convention: ProbabilityConvention::PositiveClass { index: 1 },
                sha256: None,
                output: None,
            },
            diabetes: ModelConfig {
                path: PathBuf::from("models/diabetes.onnx"),
                format: None,
                convention: ProbabilityConvention::MaxClass,
                sha256: None,
                output: None,
            },
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            parallel_inference: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ScorerConfig {
    /// Load from a JSON file; defaults when the file does not exist. A file that
    /// exists but does not parse is an error rather than a silent fallback.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json_str(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}
