//! Per-user physiological log records and the stores that serve them.
//!
//! Records keep their raw field values; numeric coercion happens later in
//! [`crate::features`], so a store never rejects a row for a bad value.

mod memory;
mod rest;
mod sqlite;

pub use memory::InMemoryRecordStore;
pub use rest::RestRecordStore;
pub use sqlite::SqliteRecordStore;

use crate::config::StoreConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// One observation for a user. Field values are stored as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn logged_at(mut self, ts: DateTime<Utc>) -> Self {
        self.logged_at = Some(ts);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// All records retrieved for exactly one user. Retrieval order carries no meaning
/// except for categorical fields, which are read from the first record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLogSet {
    pub user_id: String,
    pub records: Vec<LogRecord>,
}

impl UserLogSet {
    pub fn new(user_id: impl Into<String>, records: Vec<LogRecord>) -> Self {
        Self {
            user_id: user_id.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store backend error: {0}")]
    Backend(String),
    #[error("malformed record payload: {0}")]
    Decode(String),
    #[error("record payload could not be decrypted")]
    Crypto,
    #[error("environment variable {var} is not set")]
    MissingSecret { var: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// Source of user log sets.
///
/// `Ok(None)` means the user is unknown; `Ok(Some(set))` with an empty set means the
/// user exists but has no logs. Callers may treat both as "no data", but stores must
/// keep them apart.
pub trait RecordStore: Send + Sync {
    fn fetch(&self, user_id: &str) -> Result<Option<UserLogSet>, StoreError>;
}

fn secret_from_env(var: &str) -> Result<String, StoreError> {
    std::env::var(var).map_err(|_| StoreError::MissingSecret {
        var: var.to_string(),
    })
}

/// Build the configured store. `fields` is the column list remote stores select.
pub fn open_store(config: &StoreConfig, fields: &[String]) -> Result<Arc<dyn RecordStore>, StoreError> {
    match config {
        StoreConfig::Memory { path } => {
            let store = match path {
                Some(p) => InMemoryRecordStore::from_json_file(p)?,
                None => InMemoryRecordStore::new(),
            };
            Ok(Arc::new(store))
        }
        StoreConfig::Sqlite { path, secret_env } => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| StoreError::Backend(e.to_string()))?;
                }
            }
            let secret = secret_from_env(secret_env)?;
            Ok(Arc::new(SqliteRecordStore::open(path, secret.as_bytes())?))
        }
        StoreConfig::Rest {
            endpoint,
            table,
            user_column,
            api_key_env,
            timeout_secs,
        } => {
            let api_key = secret_from_env(api_key_env)?;
            let store = RestRecordStore::new(endpoint, table, user_column, api_key, fields, *timeout_secs)?;
            Ok(Arc::new(store))
        }
    }
}
