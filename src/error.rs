//! Request outcomes and how failures surface to callers.
//!
//! Bad input and insufficient data are reported with a specific message. Everything
//! else becomes [`ScoreError::Internal`]: logged with full detail, reported to the
//! caller with a fixed generic message.

use crate::config::ConfigError;
use crate::model::ModelError;
use crate::records::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Orchestrator states, in order. Used to attribute internal failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Fetching,
    Aggregating,
    Predicting,
    Fusing,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::Fetching => "fetching",
            Stage::Aggregating => "aggregating",
            Stage::Predicting => "predicting",
            Stage::Fusing => "fusing",
            Stage::Responding => "responding",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }
}

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error while {stage}: {source}")]
    Internal {
        stage: Stage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ScoreError {
    pub fn internal(stage: Stage, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ScoreError::Internal {
            stage,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoreError::BadRequest(_) => ErrorKind::BadRequest,
            ScoreError::NotFound(_) => ErrorKind::NotFound,
            ScoreError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// What the caller sees. Internal detail never leaves the process.
    pub fn body(&self) -> ErrorBody {
        let error = match self {
            ScoreError::BadRequest(msg) | ScoreError::NotFound(msg) => msg.clone(),
            ScoreError::Internal { .. } => INTERNAL_ERROR_MESSAGE.to_string(),
        };
        ErrorBody {
            error,
            status: self.kind().status_code(),
        }
    }

    /// Log at a level matching the kind; internal errors carry stage and full source.
    pub fn log(&self) {
        match self {
            ScoreError::BadRequest(msg) => tracing::warn!(error = %msg, "bad request"),
            ScoreError::NotFound(msg) => tracing::info!(error = %msg, "not found"),
            ScoreError::Internal { stage, source } => {
                tracing::error!(stage = %stage, error = %source, detail = ?source, "request failed")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
}

/// A panic caught at the orchestrator boundary. `origin` names the model or stage.
#[derive(Debug, Error)]
#[error("panic in {origin}: {message}")]
pub struct PanicError {
    pub origin: String,
    pub message: String,
}

impl PanicError {
    pub fn from_payload(origin: &str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self {
            origin: origin.to_string(),
            message,
        }
    }
}

/// Failures while assembling the scorer at process start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("record store: {0}")]
    Store(#[from] StoreError),
    #[error("model: {0}")]
    Model(#[from] ModelError),
}
