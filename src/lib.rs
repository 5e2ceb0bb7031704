//! Stability scorer: per-user health log aggregation and risk fusion.
//!
//! Modular structure:
//! - [`records`]: Log records and record stores (memory, encrypted SQLite, REST)
//! - [`features`]: Coercion, mean imputation and per-model feature aggregation
//! - [`model`]: Risk classifiers (ONNX, linear) behind one probability interface
//! - [`risk`]: Fusion of two risk probabilities into the stability score
//! - [`scorer`]: Request orchestration and error mapping
//! - [`logging`]: Structured JSON logging

pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod records;
pub mod risk;
pub mod scorer;

pub use config::ScorerConfig;
pub use error::{ErrorKind, ScoreError};
pub use features::{aggregate, FeatureSpec, FeatureVector};
pub use logging::StructuredLogger;
pub use model::{RiskModel, RiskPredictor};
pub use records::{LogRecord, RecordStore, UserLogSet};
pub use risk::{fuse, PredictionResult};
pub use scorer::{ScoreRequest, ScoreResponse, Scorer};
