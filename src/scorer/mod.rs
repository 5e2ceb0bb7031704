//! Request orchestration: validate → fetch → aggregate → predict → fuse → respond.
//!
//! Models and the record store are built once and shared; a [`Scorer`] holds no
//! per-request state and can serve any number of concurrent requests.

mod batch;
mod request;

pub use batch::{score_batch, BatchLine, MALFORMED_REQUEST};
pub use request::{ScoreRequest, ValidRequest, INVALID_BMI, MISSING_INPUT};

use crate::config::ScorerConfig;
use crate::error::{ErrorBody, PanicError, ScoreError, Stage, StartupError};
use crate::features::{aggregate, spec::BMI, stored_fields, AggregationError, Extras, FeatureSpec, FeatureVector, RecordWindow};
use crate::model::{load_predictor, ModelError, RiskPredictor};
use crate::records::{open_store, RecordStore};
use crate::risk::PredictionResult;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, field, info, info_span, warn, Span};
use uuid::Uuid;

pub const NO_USER_DATA: &str = "No user data found";
pub const INSUFFICIENT_DATA: &str = "Insufficient data for prediction";

pub struct Scorer {
    store: Arc<dyn RecordStore>,
    heart_failure: RiskPredictor,
    diabetes: RiskPredictor,
    window: RecordWindow,
    parallel_inference: bool,
}

impl Scorer {
    pub fn new(store: Arc<dyn RecordStore>, heart_failure: RiskPredictor, diabetes: RiskPredictor) -> Self {
        Self {
            store,
            heart_failure,
            diabetes,
            window: RecordWindow::unbounded(),
            parallel_inference: false,
        }
    }

    pub fn with_window(mut self, window: RecordWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_parallel_inference(mut self, enabled: bool) -> Self {
        self.parallel_inference = enabled;
        self
    }

    /// Load both models and open the record store described by `config`.
    pub fn from_config(config: &ScorerConfig) -> Result<Self, StartupError> {
        let heart_failure = load_predictor("heart_failure", &config.models.heart_failure, FeatureSpec::heart_failure())?;
        let diabetes = load_predictor("diabetes", &config.models.diabetes, FeatureSpec::diabetes())?;
        let fields = stored_fields(&[heart_failure.spec(), diabetes.spec()], &[BMI]);
        let store = open_store(&config.store, &fields)?;
        info!(
            heart_failure = ?heart_failure,
            diabetes = ?diabetes,
            window = ?config.features.window_records,
            "scorer ready"
        );
        Ok(Self::new(store, heart_failure, diabetes)
            .with_window(RecordWindow::new(config.features.window_records))
            .with_parallel_inference(config.scoring.parallel_inference))
    }

    /// Score one request. Failures are logged here, once, and returned classified.
    pub fn score(&self, request: &ScoreRequest) -> Result<PredictionResult, ScoreError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("score_request", %request_id, user_id = field::Empty);
        let _guard = span.enter();

        let stage = Cell::new(Stage::Validating);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(request, &span, &stage)))
            .unwrap_or_else(|payload| {
                let at = stage.get();
                Err(ScoreError::internal(at, PanicError::from_payload(&at.to_string(), payload)))
            });
        match &outcome {
            Ok(result) => info!(
                score = result.stability_score,
                heart_failure = result.heart_failure_risk_prob,
                diabetes = result.diabetes_risk_prob,
                "scored"
            ),
            Err(e) => e.log(),
        }
        outcome
    }

    /// Walks the stages in order; `stage` always holds the one in progress.
    fn run(&self, request: &ScoreRequest, span: &Span, stage: &Cell<Stage>) -> Result<PredictionResult, ScoreError> {
        stage.set(Stage::Validating);
        let request = request.validate()?;
        span.record("user_id", request.user_id.as_str());

        stage.set(Stage::Fetching);
        let logs = self
            .store
            .fetch(&request.user_id)
            .map_err(|e| ScoreError::internal(Stage::Fetching, e))?;
        let logs = match logs {
            Some(logs) if !logs.is_empty() => logs,
            _ => return Err(ScoreError::NotFound(NO_USER_DATA.to_string())),
        };

        stage.set(Stage::Aggregating);
        let fetched = logs.len();
        let records = self.window.apply(logs.records);
        debug!(fetched, aggregated = records.len(), "user logs fetched");
        let extras = Extras::from([(BMI.to_string(), request.bmi)]);
        let hf_features =
            aggregate(&records, &extras, self.heart_failure.spec()).map_err(insufficient)?;
        let db_features = aggregate(&records, &extras, self.diabetes.spec()).map_err(insufficient)?;

        stage.set(Stage::Predicting);
        let (hf, db) = self.predict(&hf_features, &db_features)?;

        stage.set(Stage::Fusing);
        let result = PredictionResult::from_probabilities(hf, db);
        stage.set(Stage::Responding);
        Ok(result)
    }

    fn predict(&self, hf_features: &FeatureVector, db_features: &FeatureVector) -> Result<(f64, f64), ScoreError> {
        if !self.parallel_inference {
            let hf = guarded(&self.heart_failure, hf_features)?;
            let db = guarded(&self.diabetes, db_features)?;
            return Ok((hf, db));
        }

        std::thread::scope(|s| -> Result<(f64, f64), ScoreError> {
            let span = Span::current();
            let hf = s.spawn(move || span.in_scope(|| guarded(&self.heart_failure, hf_features)));
            let db = guarded(&self.diabetes, db_features);
            let hf = hf.join().map_err(|payload| {
                ScoreError::internal(
                    Stage::Predicting,
                    PanicError::from_payload(self.heart_failure.name(), payload),
                )
            })?;
            Ok((hf?, db?))
        })
    }
}

fn insufficient(err: AggregationError) -> ScoreError {
    warn!(error = %err, "aggregation failed");
    ScoreError::BadRequest(INSUFFICIENT_DATA.to_string())
}

/// Run one inference; model errors and panics both become internal errors.
fn guarded(predictor: &RiskPredictor, features: &FeatureVector) -> Result<f64, ScoreError> {
    let outcome: Result<Result<f64, ModelError>, _> =
        panic::catch_unwind(AssertUnwindSafe(|| predictor.predict(features)));
    match outcome {
        Ok(Ok(p)) => {
            debug!(model = predictor.name(), probability = p, "inference done");
            Ok(p)
        }
        Ok(Err(e)) => Err(ScoreError::internal(Stage::Predicting, e)),
        Err(payload) => Err(ScoreError::internal(
            Stage::Predicting,
            PanicError::from_payload(predictor.name(), payload),
        )),
    }
}

/// Transport-neutral response: a status code plus either the result or an error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub status: u16,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Success(PredictionResult),
    Failure(ErrorBody),
}

impl From<Result<PredictionResult, ScoreError>> for ScoreResponse {
    fn from(outcome: Result<PredictionResult, ScoreError>) -> Self {
        match outcome {
            Ok(result) => Self {
                status: 200,
                body: ResponseBody::Success(result),
            },
            Err(e) => {
                let body = e.body();
                Self {
                    status: body.status,
                    body: ResponseBody::Failure(body),
                }
            }
        }
    }
}
