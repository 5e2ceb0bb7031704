//! Integration test: request → fetch → aggregate → predict → fuse, with mock models.

use serde_json::{json, Value};
use stability_scorer::{
    error::{ErrorKind, ScoreError, Stage, INTERNAL_ERROR_MESSAGE},
    features::{spec, FeatureSpec, RecordWindow},
    model::{ModelError, ProbabilityConvention, RiskModel, RiskPredictor},
    records::{InMemoryRecordStore, LogRecord, RecordStore, StoreError, UserLogSet},
    scorer::{score_batch, ResponseBody, ScoreRequest, ScoreResponse, Scorer, INSUFFICIENT_DATA, NO_USER_DATA},
};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Returns fixed class probabilities and remembers the last input row.
struct MockModel {
    name: &'static str,
    width: usize,
    probs: Vec<f64>,
    seen: Mutex<Vec<f64>>,
}

impl MockModel {
    fn new(name: &'static str, width: usize, probs: Vec<f64>) -> Arc<Self> {
        Arc::new(Self {
            name,
            width,
            probs,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn last_input(&self) -> Vec<f64> {
        self.seen.lock().unwrap().clone()
    }
}

impl RiskModel for MockModel {
    fn name(&self) -> &str {
        self.name
    }
    fn expected_feature_count(&self) -> usize {
        self.width
    }
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        *self.seen.lock().unwrap() = features.to_vec();
        Ok(self.probs.clone())
    }
}

struct FailingModel {
    width: usize,
    panic: bool,
}

impl RiskModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }
    fn expected_feature_count(&self) -> usize {
        self.width
    }
    fn predict_proba(&self, _features: &[f64]) -> Result<Vec<f64>, ModelError> {
        if self.panic {
            panic!("onnx runtime crashed");
        }
        Err(ModelError::Inference {
            model: "failing".into(),
            reason: "tensor shape [1, 3] does not match".into(),
        })
    }
}

struct BrokenStore;

impl RecordStore for BrokenStore {
    fn fetch(&self, _user_id: &str) -> Result<Option<UserLogSet>, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

struct PanickingStore;

impl RecordStore for PanickingStore {
    fn fetch(&self, _user_id: &str) -> Result<Option<UserLogSet>, StoreError> {
        panic!("driver bug");
    }
}

fn full_record(systolic: Value, heart_rate: Value) -> LogRecord {
    LogRecord::new()
        .with(spec::SYSTOLIC_BP, systolic)
        .with(spec::DIASTOLIC_BP, 80)
        .with(spec::HEART_RATE, heart_rate)
        .with(spec::GLUCOSE, 95)
        .with(spec::PHYSICAL_ACTIVITY, 150)
        .with(spec::SLEEP_QUALITY, 7)
        .with(spec::STRESS_LEVEL, 4)
        .with(spec::AGE, 52)
        .with(spec::SMOKING, 0)
        .with(spec::ALCOHOL, 100)
        .with(spec::PREVIOUS_HYPERTENSIVE_EPISODES, 1)
        .with(spec::COMORBIDITY_COUNT, 2)
}

fn store() -> Arc<InMemoryRecordStore> {
    let store = InMemoryRecordStore::new();
    store.insert(
        "u1",
        vec![full_record(json!(120), json!(70)), full_record(json!(130), Value::Null)],
    );
    store.insert("empty", Vec::new());
    store.insert(
        "sparse",
        vec![LogRecord::new().with(spec::SYSTOLIC_BP, 120)],
    );
    Arc::new(store)
}

struct Fixture {
    hf: Arc<MockModel>,
    db: Arc<MockModel>,
    scorer: Scorer,
}

fn fixture(store: Arc<dyn RecordStore>) -> Fixture {
    let hf = MockModel::new("heart_failure", 12, vec![0.9, 0.1]);
    let db = MockModel::new("diabetes", 9, vec![0.3, 0.25, 0.25, 0.2]);
    let scorer = Scorer::new(
        store,
        RiskPredictor::new(FeatureSpec::heart_failure(), hf.clone(), ProbabilityConvention::default()).unwrap(),
        RiskPredictor::new(FeatureSpec::diabetes(), db.clone(), ProbabilityConvention::MaxClass).unwrap(),
    );
    Fixture { hf, db, scorer }
}

fn scorer_with_heart_failure_model(model: Arc<dyn RiskModel>) -> Scorer {
    let db = MockModel::new("diabetes", 9, vec![0.5, 0.5]);
    Scorer::new(
        store(),
        RiskPredictor::new(FeatureSpec::heart_failure(), model, ProbabilityConvention::default()).unwrap(),
        RiskPredictor::new(FeatureSpec::diabetes(), db, ProbabilityConvention::MaxClass).unwrap(),
    )
}

#[test]
fn two_record_user_scores_end_to_end() {
    let f = fixture(store());
    let result = f.scorer.score(&ScoreRequest::new("u1", 27.5)).unwrap();

    let hf_input = f.hf.last_input();
    let hf_spec = FeatureSpec::heart_failure();
    assert_eq!(hf_input.len(), 12);
    assert_eq!(hf_input[hf_spec.position(spec::HEART_RATE).unwrap()], 70.0);
    assert_eq!(hf_input[hf_spec.position(spec::SYSTOLIC_BP).unwrap()], 125.0);
    assert_eq!(hf_input[hf_spec.position(spec::BMI).unwrap()], 27.5);

    let db_input = f.db.last_input();
    assert_eq!(db_input.len(), 9);
    assert_eq!(db_input[0], 27.5);

    assert_eq!(result.heart_failure_risk_prob, 0.1);
    assert_eq!(result.diabetes_risk_prob, 0.3);
    assert_eq!(result.stability_score, 80.0);
}

#[test]
fn parallel_and_sequential_inference_agree() {
    let sequential = fixture(store()).scorer;
    let parallel = fixture(store()).scorer.with_parallel_inference(true);
    let request = ScoreRequest::new("u1", 27.5);
    assert_eq!(sequential.score(&request).unwrap(), parallel.score(&request).unwrap());
}

#[test]
fn unknown_and_empty_users_are_not_found() {
    let f = fixture(store());
    for user in ["nobody", "empty"] {
        let err = f.scorer.score(&ScoreRequest::new(user, 22.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.body().error, NO_USER_DATA);
    }
}

#[test]
fn missing_input_is_a_bad_request() {
    let f = fixture(store());
    let request: ScoreRequest = serde_json::from_value(json!({"user_id": "u1"})).unwrap();
    let response = ScoreResponse::from(f.scorer.score(&request));
    assert_eq!(response.status, 400);
}

#[test]
fn insufficient_data_is_a_bad_request() {
    let f = fixture(store());
    let err = f.scorer.score(&ScoreRequest::new("sparse", 22.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.body().error, INSUFFICIENT_DATA);
}

#[test]
fn store_failure_is_internal_without_detail() {
    let f = fixture(Arc::new(BrokenStore));
    let err = f.scorer.score(&ScoreRequest::new("u1", 22.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.body().error, INTERNAL_ERROR_MESSAGE);
    assert!(err.to_string().contains("connection refused"));
}

#[test]
fn store_panic_is_internal() {
    let f = fixture(Arc::new(PanickingStore));
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        f.scorer.score(&ScoreRequest::new("u1", 22.0))
    }));
    let err = outcome.expect("panic escaped the scorer").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.body().error, INTERNAL_ERROR_MESSAGE);
    assert!(matches!(err, ScoreError::Internal { stage: Stage::Fetching, .. }));
    assert!(err.to_string().contains("driver bug"));
}

#[test]
fn store_panic_in_batch_is_a_500_line() {
    let scorer = Arc::new(fixture(Arc::new(PanickingStore)).scorer);
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().unwrap();
    let lines = runtime.block_on(score_batch(scorer, r#"{"user_id": "u1", "bmi": 22}"#));
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].response.status, 500);
}

#[test]
fn model_failure_is_internal() {
    let scorer = scorer_with_heart_failure_model(Arc::new(FailingModel { width: 12, panic: false }));
    let err = scorer.score(&ScoreRequest::new("u1", 22.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(err.body().error, INTERNAL_ERROR_MESSAGE);
}

#[test]
fn model_panic_is_contained_in_both_modes() {
    for parallel in [false, true] {
        let scorer = scorer_with_heart_failure_model(Arc::new(FailingModel { width: 12, panic: true }))
            .with_parallel_inference(parallel);
        let err = scorer.score(&ScoreRequest::new("u1", 22.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("onnx runtime crashed"));
    }
}

#[test]
fn window_limits_aggregated_records() {
    let store = InMemoryRecordStore::new();
    let day = |d: u32| chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2024, 1, d, 0, 0, 0).unwrap();
    store.insert(
        "w",
        vec![
            full_record(json!(200), json!(90)).logged_at(day(1)),
            full_record(json!(120), json!(60)).logged_at(day(2)),
            full_record(json!(130), json!(70)).logged_at(day(3)),
        ],
    );
    let f = fixture(Arc::new(store));
    let scorer = f.scorer.with_window(RecordWindow::new(NonZeroUsize::new(2)));
    scorer.score(&ScoreRequest::new("w", 25.0)).unwrap();

    let input = f.hf.last_input();
    let hf_spec = FeatureSpec::heart_failure();
    assert_eq!(input[hf_spec.position(spec::SYSTOLIC_BP).unwrap()], 125.0);
    assert_eq!(input[hf_spec.position(spec::HEART_RATE).unwrap()], 65.0);
}

#[test]
fn concurrent_requests_share_one_scorer() {
    let scorer = Arc::new(fixture(store()).scorer.with_parallel_inference(true));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let scorer = Arc::clone(&scorer);
            std::thread::spawn(move || scorer.score(&ScoreRequest::new("u1", 20.0 + i as f64)))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap().unwrap().stability_score, 80.0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batch_preserves_input_order() {
    let scorer = Arc::new(fixture(store()).scorer);
    let input = [
        r#"{"user_id": "u1", "bmi": 27.5}"#,
        "",
        r#"{"userId": "nobody", "bmi": 22}"#,
        "not json",
        r#"{"user_id": "u1"}"#,
    ]
    .join("\n");

    let lines = score_batch(scorer, &input).await;
    let summary: Vec<(usize, u16)> = lines.iter().map(|l| (l.line, l.response.status)).collect();
    assert_eq!(summary, vec![(1, 200), (3, 404), (4, 400), (5, 400)]);
    match &lines[0].response.body {
        ResponseBody::Success(r) => assert_eq!(r.stability_score, 80.0),
        other => panic!("expected success, got {:?}", other),
    }

    let json = serde_json::to_value(&lines[1]).unwrap();
    assert_eq!(json, json!({"line": 3, "status": 404, "body": {"error": NO_USER_DATA, "status": 404}}));
}
