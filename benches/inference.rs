//! Inference benchmark: feature vector → class probabilities → risk probability.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stability_scorer::features::{FeatureSpec, FeatureVector};
use stability_scorer::model::{
    predict_positive_class_probability, LinearClassifier, LinearParams, ProbabilityConvention, StandardScaler,
};

fn linear_model(spec: &FeatureSpec, classes: usize) -> LinearClassifier {
    let width = spec.len();
    let rows = if classes == 2 { 1 } else { classes };
    let params = LinearParams {
        feature_names: spec.field_names().map(String::from).collect(),
        coefficients: (0..rows)
            .map(|r| (0..width).map(|i| ((i + r) as f64 * 0.37).sin() * 0.1).collect())
            .collect(),
        intercepts: vec![-0.5; rows],
        scaler: Some(StandardScaler {
            mean: vec![50.0; width],
            scale: vec![20.0; width],
        }),
    };
    LinearClassifier::new(spec.name(), params).unwrap()
}

fn features(spec: &FeatureSpec) -> FeatureVector {
    FeatureVector::new(spec.name(), (0..spec.len()).map(|i| 40.0 + i as f64 * 7.5).collect())
}

fn bench_binary_positive_class(c: &mut Criterion) {
    let spec = FeatureSpec::heart_failure();
    let model = linear_model(&spec, 2);
    let fv = features(&spec);
    let convention = ProbabilityConvention::default();

    c.bench_function("linear_heart_failure_positive_class", |b| {
        b.iter(|| predict_positive_class_probability(&model, convention, black_box(&fv)).unwrap())
    });
}

fn bench_multiclass_max_class(c: &mut Criterion) {
    let spec = FeatureSpec::diabetes();
    let fv = features(&spec);

    let mut g = c.benchmark_group("linear_diabetes_max_class");
    for classes in [2, 3, 5] {
        let model = linear_model(&spec, classes);
        g.bench_function(format!("classes_{}", classes).as_str(), |b| {
            b.iter(|| predict_positive_class_probability(&model, ProbabilityConvention::MaxClass, black_box(&fv)).unwrap())
        });
    }
    g.finish();
}

criterion_group!(benches, bench_binary_positive_class, bench_multiclass_max_class);
criterion_main!(benches);
