//! Risk fusion into the stability score.

mod fusion;

pub use fusion::{fuse, round_to, PredictionResult};
