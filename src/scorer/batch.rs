//! Concurrent scoring of ndjson request lines against one shared scorer.

use super::{ScoreRequest, ScoreResponse, Scorer};
use crate::error::{ScoreError, Stage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

pub const MALFORMED_REQUEST: &str = "Malformed request";

/// One output line: the 1-based input line number and its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchLine {
    pub line: usize,
    #[serde(flatten)]
    pub response: ScoreResponse,
}

enum Job {
    Done(ScoreResponse),
    Running(JoinHandle<ScoreResponse>),
}

/// Score every non-blank line of `input`. Requests run concurrently on the blocking
/// pool; results come back in input order.
pub async fn score_batch(scorer: Arc<Scorer>, input: &str) -> Vec<BatchLine> {
    let mut jobs = Vec::new();
    for (i, raw) in input.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let line = i + 1;
        let job = match serde_json::from_str::<ScoreRequest>(raw) {
            Ok(request) => {
                let scorer = Arc::clone(&scorer);
                Job::Running(tokio::task::spawn_blocking(move || {
                    ScoreResponse::from(scorer.score(&request))
                }))
            }
            Err(e) => {
                warn!(line, error = %e, "malformed request line");
                Job::Done(ScoreResponse::from(Err(ScoreError::BadRequest(
                    MALFORMED_REQUEST.to_string(),
                ))))
            }
        };
        jobs.push((line, job));
    }

    let mut out = Vec::with_capacity(jobs.len());
    for (line, job) in jobs {
        let response = match job {
            Job::Done(response) => response,
            Job::Running(handle) => match handle.await {
                Ok(response) => response,
                Err(e) => {
                    let err = ScoreError::internal(Stage::Responding, e);
                    err.log();
                    ScoreResponse::from(Err(err))
                }
            },
        };
        out.push(BatchLine { line, response });
    }
    out
}
