//! Stability scorer entrypoint. Loads both risk models and the record store once,
//! then scores a single request or a batch of ndjson requests from a file or stdin.
//! Responses go to stdout as JSON lines; logs go to stderr.

use clap::{Parser, Subcommand};
use serde_json::Value;
use stability_scorer::{
    config::ScorerConfig,
    logging::StructuredLogger,
    scorer::{score_batch, ScoreRequest, ScoreResponse, Scorer},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "stability-scorer",
    version,
    about = "Scores user stability from health logs and two risk models",
    long_about = "Loads the heart-failure and diabetes models and the record store named in\n\
        the config (STABILITY_CONFIG_PATH, default config.json), then scores requests.\n\
        Responses are written to stdout as JSON lines; logs go to stderr."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score one user
    Score {
        user_id: String,
        /// Body-mass index supplied by the caller
        bmi: String,
    },
    /// Score ndjson requests (`{"user_id": .., "bmi": ..}` per line)
    Batch {
        /// Input file; stdin when omitted or `-`
        input: Option<PathBuf>,
    },
}

async fn read_input(input: Option<PathBuf>) -> std::io::Result<String> {
    match input.filter(|p| p.as_os_str() != "-") {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            Ok(buf)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let config_path = std::env::var("STABILITY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = ScorerConfig::load(&config_path)?;

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(config = %config_path.display(), "stability scorer starting");
    let scorer = Arc::new(Scorer::from_config(&config)?);

    let stdout = std::io::stdout();
    match cli.command {
        Command::Score { user_id, bmi } => {
            let request = ScoreRequest {
                user_id: Some(user_id),
                bmi: Some(Value::String(bmi)),
            };
            let response = ScoreResponse::from(scorer.score(&request));
            StructuredLogger::emit_json(&response, &mut stdout.lock())?;
        }
        Command::Batch { input } => {
            let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
            let lines = runtime.block_on(async {
                let input = read_input(input).await?;
                Ok::<_, std::io::Error>(score_batch(Arc::clone(&scorer), &input).await)
            })?;
            let mut out = stdout.lock();
            for line in &lines {
                StructuredLogger::emit_json(line, &mut out)?;
            }
            info!(requests = lines.len(), "batch complete");
        }
    }

    Ok(())
}
