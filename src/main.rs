//! Binary entrypoint: one-shot batch mode for cron-style deployments,
//! continuous mode with an interval floor for long-running ones.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_news_pipeline::config::{PipelineConfig, INTERVAL_FLOOR_SECS};
use ai_news_pipeline::pipeline::Pipeline;
use ai_news_pipeline::scheduler;
use ai_news_pipeline::store::RunStatus;

#[derive(Debug, Parser)]
#[command(name = "ai-news-pipeline", about = "Batch news ingestion and AI topic classification")]
struct Cli {
    /// Run exactly one batch and exit (0 on success, non-zero on a failed run).
    #[arg(long)]
    once: bool,

    /// Continuous-mode interval in seconds, floored at 900.
    #[arg(long)]
    interval_secs: Option<u64>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_news_pipeline=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = PipelineConfig::from_env();
    if let Some(secs) = cli.interval_secs {
        cfg.interval = Duration::from_secs(secs.max(INTERVAL_FLOOR_SECS));
    }

    let interval = cfg.interval;
    let mut pipeline = match Pipeline::new(cfg).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "pipeline startup failed");
            return ExitCode::FAILURE;
        }
    };

    if cli.once {
        return match pipeline.run_batch().await {
            Ok(record) if record.status == RunStatus::Failed => ExitCode::FAILURE,
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "batch errored");
                ExitCode::FAILURE
            }
        };
    }

    scheduler::run_forever(&mut pipeline, interval).await;
    ExitCode::SUCCESS
}
