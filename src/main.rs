//! feedsum binary: parse configuration, wire the collaborators together and
//! run one update pass over every configured feed.
//!
//! Exit code 0 means the run completed, even if some feeds failed (their
//! failures are logged).  Exit code 1 means the run could not start or the
//! driver itself failed.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, info};

use feedsum::config::{self, Config};
use feedsum::pipeline::{RunReport, UpdatePipeline};
use feedsum::source::RssSource;
use feedsum::store::JsonFileStore;
use feedsum::summarize::{OpenAiSummarizer, SummarizationOrchestrator};
use feedsum::throttle::{RequestScheduler, TokenBudgetGuard};

#[tokio::main]
async fn main() -> ExitCode {
    // .env first, so RUST_LOG may come from it
    let filter = config::load_environment(None);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // -- configuration -------------------------------------------------------

    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(report) => {
            info!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<RunReport> {
    config.validate().context("invalid configuration")?;
    let feeds = config.feeds();

    info!(
        feeds = feeds.len(),
        data_dir = %config.data_dir.display(),
        model = %config.model,
        "starting update run"
    );

    // -- collaborators -------------------------------------------------------
    let source = RssSource::new().context("building feed HTTP client")?;
    let store = JsonFileStore::new(&config.data_dir);
    let summarizer = OpenAiSummarizer::new(config.summarizer_settings())
        .context("building summary HTTP client")?;

    // -- throttling stack (one per process) ---------------------------------
    let orchestrator = SummarizationOrchestrator::new(
        Arc::new(summarizer),
        Arc::new(RequestScheduler::new(config.scheduler_limits())),
        Arc::new(TokenBudgetGuard::new(config.tokens_per_minute)),
        config.retry_policy(),
    );

    let pipeline = UpdatePipeline::new(
        Arc::new(source),
        Arc::new(store),
        orchestrator,
        config.max_items,
    );

    Ok(pipeline.run(&feeds).await)
}
