//! waveprint command-line interface
//!
//! `waveprint ingest <URL>` fingerprints every music track behind a URL
//! into the index; `waveprint match <FILE>` identifies an audio excerpt.
//! Both submit a job to the runner and poll it to completion, printing
//! the final status record as JSON.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use waveprint::services::job_runner::DEFAULT_WORKERS;
use waveprint::services::{JobRunner, YtDlpSource};
use waveprint::{db, Config};

#[derive(Parser, Debug)]
#[command(name = "waveprint")]
#[command(about = "Acoustic fingerprinting engine - ingest reference tracks, match excerpts")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fingerprint every music track behind a URL into the index
    Ingest {
        /// Track, album, or playlist URL
        url: String,
    },
    /// Identify an audio excerpt against the index
    Match {
        /// Path to an audio file (canonically PCM WAV)
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waveprint=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let pool = db::connect(&config.db_url, DEFAULT_WORKERS as u32).await?;
    info!("Connected to index");

    let download_dir = std::env::temp_dir().join("waveprint-downloads");
    let runner = JobRunner::new(
        pool,
        Arc::new(YtDlpSource::new(download_dir)),
        DEFAULT_WORKERS,
    );

    let job_id = match args.command {
        Command::Ingest { url } => {
            info!(url = %url, "Submitting ingest job");
            runner.submit_ingest(url).await
        }
        Command::Match { file } => {
            // The runner consumes (and deletes) its input, so hand it a
            // copy rather than the user's file.
            let temp_path = std::env::temp_dir().join(format!("{}.wav", Uuid::new_v4()));
            std::fs::copy(&file, &temp_path)?;
            info!(file = %file.display(), "Submitting match job");
            runner.submit_match(temp_path).await
        }
    };

    let record = wait_for_job(&runner, job_id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    Ok(())
}

/// Poll the runner until the job reaches a terminal state.
async fn wait_for_job(runner: &JobRunner, job_id: Uuid) -> Result<waveprint::models::JobRecord> {
    loop {
        let record = runner.get_status(job_id).await?;
        if record.is_terminal() {
            return Ok(record);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}
