mod api;
mod cli;
mod config;
mod error;
mod events;
mod manifest;
mod orchestrator;
mod output;
mod poller;
mod report;
mod state_machine;
mod timer;
mod ui;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::{OcrClient, OcrService};
use cli::{Cli, Command};
use config::Config;
use events::TracingSink;
use manifest::Manifest;
use orchestrator::JobOrchestrator;
use timer::TokioTimer;
use ui::ConsoleProgress;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    match &cli.command {
        Command::Run {
            manifest,
            job_id,
            report,
            ..
        } => run_job(&config, manifest, job_id.clone(), report.as_deref()).await,
        Command::Status { job_id, file: None } => {
            let client = build_client(&config)?;
            let states = client
                .query_status(job_id)
                .await
                .with_context(|| format!("Failed to query status of job {job_id}"))?;
            println!("{}", ui::format_status(job_id, &states));
            Ok(())
        }
        Command::Status {
            job_id,
            file: Some(file_id),
        } => {
            let client = build_client(&config)?;
            let state = client
                .query_file_status(job_id, file_id)
                .await
                .with_context(|| format!("Failed to query status of job {job_id}"))?;
            match state {
                Some(state) => println!("{file_id}: {state}"),
                None => anyhow::bail!("Job {job_id} does not list file {file_id:?}"),
            }
            Ok(())
        }
        Command::Engines => {
            let client = build_client(&config)?;
            let engines = client
                .list_engines()
                .await
                .context("Failed to list engines")?;
            println!("{}", serde_json::to_string_pretty(&engines)?);
            Ok(())
        }
    }
}

async fn run_job(
    config: &Config,
    manifest_path: &Path,
    job_id: Option<String>,
    report_path: Option<&Path>,
) -> Result<()> {
    // Everything that can fail locally fails before the first request.
    let manifest = Manifest::load(manifest_path)
        .with_context(|| format!("Failed to load manifest {:?}", manifest_path))?;
    info!(
        manifest = %manifest_path.display(),
        files = manifest.file_ids.len(),
        output_dir = %config.output_dir.display(),
        "Manifest loaded"
    );
    let client = build_client(config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received Ctrl+C, stopping after the current step");
                ctrl_c.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C signal"),
        }
    });

    let manifest_name = manifest_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| manifest_path.display().to_string());
    let progress = ConsoleProgress::start(&manifest_name);
    let sink = (TracingSink, &progress);

    let timer = TokioTimer;
    let orchestrator = JobOrchestrator::new(&client, &timer, &sink, config, cancel);
    let result = orchestrator.run(&manifest, job_id).await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            progress.finish();
            return Err(e).context("Job did not start");
        }
    };
    progress.print_report(&report);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        info!(path = %path.display(), "Report written");
    }

    Ok(())
}

fn build_client(config: &Config) -> Result<OcrClient> {
    OcrClient::new(
        &config.server_url,
        config.api_key.clone(),
        config.request_timeout(),
    )
    .with_context(|| format!("Invalid server URL {:?}", config.server_url))
}
