use anyhow::Result;
use chrono::Datelike;
use clap::Parser;
use std::net::SocketAddr;
use tracing::{error, info};

mod config;
mod dashboard;
mod data;
mod pipeline;

use config::{Command, Config, PipelineCommand, ServeArgs};
use dashboard::AppState;
use data::DataStore;
use pipeline::{plan, run_pipeline, PipelineError, ProcessExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    match &config.command {
        Command::Serve(args) => serve(&config, args).await,
        Command::Pipeline { action } => run_batch(action).await,
    }
}

async fn serve(config: &Config, args: &ServeArgs) -> Result<()> {
    let paths = config.data_paths();
    info!("Reading tables from {}", config.data_dir.display());
    for path in [
        &paths.predictions,
        &paths.player_stats,
        &paths.pitcher_stats,
        &paths.team_stats,
        &paths.live_odds,
    ] {
        if !path.exists() {
            info!("{} not present yet; it will be treated as empty", path.display());
        }
    }
    if args.cache_tables {
        info!("Table cache enabled (invalidated by file modification time)");
    }

    let state = AppState {
        store: DataStore::new(paths, args.cache_tables),
    };
    let app = dashboard::router(state);
    let addr: SocketAddr = args.addr.parse()?;
    info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_batch(action: &PipelineCommand) -> Result<()> {
    let args = action.args();
    let settings = args.settings(chrono::Local::now().year());
    let steps = plan(action.kind(), &settings);
    info!(
        "Starting {} pipeline for {} ({} steps, history {:?})",
        action.kind(),
        settings.year,
        steps.len(),
        settings.historic_seasons
    );

    let executor = ProcessExecutor::new(args.python.clone(), args.workdir.clone());
    match run_pipeline(&executor, &steps).await {
        Ok(report) => {
            for step in &report.completed {
                info!("  {:<20} {:>7.1}s", step.name, step.elapsed.as_secs_f64());
            }
            let total: f64 = report.completed.iter().map(|s| s.elapsed.as_secs_f64()).sum();
            info!(
                "MLB Betskies {} pipeline completed: {} steps in {:.1}s",
                action.kind(),
                report.completed.len(),
                total
            );
            Ok(())
        }
        Err(e) => {
            if let PipelineError::StepFailed { stdout, stderr, .. } = &e {
                error!("Failed step output:\nSTDOUT:\n{}\nSTDERR:\n{}", stdout, stderr);
            }
            Err(e.into())
        }
    }
}
