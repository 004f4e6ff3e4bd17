//! drive-describe: describe the media in a Google Drive folder.
//!
//! Lists a Drive folder by MIME type, keeps a local copy of every file,
//! mirrors it to Cloud Storage and asks a Gemini model on Vertex AI for a
//! description. Results land in a header-less CSV report.

#![warn(clippy::all)]

mod auth;
mod cli;
mod config;
mod describe;
mod drive;
mod pipeline;
mod storage;
mod types;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use describe::vertex::VertexClient;
use drive::{AssetSource, DriveClient};
use pipeline::{Pipeline, PipelineConfig, ReportWriter};
use storage::GcsMirror;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = config::Config::from_cli(cli)?;
    tracing::debug!(?config, "Configuration loaded");

    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;

    let session = auth::authenticate(
        &http,
        &config.client_secret_path,
        &config.token_file,
        &config.auth_mode,
    )
    .await?;

    let drive = Arc::new(DriveClient::new(session.clone()));
    let assets = drive
        .list_assets(&config.folder_id, &config.mime_types)
        .await
        .context("error occurred while listing files")?;
    tracing::info!("Files {}", assets.len());

    // Created before any task runs so an unwritable path fails fast.
    let report = ReportWriter::create(&config.output)?;

    let mirror = Arc::new(GcsMirror::new(session.clone()));
    let model = Arc::new(VertexClient::new(
        session,
        &config.project_id,
        &config.location,
        &config.model,
    ));

    let pipeline = Pipeline::new(PipelineConfig::from(&config), drive, mirror, model);
    pipeline.run(assets, report).await?;

    tracing::info!("CSV file written successfully.");
    Ok(())
}
