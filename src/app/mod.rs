//! Service wiring: config → providers → pipeline → API server.

use crate::api::ApiServer;
use crate::audio::FfmpegPreprocessor;
use crate::config::Config;
use crate::db;
use crate::email::BrevoDispatcher;
use crate::global;
use crate::pipeline::{ArtifactStorage, Pipeline, RetryPolicy};
use crate::summarization::GeminiSummarizer;
use crate::transcription::AssemblyAiTranscriber;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub async fn run_service(config: Config) -> Result<()> {
    info!("Starting WrapUp service");

    // Missing provider credentials are fatal before any attempt is accepted.
    config
        .validate()
        .context("Invalid configuration, refusing to start")?;

    let data_dir = config.storage.resolve_data_dir()?;
    let storage = ArtifactStorage::new(&data_dir);
    storage.ensure_dirs()?;

    let db_path = global::db_file(&data_dir);
    db::open(&db_path).context("Failed to initialize database")?;

    let pipeline = Arc::new(Pipeline::new(
        db_path,
        storage,
        Arc::new(FfmpegPreprocessor::new()),
        Arc::new(AssemblyAiTranscriber::new(&config.transcription)?),
        Arc::new(GeminiSummarizer::new(&config.summarization)?),
        Arc::new(BrevoDispatcher::new(&config.email)?),
        RetryPolicy::from(&config.retry),
    ));

    info!("WrapUp is ready, data dir: {:?}", data_dir);

    let api_server = ApiServer::new(config.server.host.clone(), config.server.port, pipeline);
    api_server.start().await
}
