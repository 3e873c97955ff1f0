use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{TranscriptionOutcome, Transcriber};
use crate::config::TranscriptionConfig;

const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com/v2";

/// Response from the upload endpoint
#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

/// Request body for creating a transcript
#[derive(Debug, Serialize)]
struct TranscriptRequest {
    audio_url: String,
}

/// Response from transcript creation and polling
#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: TranscriptStatus,
    text: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct AssemblyAiTranscriber {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AssemblyAiTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("api_key is required for the AssemblyAI transcriber")?;
        let base_url = config
            .api_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        info!(
            "Initialized AssemblyAI transcriber with base URL: {}",
            base_url
        );

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        })
    }

    /// Upload the audio file to AssemblyAI and get a URL
    async fn upload_audio(&self, audio_path: &Path) -> Result<String> {
        let upload_url = format!("{}/upload", self.base_url);

        debug!("Uploading audio file to AssemblyAI: {:?}", audio_path);

        let audio_data = tokio::fs::read(audio_path)
            .await
            .context("Failed to read audio file")?;

        let response = self
            .client
            .post(&upload_url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(audio_data)
            .send()
            .await
            .context("Failed to upload audio to AssemblyAI")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read upload response body")?;

        if !status.is_success() {
            error!(
                "AssemblyAI upload failed with status {}: {}",
                status, response_text
            );
            return Err(anyhow::anyhow!(
                "AssemblyAI upload failed with status {}: {}",
                status,
                response_text
            ));
        }

        let upload_response: UploadResponse =
            serde_json::from_str(&response_text).context("Failed to parse upload response")?;

        debug!(
            "Audio uploaded successfully: {}",
            upload_response.upload_url
        );
        Ok(upload_response.upload_url)
    }

    /// Submit the transcription request
    async fn submit_transcription(&self, audio_url: String) -> Result<String> {
        let transcript_url = format!("{}/transcript", self.base_url);

        debug!("Submitting transcription request to AssemblyAI");

        let response = self
            .client
            .post(&transcript_url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&TranscriptRequest { audio_url })
            .send()
            .await
            .context("Failed to submit transcription request")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read transcription response body")?;

        if !status.is_success() {
            error!(
                "AssemblyAI transcription request failed with status {}: {}",
                status, response_text
            );

            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&response_text) {
                return Err(anyhow::anyhow!(
                    "AssemblyAI API error: {}",
                    error_response.error
                ));
            }

            return Err(anyhow::anyhow!(
                "AssemblyAI transcription request failed with status {}: {}",
                status,
                response_text
            ));
        }

        let transcript_response: TranscriptResponse = serde_json::from_str(&response_text)
            .context("Failed to parse transcription response")?;

        debug!(
            "Transcription submitted with ID: {}",
            transcript_response.id
        );
        Ok(transcript_response.id)
    }

    /// Poll until the transcript reaches a terminal status
    async fn poll_transcription(&self, transcript_id: &str) -> Result<TranscriptionOutcome> {
        let poll_url = format!("{}/transcript/{}", self.base_url, transcript_id);
        let poll_interval = Duration::from_secs(3);
        let max_attempts = 120; // 6 minutes max

        for attempt in 1..=max_attempts {
            debug!(
                "Polling transcription status (attempt {}/{}): {}",
                attempt, max_attempts, transcript_id
            );

            let response = self
                .client
                .get(&poll_url)
                .header("Authorization", &self.api_key)
                .send()
                .await
                .context("Failed to poll transcription status")?;

            let status = response.status();
            let response_text = response
                .text()
                .await
                .context("Failed to read poll response body")?;

            if !status.is_success() {
                error!(
                    "AssemblyAI poll request failed with status {}: {}",
                    status, response_text
                );
                return Err(anyhow::anyhow!(
                    "AssemblyAI poll request failed with status {}: {}",
                    status,
                    response_text
                ));
            }

            let transcript_response: TranscriptResponse =
                serde_json::from_str(&response_text).context("Failed to parse poll response")?;

            match transcript_response.status {
                TranscriptStatus::Completed => {
                    let text = transcript_response
                        .text
                        .unwrap_or_default()
                        .trim()
                        .to_string();
                    info!("Transcription complete: {} chars", text.len());
                    return Ok(TranscriptionOutcome::Completed { text });
                }
                TranscriptStatus::Error => {
                    let detail = transcript_response.error;
                    error!(
                        "Transcription failed: {}",
                        detail.as_deref().unwrap_or("no detail")
                    );
                    return Ok(TranscriptionOutcome::Error { detail });
                }
                TranscriptStatus::Queued | TranscriptStatus::Processing => {
                    debug!("Transcription still processing, waiting...");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }

        Err(anyhow::anyhow!(
            "Transcription timed out after {} attempts",
            max_attempts
        ))
    }
}

#[async_trait]
impl Transcriber for AssemblyAiTranscriber {
    async fn submit(&self, audio_path: &Path) -> Result<TranscriptionOutcome> {
        info!(
            "Transcribing audio file via AssemblyAI API: {:?}",
            audio_path
        );

        let audio_url = self.upload_audio(audio_path).await?;
        let transcript_id = self.submit_transcription(audio_url).await?;
        self.poll_transcription(&transcript_id).await
    }
}
