use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{build_summary_prompt, Summarizer};
use crate::config::SummarizationConfig;

const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiSummarizer {
    http: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiSummarizer {
    pub fn new(config: &SummarizationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("api_key is required for the Gemini summarizer")?;

        let endpoint = config
            .api_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_GEMINI_ENDPOINT)
            .trim_end_matches('/')
            .to_string();

        info!(
            "Initialized Gemini summarizer with model {} at {}",
            config.model, endpoint
        );

        Ok(Self {
            http: Client::new(),
            api_key,
            model: config.model.clone(),
            endpoint,
        })
    }

    fn request_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, transcript: &str, meet_link: &str) -> Result<String> {
        let prompt = build_summary_prompt(transcript, meet_link);

        debug!("Requesting summary from Gemini ({} chars)", prompt.len());

        let body = GenerateContentRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.request_url())
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let response = response
            .error_for_status()
            .context("Gemini returned an error status")?;

        let payload: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let summary = payload
            .candidates
            .iter()
            .flat_map(|c| c.content.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string)
            .context("Gemini response did not contain summary text")?;

        info!("Summary generated: {} chars", summary.len());
        Ok(summary)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContentResponse,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}
