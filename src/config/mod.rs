use crate::global;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transcription: TranscriptionConfig,
    pub summarization: SummarizationConfig,
    pub email: EmailConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for uploads, transcripts, summaries and the database.
    /// Defaults to the platform data dir when unset.
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => global::data_dir(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationConfig {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub model: String,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_endpoint: None,
            model: "gemini-2.0-flash".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub sender_name: String,
    pub sender_email: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_endpoint: None,
            sender_name: "WrapUp".to_string(),
            sender_email: "summary@wrapup.ai".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total tries per external call, including the first.
    pub attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay_ms: u64,
    /// Upper bound on a single try of one external call.
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 2,
            base_delay_ms: 1000,
            timeout_seconds: 600,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&global::config_file()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Validate provider credentials. Fatal at startup: the service refuses
    /// to accept attempts it could never complete.
    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.transcription.api_key) {
            bail!("transcription.api_key is not set (AssemblyAI credentials required)");
        }
        if is_blank(&self.summarization.api_key) {
            bail!("summarization.api_key is not set (Gemini credentials required)");
        }
        if is_blank(&self.email.api_key) {
            bail!("email.api_key is not set (Brevo credentials required)");
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
