//! Transcription client seam.
//!
//! The provider reports a terminal outcome rather than mapping it itself:
//! the pipeline decides what completed-but-empty text means. Transport
//! problems (HTTP failures, unparseable bodies, polling exhaustion) come
//! back as `Err` and are eligible for the uniform retry policy.

mod assembly_api;

pub use assembly_api::AssemblyAiTranscriber;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Terminal result of one transcription submission.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionOutcome {
    /// The provider finished; `text` may be empty when no speech was found.
    Completed { text: String },
    /// The provider reported a failure of its own.
    Error { detail: Option<String> },
}

/// External capability converting audio to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn submit(&self, audio_path: &Path) -> Result<TranscriptionOutcome>;
}
