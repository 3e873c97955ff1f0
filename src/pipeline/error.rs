//! Stage failure taxonomy.

use std::fmt;
use thiserror::Error;

/// The pipeline stage a failure is attributed to.
///
/// Preprocessing problems are attributed to `Transcription`; record-store
/// and artifact-storage problems are folded into `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Transcription,
    Summarization,
    Dispatch,
    Internal,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Transcription => "transcription",
            StageKind::Summarization => "summarization",
            StageKind::Dispatch => "dispatch",
            StageKind::Internal => "pipeline",
        };
        f.write_str(name)
    }
}

/// A stage failure. Aborts all remaining stages of the attempt and becomes
/// the record's terminal error state; partial upstream success is never
/// surfaced.
#[derive(Debug, Error)]
#[error("{stage} failed: {message}")]
pub struct StageError {
    pub stage: StageKind,
    pub message: String,
}

impl StageError {
    pub fn new(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    pub fn from_source(stage: StageKind, err: anyhow::Error) -> Self {
        Self {
            stage,
            message: format!("{err:#}"),
        }
    }
}
