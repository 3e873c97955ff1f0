//! Durable artifact storage.
//!
//! Three namespaces keyed by meeting id: raw uploads, transcripts and
//! summaries. Id-derived names keep concurrent attempts from overwriting
//! each other; only the extension of the original upload name is kept.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArtifactStorage {
    uploads_dir: PathBuf,
    transcripts_dir: PathBuf,
    summaries_dir: PathBuf,
}

impl ArtifactStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            uploads_dir: crate::global::uploads_dir(data_dir),
            transcripts_dir: crate::global::transcripts_dir(data_dir),
            summaries_dir: crate::global::summaries_dir(data_dir),
        }
    }

    /// Create all three namespaces. Called once at startup.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.uploads_dir, &self.transcripts_dir, &self.summaries_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create artifact directory {:?}", dir))?;
        }
        Ok(())
    }

    /// Persist the raw uploaded audio under an id-derived key.
    pub fn save_upload(
        &self,
        meeting_id: i64,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let extension = sanitized_extension(original_filename);
        let path = self
            .uploads_dir
            .join(format!("meeting_{meeting_id}.{extension}"));

        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to save uploaded audio to {:?}", path))?;

        Ok(path)
    }

    pub fn write_transcript(&self, meeting_id: i64, text: &str) -> Result<PathBuf> {
        let path = self
            .transcripts_dir
            .join(format!("meeting_{meeting_id}_transcript.txt"));

        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write transcript to {:?}", path))?;

        Ok(path)
    }

    pub fn write_summary(&self, meeting_id: i64, text: &str) -> Result<PathBuf> {
        let path = self
            .summaries_dir
            .join(format!("meeting_{meeting_id}_summary.txt"));

        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write summary to {:?}", path))?;

        Ok(path)
    }
}

fn sanitized_extension(filename: &str) -> String {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");

    if extension.chars().all(|c| c.is_ascii_alphanumeric()) && !extension.is_empty() {
        extension.to_ascii_lowercase()
    } else {
        "bin".to_string()
    }
}
