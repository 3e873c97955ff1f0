//! Audio preprocessing before transcription.
//!
//! FFmpeg-based acceleration and compression: the recording is sped up by a
//! fixed 1.4x and re-encoded to 64 kbps MP3, which cuts transcription time
//! and upload size. The transform is lossy and irreversible.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

/// Fixed playback-speed acceleration applied before transcription.
const SPEED_FACTOR: &str = "1.4";

/// Target bitrate for the re-encoded audio.
const BITRATE: &str = "64k";

/// A preprocessed audio artifact in a temporary location.
///
/// The backing directory is removed when this guard drops, so the compact
/// audio never outlives the transcription call that consumes it.
pub struct PreparedAudio {
    path: PathBuf,
    _dir: TempDir,
}

impl PreparedAudio {
    pub fn new(dir: TempDir, path: PathBuf) -> Self {
        Self { path, _dir: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Normalizes raw audio into a compact form for the transcription provider.
#[async_trait]
pub trait Preprocessor: Send + Sync {
    async fn prepare(&self, input: &Path) -> Result<PreparedAudio>;
}

pub struct FfmpegPreprocessor;

impl FfmpegPreprocessor {
    pub fn new() -> Self {
        Self
    }

    async fn check_ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Preprocessor for FfmpegPreprocessor {
    async fn prepare(&self, input: &Path) -> Result<PreparedAudio> {
        if !Self::check_ffmpeg_available().await {
            bail!(
                "FFmpeg is required to preprocess audio but was not found.\n\
                 Install FFmpeg:\n\
                 - macOS: brew install ffmpeg\n\
                 - Ubuntu/Debian: sudo apt install ffmpeg\n\
                 - Arch: sudo pacman -S ffmpeg"
            );
        }

        let dir = TempDir::new().context("Failed to create temp directory for audio")?;
        let output = dir.path().join("processed_audio.mp3");

        debug!("Preprocessing audio {:?} -> {:?}", input, output);

        // -vn: audio only
        // -filter:a atempo: fixed playback-speed acceleration
        // -codec:a libmp3lame -b:a: compressed low-bitrate MP3
        // -y: overwrite without asking
        let result = Command::new("ffmpeg")
            .args(["-i"])
            .arg(input)
            .args(["-vn"])
            .arg("-filter:a")
            .arg(format!("atempo={SPEED_FACTOR}"))
            .args(["-codec:a", "libmp3lame"])
            .args(["-b:a", BITRATE])
            .args(["-y"])
            .arg(&output)
            .output()
            .await
            .context("Failed to run FFmpeg")?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            bail!("FFmpeg preprocessing failed: {}", stderr);
        }

        if !output.exists() {
            bail!("FFmpeg did not produce output file");
        }

        Ok(PreparedAudio::new(dir, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_missing_input_fails() {
        if !FfmpegPreprocessor::check_ffmpeg_available().await {
            return;
        }

        let result = FfmpegPreprocessor::new()
            .prepare(Path::new("/nonexistent/audio.wav"))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_prepared_audio_cleans_up_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("processed_audio.mp3");
        std::fs::write(&path, b"fake audio").unwrap();

        let dir_path = dir.path().to_path_buf();
        let prepared = PreparedAudio::new(dir, path);
        assert!(prepared.path().exists());

        drop(prepared);
        assert!(!dir_path.exists());
    }
}
