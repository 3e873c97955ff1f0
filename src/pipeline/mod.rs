//! The per-meeting processing pipeline.
//!
//! Single entry point for one attempt: persist the upload, preprocess,
//! transcribe, summarize, dispatch, and record the terminal outcome.
//! Stages run strictly sequentially; distinct attempts may run concurrently
//! and own disjoint id-derived artifacts.

mod error;
mod retry;
mod storage;

pub use error::{StageError, StageKind};
pub use retry::RetryPolicy;
pub use storage::ArtifactStorage;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::audio::Preprocessor;
use crate::db::{self, meetings::MeetingRepository};
use crate::email::Dispatcher;
use crate::summarization::Summarizer;
use crate::transcription::{Transcriber, TranscriptionOutcome};

/// Transcript text substituted when transcription completes without speech.
/// A silent recording is a successful attempt, not a failure.
pub const NO_SPEECH_SENTINEL: &str = "(No speech detected in audio)";

/// Success payload returned to the caller.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub meeting_id: i64,
    pub summary_path: PathBuf,
    pub transcript_path: PathBuf,
}

pub struct Pipeline {
    db_path: PathBuf,
    storage: ArtifactStorage,
    preprocessor: Arc<dyn Preprocessor>,
    transcriber: Arc<dyn Transcriber>,
    summarizer: Arc<dyn Summarizer>,
    dispatcher: Arc<dyn Dispatcher>,
    retry: RetryPolicy,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_path: PathBuf,
        storage: ArtifactStorage,
        preprocessor: Arc<dyn Preprocessor>,
        transcriber: Arc<dyn Transcriber>,
        summarizer: Arc<dyn Summarizer>,
        dispatcher: Arc<dyn Dispatcher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db_path,
            storage,
            preprocessor,
            transcriber,
            summarizer,
            dispatcher,
            retry,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Process one recorded meeting end to end.
    ///
    /// Always creates a fresh record: identical inputs produce independent
    /// attempts. The record reaches exactly one terminal state before this
    /// returns, success or failure.
    pub async fn process(
        &self,
        audio: Vec<u8>,
        filename: &str,
        meet_link: &str,
        user_email: &str,
    ) -> Result<PipelineOutput, StageError> {
        let start_time = now_rfc3339();
        info!(
            "Processing meeting: link={}, recipient={}, file={}",
            meet_link, user_email, filename
        );

        let meeting_id = {
            let (meet_link, user_email) = (meet_link.to_string(), user_email.to_string());
            self.with_store(move |conn| {
                MeetingRepository::insert(conn, &meet_link, &user_email, &start_time)
            })
            .await
            .map_err(|e| StageError::from_source(StageKind::Internal, e))?
        };

        let result = self
            .run_stages(meeting_id, audio, filename, meet_link, user_email)
            .await;

        self.record_terminal(meeting_id, &result).await;

        match &result {
            Ok(_) => info!("Meeting {} processed successfully", meeting_id),
            Err(e) => error!("Meeting {} failed: {}", meeting_id, e),
        }

        result
    }

    async fn run_stages(
        &self,
        meeting_id: i64,
        audio: Vec<u8>,
        filename: &str,
        meet_link: &str,
        user_email: &str,
    ) -> Result<PipelineOutput, StageError> {
        let upload_path = self
            .storage
            .save_upload(meeting_id, filename, &audio)
            .map_err(|e| StageError::from_source(StageKind::Internal, e))?;

        let transcript_text = self.transcribe(&upload_path).await?;

        let transcript_path = self
            .storage
            .write_transcript(meeting_id, &transcript_text)
            .map_err(|e| StageError::from_source(StageKind::Internal, e))?;

        let summary_text = self
            .retry
            .run("summarization", || {
                self.summarizer.summarize(&transcript_text, meet_link)
            })
            .await
            .map_err(|e| StageError::from_source(StageKind::Summarization, e))?;

        if summary_text.trim().is_empty() {
            return Err(StageError::new(
                StageKind::Summarization,
                "summarization returned empty text",
            ));
        }

        let summary_path = self
            .storage
            .write_summary(meeting_id, &summary_text)
            .map_err(|e| StageError::from_source(StageKind::Internal, e))?;

        // The attachment is read back from durable storage at send time.
        self.retry
            .run("dispatch", || {
                self.dispatcher
                    .deliver(user_email, &summary_text, &summary_path)
            })
            .await
            .map_err(|e| StageError::from_source(StageKind::Dispatch, e))?;

        Ok(PipelineOutput {
            meeting_id,
            summary_path,
            transcript_path,
        })
    }

    /// Preprocess and transcribe. The compact temp audio is deleted when
    /// `prepared` drops, whether or not the provider call succeeded.
    /// Preprocessing problems surface as transcription failures.
    async fn transcribe(&self, upload_path: &Path) -> Result<String, StageError> {
        let prepared = self
            .preprocessor
            .prepare(upload_path)
            .await
            .map_err(|e| StageError::from_source(StageKind::Transcription, e))?;

        let outcome = self
            .retry
            .run("transcription", || self.transcriber.submit(prepared.path()))
            .await
            .map_err(|e| StageError::from_source(StageKind::Transcription, e))?;

        match outcome {
            TranscriptionOutcome::Completed { text } if !text.trim().is_empty() => Ok(text),
            TranscriptionOutcome::Completed { .. } => {
                warn!("Transcription completed but returned no text (likely silence)");
                Ok(NO_SPEECH_SENTINEL.to_string())
            }
            TranscriptionOutcome::Error { detail } => Err(StageError::new(
                StageKind::Transcription,
                detail.unwrap_or_else(|| "transcription did not complete".to_string()),
            )),
        }
    }

    /// Apply the terminal transition for this attempt. The repository update
    /// is conditional on the record still being in flight, so a racing
    /// completion cannot be overwritten.
    async fn record_terminal(
        &self,
        meeting_id: i64,
        result: &Result<PipelineOutput, StageError>,
    ) {
        let end_time = now_rfc3339();

        let update = match result {
            Ok(output) => {
                let summary = output.summary_path.to_string_lossy().into_owned();
                let transcript = output.transcript_path.to_string_lossy().into_owned();
                self.with_store(move |conn| {
                    MeetingRepository::complete_success(
                        conn, meeting_id, &end_time, &summary, &transcript,
                    )
                })
                .await
            }
            Err(stage_err) => {
                let reason = stage_err.to_string();
                self.with_store(move |conn| {
                    MeetingRepository::complete_error(conn, meeting_id, &end_time, &reason)
                })
                .await
            }
        };

        match update {
            Ok(true) => {}
            Ok(false) => warn!(
                "Meeting {} was already terminal; completion skipped",
                meeting_id
            ),
            Err(e) => error!("Failed to record outcome for meeting {}: {:#}", meeting_id, e),
        }
    }

    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db::open(&db_path)?;
            op(&conn)
        })
        .await
        .context("record store task panicked")?
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PreparedAudio;
    use crate::db::meetings::MeetingOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Copies the upload into its own temp dir, standing in for ffmpeg.
    struct PassthroughPreprocessor;

    #[async_trait]
    impl Preprocessor for PassthroughPreprocessor {
        async fn prepare(&self, input: &Path) -> Result<PreparedAudio> {
            let dir = TempDir::new()?;
            let path = dir.path().join("processed_audio.mp3");
            std::fs::copy(input, &path)?;
            Ok(PreparedAudio::new(dir, path))
        }
    }

    enum StubResult {
        Outcome(TranscriptionOutcome),
        Transport(String),
    }

    struct StubTranscriber {
        result: StubResult,
    }

    impl StubTranscriber {
        fn completed(text: &str) -> Self {
            Self {
                result: StubResult::Outcome(TranscriptionOutcome::Completed {
                    text: text.to_string(),
                }),
            }
        }

        fn provider_error(detail: Option<&str>) -> Self {
            Self {
                result: StubResult::Outcome(TranscriptionOutcome::Error {
                    detail: detail.map(str::to_string),
                }),
            }
        }
    }

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn submit(&self, audio_path: &Path) -> Result<TranscriptionOutcome> {
            assert!(audio_path.exists(), "compact audio must exist during the call");
            match &self.result {
                StubResult::Outcome(outcome) => Ok(outcome.clone()),
                StubResult::Transport(msg) => Err(anyhow::anyhow!("{msg}")),
            }
        }
    }

    struct StubSummarizer {
        reply: String,
        fail: bool,
        seen_transcripts: Mutex<Vec<String>>,
    }

    impl StubSummarizer {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                fail: false,
                seen_transcripts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: String::new(),
                fail: true,
                seen_transcripts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(&self, transcript: &str, _meet_link: &str) -> Result<String> {
            self.seen_transcripts
                .lock()
                .unwrap()
                .push(transcript.to_string());
            if self.fail {
                anyhow::bail!("Gemini returned an error status");
            }
            Ok(self.reply.clone())
        }
    }

    struct StubDispatcher {
        fail: bool,
        deliveries: AtomicUsize,
    }

    impl StubDispatcher {
        fn ok() -> Self {
            Self {
                fail: false,
                deliveries: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                deliveries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Dispatcher for StubDispatcher {
        async fn deliver(&self, _to: &str, _body: &str, attachment: &Path) -> Result<()> {
            assert!(attachment.exists(), "summary artifact must be on disk at send time");
            if self.fail {
                anyhow::bail!("Brevo send failed with status 500");
            }
            self.deliveries.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        _data_dir: TempDir,
        pipeline: Pipeline,
        summarizer: Arc<StubSummarizer>,
        dispatcher: Arc<StubDispatcher>,
    }

    fn harness(
        transcriber: StubTranscriber,
        summarizer: StubSummarizer,
        dispatcher: StubDispatcher,
    ) -> Harness {
        let data_dir = TempDir::new().unwrap();
        let storage = ArtifactStorage::new(data_dir.path());
        storage.ensure_dirs().unwrap();

        let summarizer = Arc::new(summarizer);
        let dispatcher = Arc::new(dispatcher);

        let pipeline = Pipeline::new(
            crate::global::db_file(data_dir.path()),
            storage,
            Arc::new(PassthroughPreprocessor),
            Arc::new(transcriber),
            summarizer.clone(),
            dispatcher.clone(),
            RetryPolicy::new(1, Duration::from_millis(1), Duration::from_secs(5)),
        );

        Harness {
            _data_dir: data_dir,
            pipeline,
            summarizer,
            dispatcher,
        }
    }

    async fn record_for(pipeline: &Pipeline, id: i64) -> crate::db::meetings::MeetingRecord {
        let conn = db::open(pipeline.db_path()).unwrap();
        MeetingRepository::get(&conn, id).unwrap().unwrap()
    }

    const AUDIO: &[u8] = b"RIFF-fake-wav-bytes";

    #[tokio::test]
    async fn test_happy_path() {
        let h = harness(
            StubTranscriber::completed("We agreed to ship on Friday."),
            StubSummarizer::replying("1. Executive Summary: shipping Friday."),
            StubDispatcher::ok(),
        );

        let output = h
            .pipeline
            .process(AUDIO.to_vec(), "standup.wav", "https://meet/x", "a@b.com")
            .await
            .unwrap();

        assert!(output.summary_path.exists());
        assert!(output.transcript_path.exists());
        assert_eq!(h.dispatcher.deliveries.load(Ordering::SeqCst), 1);

        let record = record_for(&h.pipeline, output.meeting_id).await;
        assert!(record.end_time.as_deref().unwrap() >= record.start_time.as_str());
        match record.outcome {
            MeetingOutcome::Success {
                summary_path,
                transcript_path,
            } => {
                assert_eq!(summary_path, output.summary_path.to_string_lossy());
                assert_eq!(transcript_path, output.transcript_path.to_string_lossy());
            }
            other => panic!("expected success outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transcription_provider_error_fails_attempt() {
        let h = harness(
            StubTranscriber::provider_error(Some("unsupported codec")),
            StubSummarizer::replying("unused"),
            StubDispatcher::ok(),
        );

        let err = h
            .pipeline
            .process(AUDIO.to_vec(), "bad.wav", "https://meet/x", "a@b.com")
            .await
            .unwrap_err();

        assert_eq!(err.stage, StageKind::Transcription);
        assert!(err.message.contains("unsupported codec"));
        assert!(h.summarizer.seen_transcripts.lock().unwrap().is_empty());

        let record = record_for(&h.pipeline, 1).await;
        assert!(record.end_time.is_some());
        match record.outcome {
            MeetingOutcome::Failed { reason } => {
                assert!(reason.contains("transcription failed"));
                assert!(reason.contains("unsupported codec"));
            }
            other => panic!("expected failed outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transcription_error_without_detail_uses_generic_message() {
        let h = harness(
            StubTranscriber::provider_error(None),
            StubSummarizer::replying("unused"),
            StubDispatcher::ok(),
        );

        let err = h
            .pipeline
            .process(AUDIO.to_vec(), "bad.wav", "https://meet/x", "a@b.com")
            .await
            .unwrap_err();

        assert!(err.message.contains("transcription did not complete"));
    }

    #[tokio::test]
    async fn test_silence_proceeds_with_sentinel_and_succeeds() {
        let h = harness(
            StubTranscriber::completed("   "),
            StubSummarizer::replying("Executive Summary: None."),
            StubDispatcher::ok(),
        );

        let output = h
            .pipeline
            .process(AUDIO.to_vec(), "quiet.wav", "https://meet/x", "a@b.com")
            .await
            .unwrap();

        // Summarization is still invoked, on the sentinel text.
        let seen = h.summarizer.seen_transcripts.lock().unwrap();
        assert_eq!(seen.as_slice(), [NO_SPEECH_SENTINEL]);

        let transcript = std::fs::read_to_string(&output.transcript_path).unwrap();
        assert_eq!(transcript, NO_SPEECH_SENTINEL);

        let record = record_for(&h.pipeline, output.meeting_id).await;
        assert!(matches!(record.outcome, MeetingOutcome::Success { .. }));
    }

    #[tokio::test]
    async fn test_empty_summary_fails_attempt() {
        let h = harness(
            StubTranscriber::completed("some speech"),
            StubSummarizer::replying("   "),
            StubDispatcher::ok(),
        );

        let err = h
            .pipeline
            .process(AUDIO.to_vec(), "a.wav", "https://meet/x", "a@b.com")
            .await
            .unwrap_err();

        assert_eq!(err.stage, StageKind::Summarization);
        assert_eq!(h.dispatcher.deliveries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_summarizer_failure_fails_attempt() {
        let h = harness(
            StubTranscriber::completed("some speech"),
            StubSummarizer::failing(),
            StubDispatcher::ok(),
        );

        let err = h
            .pipeline
            .process(AUDIO.to_vec(), "a.wav", "https://meet/x", "a@b.com")
            .await
            .unwrap_err();

        assert_eq!(err.stage, StageKind::Summarization);

        let record = record_for(&h.pipeline, 1).await;
        assert!(matches!(record.outcome, MeetingOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_total_failure() {
        let h = harness(
            StubTranscriber::completed("real speech"),
            StubSummarizer::replying("a fine summary"),
            StubDispatcher::failing(),
        );

        let err = h
            .pipeline
            .process(AUDIO.to_vec(), "a.wav", "https://meet/x", "a@b.com")
            .await
            .unwrap_err();

        // Upstream artifacts were produced but the caller sees one uniform
        // failure and the record is terminal-error, not partial success.
        assert_eq!(err.stage, StageKind::Dispatch);

        let record = record_for(&h.pipeline, 1).await;
        assert!(record.end_time.is_some());
        match record.outcome {
            MeetingOutcome::Failed { reason } => assert!(reason.contains("dispatch failed")),
            other => panic!("expected failed outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_identical_inputs_create_distinct_records() {
        let h = harness(
            StubTranscriber::completed("hello"),
            StubSummarizer::replying("summary"),
            StubDispatcher::ok(),
        );

        let first = h
            .pipeline
            .process(AUDIO.to_vec(), "same.wav", "https://meet/x", "a@b.com")
            .await
            .unwrap();
        let second = h
            .pipeline
            .process(AUDIO.to_vec(), "same.wav", "https://meet/x", "a@b.com")
            .await
            .unwrap();

        assert_ne!(first.meeting_id, second.meeting_id);
        assert_ne!(first.summary_path, second.summary_path);

        let conn = db::open(h.pipeline.db_path()).unwrap();
        assert_eq!(MeetingRepository::list(&conn, None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_record_left_in_flight_after_process() {
        let h = harness(
            StubTranscriber {
                result: StubResult::Transport("connection reset".into()),
            },
            StubSummarizer::replying("unused"),
            StubDispatcher::ok(),
        );

        let err = h
            .pipeline
            .process(AUDIO.to_vec(), "a.wav", "https://meet/x", "a@b.com")
            .await
            .unwrap_err();
        assert_eq!(err.stage, StageKind::Transcription);

        let conn = db::open(h.pipeline.db_path()).unwrap();
        for record in MeetingRepository::list(&conn, None).unwrap() {
            assert!(record.outcome.is_terminal());
            assert!(record.end_time.is_some());
        }
    }
}
