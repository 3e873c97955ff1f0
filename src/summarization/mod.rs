//! Summarization client seam.
//!
//! The provider returns free text structured into three sections (executive
//! summary, key discussion points, action items) by the prompt contract;
//! the pipeline treats the result as opaque text.

mod gemini;
mod prompts;

pub use gemini::GeminiSummarizer;
pub use prompts::build_summary_prompt;

use anyhow::Result;
use async_trait::async_trait;

/// External capability converting transcript text to a structured summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str, meet_link: &str) -> Result<String>;
}
