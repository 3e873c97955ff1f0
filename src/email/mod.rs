//! Notification dispatch seam.

mod brevo;

pub use brevo::BrevoDispatcher;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// External capability delivering the summary to a recipient.
///
/// The attachment is read from durable storage at send time; a missing file
/// and a transport failure are equally dispatch failures.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn deliver(&self, to_address: &str, body_text: &str, attachment: &Path) -> Result<()>;
}
