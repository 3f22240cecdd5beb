//! User-facing notifications and action screenshots.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use webnav_core::{MessageType, Result};

use crate::page::PageHandle;

/// Receives progress messages meant for the person watching the browser.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, message_type: MessageType);
}

/// Prefix a message the way it is shown to the user.
pub fn format_notification(message: &str, message_type: MessageType) -> String {
    let message = message.strip_prefix(':').unwrap_or(message);
    let message = message.strip_suffix(',').unwrap_or(message);
    match message_type {
        MessageType::Plan => format!("Plan:\n{}", message),
        MessageType::Step if message.to_lowercase().contains("confirm") => format!("Verify: {}", message),
        MessageType::Step => format!("Next step: {}", message),
        MessageType::Question => format!("Question: {}", message),
        MessageType::Answer => format!("Response: {}", message),
        MessageType::Action | MessageType::Info => message.to_string(),
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str, message_type: MessageType) {
        info!(kind = %message_type, "{}", format_notification(message, message_type));
    }
}

/// Stores screenshots taken around actions.
#[async_trait]
pub trait ScreenshotSink: Send + Sync {
    async fn capture(&self, label: &str, page: &dyn PageHandle) -> Result<()>;
}

/// Saves `<unix-nanos>_<label>.png` files into a directory.
pub struct FileScreenshotSink {
    dir: PathBuf,
}

impl FileScreenshotSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl ScreenshotSink for FileScreenshotSink {
    async fn capture(&self, label: &str, page: &dyn PageHandle) -> Result<()> {
        let png = page.screenshot().await?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let path = self.dir.join(format!("{}_{}.png", stamp, label));
        tokio::fs::write(&path, png).await?;
        debug!(path = %path.display(), "Screenshot saved");
        Ok(())
    }
}

/// Take a screenshot if a sink is configured. Failures are only logged.
pub(crate) async fn capture_best_effort(
    sink: Option<&dyn ScreenshotSink>,
    label: &str,
    page: &dyn PageHandle,
) {
    if let Some(sink) = sink {
        if let Err(e) = sink.capture(label, page).await {
            warn!(label, error = %e, "Failed to take screenshot");
        }
    }
}
