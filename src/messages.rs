//! Process-wide message sink for user-visible reporting
//!
//! Tasks never raise failures to the caller that submitted them; everything a
//! user should see goes through this sink as a fire-and-forget broadcast.
//! Dropped messages (nobody subscribed) are fine - every post is mirrored to
//! the log.

use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Severity of a sink message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// A single user-visible message.
#[derive(Debug, Clone)]
pub struct Message {
    pub level: MessageLevel,
    /// Component that produced the message, e.g. "ArtworkDownload".
    pub source: String,
    pub text: String,
}

/// Fire-and-forget broadcast sink shared by all pools and tasks.
#[derive(Clone)]
pub struct MessageSink {
    tx: broadcast::Sender<Message>,
}

impl MessageSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create with the default channel capacity.
    pub fn with_defaults() -> Self {
        Self::new(256)
    }

    /// Subscribe to all messages posted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Post a message. Never blocks, never fails.
    pub fn post(&self, level: MessageLevel, source: impl Into<String>, text: impl Into<String>) {
        let message = Message {
            level,
            source: source.into(),
            text: text.into(),
        };

        match message.level {
            MessageLevel::Info => info!(source = %message.source, "{}", message.text),
            MessageLevel::Warning => warn!(source = %message.source, "{}", message.text),
            MessageLevel::Error => error!(source = %message.source, "{}", message.text),
        }

        let _ = self.tx.send(message);
    }

    pub fn warning(&self, source: impl Into<String>, text: impl Into<String>) {
        self.post(MessageLevel::Warning, source, text);
    }

    pub fn error(&self, source: impl Into<String>, text: impl Into<String>) {
        self.post(MessageLevel::Error, source, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_reaches_subscriber() {
        let sink = MessageSink::with_defaults();
        let mut rx = sink.subscribe();

        sink.error("ArtworkDownload", "boom");

        let message = rx.recv().await.unwrap();
        assert_eq!(message.level, MessageLevel::Error);
        assert_eq!(message.source, "ArtworkDownload");
        assert_eq!(message.text, "boom");
    }

    #[tokio::test]
    async fn test_post_without_subscriber_is_silent() {
        let sink = MessageSink::with_defaults();
        // no receiver - must not panic or error
        sink.warning("Scanner", "datasource offline");
    }
}
