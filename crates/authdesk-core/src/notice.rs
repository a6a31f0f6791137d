//! Transient user-facing notifications.
//!
//! Operations publish a [`Notice`] whenever they succeed or fail in a way the
//! user should hear about. Presentation layers subscribe and render them
//! however they like; nobody listening is fine.

use tokio::sync::broadcast;

/// Buffer size for the notice channel.
/// Slow subscribers lose the oldest notices, which are transient anyway.
const NOTICE_BUFFER_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Success(msg) | Notice::Error(msg) => msg,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

/// Cloneable publisher handle for [`Notice`]s.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_BUFFER_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        // No subscribers is not an error
        let _ = self.tx.send(Notice::Success(message.into()));
    }

    pub fn error(&self, message: impl Into<String>) {
        let _ = self.tx.send(Notice::Error(message.into()));
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
