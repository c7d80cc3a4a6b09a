use std::time::Duration;

use crate::domain::ChatId;

/// Core error type.
///
/// Backend adapters map their transport errors into this type so the relay
/// can tell the recoverable cases (forward restriction, inaccessible chat)
/// apart from plain delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("chat {chat} is not accessible: {reason}")]
    NotAccessible { chat: ChatId, reason: String },

    #[error("forward restricted: {0}")]
    ForwardRestricted(String),

    #[error("backend call `{op}` timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("polling cycle failed: {0}")]
    Cycle(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Errors that mean the backend session itself is gone; these escape a
    /// polling cycle instead of being isolated to one source.
    pub fn is_session_loss(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
