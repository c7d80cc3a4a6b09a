use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{
        CandidateMessage, ChatId, EntityInfo, MessageId, MessageRef, SenderKind, SessionInfo,
    },
    errors::Error,
    Result,
};

/// Chat platform port.
///
/// Telegram is the shipped implementation; the relay core only talks to this
/// trait. Implementations must tolerate concurrent calls (event mode runs one
/// task per inbound message).
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Authenticate and return the account we act as.
    async fn connect(&self) -> Result<SessionInfo>;

    /// Fails with `Error::NotAccessible` if the chat is unknown or forbidden.
    async fn resolve_entity(&self, chat: ChatId) -> Result<EntityInfo>;

    /// Messages with id strictly greater than `since`, oldest first, at most `limit`.
    async fn fetch_messages(
        &self,
        source: ChatId,
        since: MessageId,
        limit: usize,
    ) -> Result<Vec<CandidateMessage>>;

    /// Newest message id currently known for `source`.
    async fn latest_message_id(&self, source: ChatId) -> Result<Option<MessageId>>;

    async fn resolve_sender(&self, msg: &CandidateMessage) -> Result<SenderKind>;

    /// Send `html` as a new message.
    async fn send_message(
        &self,
        chat: ChatId,
        html: &str,
        suppress_link_preview: bool,
    ) -> Result<MessageRef>;

    /// Native forward preserving attribution.
    ///
    /// Fails with `Error::ForwardRestricted` when the platform disallows it.
    async fn forward_message(&self, chat: ChatId, msg: &CandidateMessage) -> Result<MessageRef>;

    /// Best-effort read acknowledgement.
    async fn mark_read(&self, source: ChatId) -> Result<()>;

    /// Push subscription used by event mode.
    async fn subscribe(&self, sources: &[ChatId]) -> Result<mpsc::Receiver<CandidateMessage>> {
        let _ = sources;
        Err(Error::External(
            "backend does not support push subscriptions".to_string(),
        ))
    }
}
