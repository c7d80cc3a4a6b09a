use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    backend::port::ChatBackend,
    domain::{
        CandidateMessage, ChatId, EntityInfo, MessageId, MessageRef, SenderKind, SessionInfo,
    },
    errors::Error,
    Result,
};

/// ChatBackend decorator that bounds every call with a timeout.
///
/// A timed-out send is reported as `Error::Timeout` and handled like any
/// other delivery failure; it is never retried.
pub struct TimedBackend {
    inner: Arc<dyn ChatBackend>,
    timeout: Duration,
}

impl TimedBackend {
    pub fn new(inner: Arc<dyn ChatBackend>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout {
                op,
                after: self.timeout,
            }),
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for TimedBackend {
    async fn connect(&self) -> Result<SessionInfo> {
        self.bounded("connect", self.inner.connect()).await
    }

    async fn resolve_entity(&self, chat: ChatId) -> Result<EntityInfo> {
        self.bounded("resolve_entity", self.inner.resolve_entity(chat))
            .await
    }

    async fn fetch_messages(
        &self,
        source: ChatId,
        since: MessageId,
        limit: usize,
    ) -> Result<Vec<CandidateMessage>> {
        self.bounded(
            "fetch_messages",
            self.inner.fetch_messages(source, since, limit),
        )
        .await
    }

    async fn latest_message_id(&self, source: ChatId) -> Result<Option<MessageId>> {
        self.bounded("latest_message_id", self.inner.latest_message_id(source))
            .await
    }

    async fn resolve_sender(&self, msg: &CandidateMessage) -> Result<SenderKind> {
        self.bounded("resolve_sender", self.inner.resolve_sender(msg))
            .await
    }

    async fn send_message(
        &self,
        chat: ChatId,
        html: &str,
        suppress_link_preview: bool,
    ) -> Result<MessageRef> {
        self.bounded(
            "send_message",
            self.inner.send_message(chat, html, suppress_link_preview),
        )
        .await
    }

    async fn forward_message(&self, chat: ChatId, msg: &CandidateMessage) -> Result<MessageRef> {
        self.bounded("forward_message", self.inner.forward_message(chat, msg))
            .await
    }

    async fn mark_read(&self, source: ChatId) -> Result<()> {
        self.bounded("mark_read", self.inner.mark_read(source)).await
    }

    async fn subscribe(&self, sources: &[ChatId]) -> Result<mpsc::Receiver<CandidateMessage>> {
        self.bounded("subscribe", self.inner.subscribe(sources)).await
    }
}
