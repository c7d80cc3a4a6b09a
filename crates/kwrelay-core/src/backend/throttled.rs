use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Instant};

use crate::{
    backend::port::ChatBackend,
    domain::{
        CandidateMessage, ChatId, EntityInfo, MessageId, MessageRef, SenderKind, SessionInfo,
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* backend calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between outbound sends/forwards into the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    fn reserve(&mut self) -> Duration {
        self.reserve_at(Instant::now())
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve_at(&mut self, now: Instant) -> Duration {
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// ChatBackend decorator that spaces out calls.
///
/// Outbound sends and forwards are spaced per destination chat (platform flood
/// limits are per chat); every call also takes a global slot. This also
/// serializes concurrent event-mode deliveries into the same destination.
pub struct ThrottledBackend {
    inner: Arc<dyn ChatBackend>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledBackend {
    pub fn new(inner: Arc<dyn ChatBackend>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for ThrottledBackend {
    async fn connect(&self) -> Result<SessionInfo> {
        self.inner.connect().await
    }

    async fn resolve_entity(&self, chat: ChatId) -> Result<EntityInfo> {
        self.throttle_global().await;
        self.inner.resolve_entity(chat).await
    }

    async fn fetch_messages(
        &self,
        source: ChatId,
        since: MessageId,
        limit: usize,
    ) -> Result<Vec<CandidateMessage>> {
        self.throttle_global().await;
        self.inner.fetch_messages(source, since, limit).await
    }

    async fn latest_message_id(&self, source: ChatId) -> Result<Option<MessageId>> {
        self.throttle_global().await;
        self.inner.latest_message_id(source).await
    }

    async fn resolve_sender(&self, msg: &CandidateMessage) -> Result<SenderKind> {
        self.throttle_global().await;
        self.inner.resolve_sender(msg).await
    }

    async fn send_message(
        &self,
        chat: ChatId,
        html: &str,
        suppress_link_preview: bool,
    ) -> Result<MessageRef> {
        self.throttle_chat(chat.0).await;
        self.inner
            .send_message(chat, html, suppress_link_preview)
            .await
    }

    async fn forward_message(&self, chat: ChatId, msg: &CandidateMessage) -> Result<MessageRef> {
        self.throttle_chat(chat.0).await;
        self.inner.forward_message(chat, msg).await
    }

    async fn mark_read(&self, source: ChatId) -> Result<()> {
        self.throttle_global().await;
        self.inner.mark_read(source).await
    }

    async fn subscribe(&self, sources: &[ChatId]) -> Result<mpsc::Receiver<CandidateMessage>> {
        self.inner.subscribe(sources).await
    }
}
