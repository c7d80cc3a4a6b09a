//! In-memory `ChatBackend` for unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    backend::port::ChatBackend,
    config::{Config, RelayMode, RoutesConfig},
    cursor::CursorStart,
    domain::{
        CandidateMessage, ChatId, EntityInfo, MessageId, MessageRef, SenderKind, SenderRef,
        SessionInfo,
    },
    errors::Error,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardBehavior {
    Ok,
    Restricted,
    Fail,
}

#[derive(Default)]
pub struct FakeBackend {
    next_id: Mutex<i32>,
    history: Mutex<HashMap<ChatId, Vec<CandidateMessage>>>,
    senders: Mutex<HashMap<SenderRef, SenderKind>>,
    entities: Mutex<HashMap<ChatId, EntityInfo>>,
    forward_behavior: Mutex<HashMap<ChatId, ForwardBehavior>>,
    failing_sends: Mutex<HashSet<ChatId>>,
    failing_fetches: Mutex<HashMap<ChatId, String>>,
    auth_lost: Mutex<bool>,
    mark_read_fails: Mutex<bool>,
    forward_delay: Mutex<Option<Duration>>,
    push: Mutex<Option<mpsc::Sender<CandidateMessage>>>,

    forwards: Mutex<Vec<(ChatId, MessageRef)>>,
    sent: Mutex<Vec<(ChatId, String, bool)>>,
    marked_read: Mutex<Vec<ChatId>>,
    sender_lookups: Mutex<usize>,
    fetch_calls: Mutex<Vec<(ChatId, MessageId)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1000),
            ..Default::default()
        }
    }

    pub fn add_entity(&self, chat: i64, name: &str, handle: Option<&str>) {
        self.entities.lock().unwrap().insert(
            ChatId(chat),
            EntityInfo {
                display_name: name.to_string(),
                handle: handle.map(str::to_string),
            },
        );
    }

    pub fn add_sender(&self, sender: SenderRef, kind: SenderKind) {
        self.senders.lock().unwrap().insert(sender, kind);
    }

    pub fn post(&self, msg: CandidateMessage) {
        self.history
            .lock()
            .unwrap()
            .entry(msg.source)
            .or_default()
            .push(msg);
    }

    pub fn set_forward(&self, dest: i64, behavior: ForwardBehavior) {
        self.forward_behavior
            .lock()
            .unwrap()
            .insert(ChatId(dest), behavior);
    }

    pub fn fail_sends_to(&self, dest: i64) {
        self.failing_sends.lock().unwrap().insert(ChatId(dest));
    }

    pub fn fail_fetch(&self, source: i64, reason: &str) {
        self.failing_fetches
            .lock()
            .unwrap()
            .insert(ChatId(source), reason.to_string());
    }

    pub fn heal_fetch(&self, source: i64) {
        self.failing_fetches.lock().unwrap().remove(&ChatId(source));
    }

    pub fn lose_auth(&self) {
        *self.auth_lost.lock().unwrap() = true;
    }

    pub fn fail_mark_read(&self) {
        *self.mark_read_fails.lock().unwrap() = true;
    }

    pub fn set_forward_delay(&self, d: Duration) {
        *self.forward_delay.lock().unwrap() = Some(d);
    }

    /// Push a live message to the event-mode subscriber, if any.
    pub async fn push(&self, msg: CandidateMessage) {
        let tx = self.push.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(msg).await;
        }
    }

    /// Drop the subscription sender so the receiver sees end-of-stream.
    pub fn close_subscription(&self) {
        self.push.lock().unwrap().take();
    }

    pub fn forwards(&self) -> Vec<(ChatId, MessageRef)> {
        self.forwards.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(ChatId, String, bool)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn marked_read(&self) -> Vec<ChatId> {
        self.marked_read.lock().unwrap().clone()
    }

    pub fn sender_lookups(&self) -> usize {
        *self.sender_lookups.lock().unwrap()
    }

    pub fn fetch_calls(&self) -> Vec<(ChatId, MessageId)> {
        self.fetch_calls.lock().unwrap().clone()
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        }
    }

    fn check_auth(&self) -> Result<()> {
        if *self.auth_lost.lock().unwrap() {
            return Err(Error::Auth("session revoked".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn connect(&self) -> Result<SessionInfo> {
        self.check_auth()?;
        Ok(SessionInfo {
            display_name: "Relay Bot".to_string(),
            handle: Some("relay_bot".to_string()),
        })
    }

    async fn resolve_entity(&self, chat: ChatId) -> Result<EntityInfo> {
        self.entities
            .lock()
            .unwrap()
            .get(&chat)
            .cloned()
            .ok_or_else(|| Error::NotAccessible {
                chat,
                reason: "chat not found".to_string(),
            })
    }

    async fn fetch_messages(
        &self,
        source: ChatId,
        since: MessageId,
        limit: usize,
    ) -> Result<Vec<CandidateMessage>> {
        self.check_auth()?;
        self.fetch_calls.lock().unwrap().push((source, since));
        if let Some(reason) = self.failing_fetches.lock().unwrap().get(&source) {
            return Err(Error::External(reason.clone()));
        }
        let history = self.history.lock().unwrap();
        let mut out: Vec<CandidateMessage> = history
            .get(&source)
            .map(|msgs| msgs.iter().filter(|m| m.id > since).cloned().collect())
            .unwrap_or_default();
        out.sort_by_key(|m| m.id);
        out.truncate(limit);
        Ok(out)
    }

    async fn latest_message_id(&self, source: ChatId) -> Result<Option<MessageId>> {
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(&source)
            .and_then(|msgs| msgs.iter().map(|m| m.id).max()))
    }

    async fn resolve_sender(&self, msg: &CandidateMessage) -> Result<SenderKind> {
        *self.sender_lookups.lock().unwrap() += 1;
        Ok(self
            .senders
            .lock()
            .unwrap()
            .get(&msg.sender)
            .cloned()
            .unwrap_or(SenderKind::Unknown))
    }

    async fn send_message(
        &self,
        chat: ChatId,
        html: &str,
        suppress_link_preview: bool,
    ) -> Result<MessageRef> {
        if self.failing_sends.lock().unwrap().contains(&chat) {
            return Err(Error::External("flood wait".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat, html.to_string(), suppress_link_preview));
        Ok(self.alloc(chat))
    }

    async fn forward_message(&self, chat: ChatId, msg: &CandidateMessage) -> Result<MessageRef> {
        let delay = *self.forward_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        let behavior = self
            .forward_behavior
            .lock()
            .unwrap()
            .get(&chat)
            .copied()
            .unwrap_or(ForwardBehavior::Ok);
        match behavior {
            ForwardBehavior::Ok => {
                self.forwards.lock().unwrap().push((chat, msg.reference()));
                Ok(self.alloc(chat))
            }
            ForwardBehavior::Restricted => Err(Error::ForwardRestricted(
                "message can't be forwarded".to_string(),
            )),
            ForwardBehavior::Fail => Err(Error::External("network unreachable".to_string())),
        }
    }

    async fn mark_read(&self, source: ChatId) -> Result<()> {
        if *self.mark_read_fails.lock().unwrap() {
            return Err(Error::External("mark read failed".to_string()));
        }
        self.marked_read.lock().unwrap().push(source);
        Ok(())
    }

    async fn subscribe(&self, _sources: &[ChatId]) -> Result<mpsc::Receiver<CandidateMessage>> {
        let (tx, rx) = mpsc::channel(64);
        *self.push.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

/// A plain incoming text message from user 42.
pub fn message(source: i64, id: i32, text: &str) -> CandidateMessage {
    CandidateMessage {
        id: MessageId(id),
        source: ChatId(source),
        text: text.to_string(),
        caption: None,
        sender: SenderRef::User(42),
        outgoing: false,
    }
}

pub fn ada() -> SenderKind {
    SenderKind::User {
        first: Some("Ada".to_string()),
        last: Some("Lovelace".to_string()),
        handle: Some("ada".to_string()),
    }
}

/// Source -1 feeds destination -10 (`foo`) and -20 (`bar baz`).
pub fn two_destination_routes() -> RoutesConfig {
    RoutesConfig::from_json(
        r#"{
          "destinations": {
            "Alpha": { "destination": -10, "sources": {
                "Feed": { "source": -1, "keywords": ["foo"] }
            }},
            "Beta": { "destination": -20, "sources": {
                "Feed": { "source": -1, "keywords": ["bar baz"] }
            }}
          }
        }"#,
    )
    .unwrap()
}

// Avoid Config::load() env dependency: hand-roll config.
pub fn config(routes: RoutesConfig) -> Config {
    Config {
        telegram_bot_token: "x".to_string(),
        backend_timeout: Duration::from_secs(5),
        mode: RelayMode::Poll,
        poll_interval: Duration::from_secs(420),
        page_limit: 20,
        error_cooldown: Duration::from_secs(60),
        cursor_start: CursorStart::Latest,
        liveness_enabled: false,
        liveness_interval: Duration::from_secs(1800),
        startup_summary: true,
        health_enabled: false,
        health_port: 0,
        routes_file: "/tmp/routes.json".into(),
        routes,
    }
}
