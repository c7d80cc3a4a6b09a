//! Bounded per-chat buffer of received updates.
//!
//! The Bot API only pushes updates; it cannot list a chat's history. The
//! dispatcher stores every incoming message from a watched chat here and the
//! polling relay reads it back as if it were history. A subscriber (event mode) additionally gets
//! each message from its subscribed chats as it arrives.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Mutex, MutexGuard},
};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use kwrelay_core::domain::{CandidateMessage, ChatId, MessageId, SenderKind, SenderRef};

pub const DEFAULT_CHAT_CAPACITY: usize = 500;
const MAX_KNOWN_SENDERS: usize = 10_000;
const SUBSCRIPTION_BUFFER: usize = 256;

#[derive(Default)]
struct ChatBuffer {
    messages: VecDeque<CandidateMessage>,
    latest: Option<MessageId>,
    fetched_upto: MessageId,
    dropped: u64,
}

#[derive(Default)]
struct InboxState {
    chats: HashMap<ChatId, ChatBuffer>,
    senders: HashMap<SenderRef, SenderKind>,
    subscriber: Option<(HashSet<ChatId>, mpsc::Sender<CandidateMessage>)>,
}

pub struct Inbox {
    capacity: usize,
    /// `None` buffers every chat.
    watched: Option<HashSet<ChatId>>,
    state: Mutex<InboxState>,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_CAPACITY)
    }
}

impl Inbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            watched: None,
            state: Mutex::new(InboxState::default()),
        }
    }

    /// Only buffer updates from `sources`; everything else is dropped on arrival.
    pub fn watching(mut self, sources: impl IntoIterator<Item = ChatId>) -> Self {
        self.watched = Some(sources.into_iter().collect());
        self
    }

    pub fn is_watched(&self, chat: ChatId) -> bool {
        self.watched.as_ref().map_or(true, |w| w.contains(&chat))
    }

    fn state(&self) -> MutexGuard<'_, InboxState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Buffer a message and hand it to the subscriber, if it watches the chat.
    pub async fn push(&self, msg: CandidateMessage, sender: SenderKind) {
        if !self.is_watched(msg.source) {
            debug!(chat = %msg.source, "update from unwatched chat ignored");
            return;
        }
        let subscriber = {
            let mut st = self.state();
            if st.senders.len() >= MAX_KNOWN_SENDERS {
                st.senders.clear();
            }
            if msg.sender != SenderRef::Unknown {
                st.senders.insert(msg.sender, sender);
            }

            let buf = st.chats.entry(msg.source).or_default();
            if buf.latest.map_or(true, |l| msg.id > l) {
                buf.latest = Some(msg.id);
            }
            if buf.messages.len() >= self.capacity {
                buf.messages.pop_front();
                buf.dropped += 1;
                if buf.dropped % 100 == 1 {
                    warn!(
                        chat = %msg.source,
                        dropped = buf.dropped,
                        "inbox full, dropping oldest buffered messages"
                    );
                }
            }
            buf.messages.push_back(msg.clone());

            st.subscriber
                .as_ref()
                .filter(|(chats, _)| chats.contains(&msg.source))
                .map(|(_, tx)| tx.clone())
        };

        if let Some(tx) = subscriber {
            if tx.send(msg).await.is_err() {
                debug!("subscriber gone; dropping live message");
            }
        }
    }

    /// Buffered messages newer than `since`, oldest first, at most `limit`.
    pub fn fetch(&self, source: ChatId, since: MessageId, limit: usize) -> Vec<CandidateMessage> {
        let mut st = self.state();
        let Some(buf) = st.chats.get_mut(&source) else {
            return Vec::new();
        };
        let mut out: Vec<CandidateMessage> = buf
            .messages
            .iter()
            .filter(|m| m.id > since)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.id);
        out.truncate(limit);
        if let Some(last) = out.last() {
            buf.fetched_upto = buf.fetched_upto.max(last.id);
        }
        out
    }

    pub fn latest(&self, source: ChatId) -> Option<MessageId> {
        self.state().chats.get(&source).and_then(|b| b.latest)
    }

    /// Forget what has already been handed out by `fetch`.
    pub fn mark_read(&self, source: ChatId) {
        if let Some(buf) = self.state().chats.get_mut(&source) {
            let upto = buf.fetched_upto;
            buf.messages.retain(|m| m.id > upto);
        }
    }

    pub fn sender(&self, sender: &SenderRef) -> Option<SenderKind> {
        self.state().senders.get(sender).cloned()
    }

    /// Replace any previous subscription.
    pub fn subscribe(&self, sources: &[ChatId]) -> mpsc::Receiver<CandidateMessage> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.state().subscriber = Some((sources.iter().copied().collect(), tx));
        rx
    }

    pub fn buffered(&self, source: ChatId) -> usize {
        self.state()
            .chats
            .get(&source)
            .map_or(0, |b| b.messages.len())
    }
}
