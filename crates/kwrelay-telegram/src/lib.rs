//! Telegram adapter (teloxide).
//!
//! This crate implements the `kwrelay-core` ChatBackend over the Telegram Bot
//! API. The Bot API cannot read chat history, so `connect` starts a
//! dispatcher that buffers updates from the routed source chats in an
//! [`inbox::Inbox`]; history reads are served from there.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode, RequestError};

use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

mod convert;
pub mod inbox;
pub mod router;

use kwrelay_core::{
    backend::port::ChatBackend,
    cursor::CursorStart,
    domain::{
        CandidateMessage, ChatId, EntityInfo, MessageId, MessageRef, SenderKind, SenderRef,
        SessionInfo,
    },
    errors::Error,
    Result,
};

use crate::inbox::Inbox;

pub struct TelegramBackend {
    bot: Bot,
    inbox: Arc<Inbox>,
    cursor_start: CursorStart,
    cancel: CancellationToken,
    dispatcher: OnceLock<JoinHandle<()>>,
}

impl TelegramBackend {
    /// Only updates from `sources` are buffered. `cursor_start` decides
    /// whether updates queued while offline are replayed (`Zero`) or dropped
    /// (`Latest`).
    pub fn new(
        bot: Bot,
        sources: impl IntoIterator<Item = ChatId>,
        cursor_start: CursorStart,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            bot,
            inbox: Arc::new(Inbox::default().watching(sources)),
            cursor_start,
            cancel,
            dispatcher: OnceLock::new(),
        }
    }

    pub fn from_token(
        token: &str,
        sources: impl IntoIterator<Item = ChatId>,
        cursor_start: CursorStart,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(Bot::new(token), sources, cursor_start, cancel)
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    async fn with_retry<T, Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
    ) -> std::result::Result<T, RequestError>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(d).await;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[async_trait]
impl ChatBackend for TelegramBackend {
    async fn connect(&self) -> Result<SessionInfo> {
        let me = self
            .with_retry(|| self.bot.get_me())
            .await
            .map_err(|e| Error::Auth(format!("telegram get_me failed: {e}")))?;

        self.dispatcher.get_or_init(|| {
            router::spawn_dispatcher(
                self.bot.clone(),
                me.user.id.0,
                self.inbox.clone(),
                self.cursor_start == CursorStart::Latest,
                self.cancel.clone(),
            )
        });

        Ok(SessionInfo {
            display_name: me.user.first_name.clone(),
            handle: me.user.username.clone(),
        })
    }

    async fn resolve_entity(&self, chat: ChatId) -> Result<EntityInfo> {
        let tg = self
            .with_retry(|| self.bot.get_chat(Self::tg_chat(chat)))
            .await
            .map_err(|e| convert::lookup_error(&e, chat))?;
        Ok(convert::entity_from(&tg))
    }

    async fn fetch_messages(
        &self,
        source: ChatId,
        since: MessageId,
        limit: usize,
    ) -> Result<Vec<CandidateMessage>> {
        Ok(self.inbox.fetch(source, since, limit))
    }

    async fn latest_message_id(&self, source: ChatId) -> Result<Option<MessageId>> {
        Ok(self.inbox.latest(source))
    }

    async fn resolve_sender(&self, msg: &CandidateMessage) -> Result<SenderKind> {
        if let Some(kind) = self.inbox.sender(&msg.sender) {
            return Ok(kind);
        }
        let id = match msg.sender {
            SenderRef::User(id) => id,
            SenderRef::Chat(chat) => chat.0,
            SenderRef::Unknown => return Ok(SenderKind::Unknown),
        };
        let chat = self
            .with_retry(|| self.bot.get_chat(teloxide::types::ChatId(id)))
            .await
            .map_err(|e| convert::lookup_error(&e, ChatId(id)))?;
        Ok(convert::chat_kind(&chat))
    }

    async fn send_message(
        &self,
        chat: ChatId,
        html: &str,
        suppress_link_preview: bool,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(suppress_link_preview)
            })
            .await
            .map_err(|e| convert::send_error(&e, chat))?;

        Ok(MessageRef {
            chat_id: chat,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn forward_message(&self, chat: ChatId, msg: &CandidateMessage) -> Result<MessageRef> {
        let sent = self
            .with_retry(|| {
                self.bot.forward_message(
                    Self::tg_chat(chat),
                    Self::tg_chat(msg.source),
                    Self::tg_msg_id(msg.id),
                )
            })
            .await
            .map_err(|e| convert::forward_error(&e, chat))?;

        Ok(MessageRef {
            chat_id: chat,
            message_id: MessageId(sent.id.0),
        })
    }

    /// Bots have no read receipts; this releases what was already fetched.
    async fn mark_read(&self, source: ChatId) -> Result<()> {
        self.inbox.mark_read(source);
        Ok(())
    }

    async fn subscribe(&self, sources: &[ChatId]) -> Result<mpsc::Receiver<CandidateMessage>> {
        Ok(self.inbox.subscribe(sources))
    }
}
