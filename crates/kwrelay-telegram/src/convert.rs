//! Mapping between teloxide types and the relay's domain.

use teloxide::{
    types::{Chat, Message, User},
    RequestError,
};

use kwrelay_core::{
    domain::{CandidateMessage, ChatId, EntityInfo, MessageId, SenderKind, SenderRef},
    errors::Error,
};

pub(crate) fn candidate_from(msg: &Message, bot_id: Option<u64>) -> (CandidateMessage, SenderKind) {
    let (sender, kind) = if let Some(chat) = msg.sender_chat() {
        (SenderRef::Chat(ChatId(chat.id.0)), chat_kind(chat))
    } else if let Some(user) = msg.from() {
        (SenderRef::User(user.id.0 as i64), user_kind(user))
    } else if msg.chat.is_channel() {
        (SenderRef::Chat(ChatId(msg.chat.id.0)), chat_kind(&msg.chat))
    } else {
        (SenderRef::Unknown, SenderKind::Unknown)
    };

    let outgoing = match (msg.from(), bot_id) {
        (Some(user), Some(me)) => user.id.0 == me,
        _ => false,
    };

    let candidate = CandidateMessage {
        id: MessageId(msg.id.0),
        source: ChatId(msg.chat.id.0),
        text: msg.text().unwrap_or_default().to_string(),
        caption: msg.caption().map(str::to_string),
        sender,
        outgoing,
    };
    (candidate, kind)
}

pub(crate) fn user_kind(user: &User) -> SenderKind {
    SenderKind::User {
        first: Some(user.first_name.clone()).filter(|s| !s.is_empty()),
        last: user.last_name.clone(),
        handle: user.username.clone(),
    }
}

pub(crate) fn chat_kind(chat: &Chat) -> SenderKind {
    let title = chat.title().map(str::to_string);
    if chat.is_channel() {
        SenderKind::Channel { title }
    } else if chat.is_private() {
        SenderKind::User {
            first: chat.first_name().map(str::to_string),
            last: chat.last_name().map(str::to_string),
            handle: chat.username().map(str::to_string),
        }
    } else {
        SenderKind::Chat { title }
    }
}

pub(crate) fn entity_from(chat: &Chat) -> EntityInfo {
    let display_name = match chat_kind(chat) {
        SenderKind::User { .. } if chat.first_name().is_none() => format!("Chat {}", chat.id.0),
        SenderKind::Channel { title: None } | SenderKind::Chat { title: None } => {
            format!("Chat {}", chat.id.0)
        }
        kind => kind.display_name(),
    };
    EntityInfo {
        display_name,
        handle: chat.username().map(str::to_string),
    }
}

/// Telegram reports most failures only through the description text.
fn description(e: &RequestError) -> String {
    match e {
        RequestError::Api(api) => api.to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn forward_error(e: &RequestError, dest: ChatId) -> Error {
    classify_forward(&description(e), dest)
}

pub(crate) fn classify_forward(desc: &str, dest: ChatId) -> Error {
    let lower = desc.to_lowercase();
    if lower.contains("can't be forwarded")
        || lower.contains("protected content")
        || lower.contains("chat_forwards_restricted")
    {
        return Error::ForwardRestricted(desc.to_string());
    }
    if is_access_problem(&lower) {
        return Error::NotAccessible {
            chat: dest,
            reason: desc.to_string(),
        };
    }
    Error::External(format!("telegram error: {desc}"))
}

pub(crate) fn lookup_error(e: &RequestError, chat: ChatId) -> Error {
    match e {
        RequestError::Api(api) => Error::NotAccessible {
            chat,
            reason: api.to_string(),
        },
        other => Error::External(format!("telegram error: {other}")),
    }
}

pub(crate) fn send_error(e: &RequestError, dest: ChatId) -> Error {
    let desc = description(e);
    if is_access_problem(&desc.to_lowercase()) {
        return Error::NotAccessible {
            chat: dest,
            reason: desc,
        };
    }
    Error::External(format!("telegram error: {desc}"))
}

fn is_access_problem(lower: &str) -> bool {
    lower.contains("chat not found")
        || lower.contains("forbidden")
        || lower.contains("not enough rights")
        || lower.contains("kicked")
}
