use std::fmt;

/// Chat id (numeric). Channels and supergroups use the `-100...` range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message id (numeric, monotonic per chat).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i32);

/// A stable reference to a sent or received message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Who sent a message, as far as the backend told us when it was fetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SenderRef {
    User(i64),
    Chat(ChatId),
    Unknown,
}

/// A message pulled from (or pushed by) a source chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateMessage {
    pub id: MessageId,
    pub source: ChatId,
    pub text: String,
    pub caption: Option<String>,
    pub sender: SenderRef,
    /// Sent by our own account; never matched.
    pub outgoing: bool,
}

impl CandidateMessage {
    /// Text used for matching: the body, or the media caption when the body is empty.
    pub fn effective_text(&self) -> &str {
        if !self.text.is_empty() {
            return &self.text;
        }
        self.caption.as_deref().unwrap_or("")
    }

    pub fn reference(&self) -> MessageRef {
        MessageRef {
            chat_id: self.source,
            message_id: self.id,
        }
    }
}

/// Resolved sender identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SenderKind {
    User {
        first: Option<String>,
        last: Option<String>,
        handle: Option<String>,
    },
    Channel {
        title: Option<String>,
    },
    Chat {
        title: Option<String>,
    },
    Unknown,
}

impl SenderKind {
    pub fn display_name(&self) -> String {
        match self {
            SenderKind::User {
                first,
                last,
                handle,
            } => match (non_blank(first), non_blank(last), non_blank(handle)) {
                (Some(f), Some(l), _) => format!("{f} {l}"),
                (Some(f), None, _) => f.to_string(),
                (None, _, Some(h)) => format!("@{h}"),
                _ => "Unknown User".to_string(),
            },
            SenderKind::Channel { title } | SenderKind::Chat { title } => non_blank(title)
                .map(str::to_string)
                .unwrap_or_else(|| "Unknown Channel/Chat".to_string()),
            SenderKind::Unknown => "Unknown Sender".to_string(),
        }
    }

    /// Public `@handle` (without the `@`); only users carry one in copy headers.
    pub fn handle(&self) -> Option<&str> {
        match self {
            SenderKind::User { handle, .. } => non_blank(handle),
            _ => None,
        }
    }
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.trim().is_empty())
}

/// Display data of a chat as returned by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityInfo {
    pub display_name: String,
    pub handle: Option<String>,
}

/// The authenticated account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub display_name: String,
    pub handle: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: Option<&str>, last: Option<&str>, handle: Option<&str>) -> SenderKind {
        SenderKind::User {
            first: first.map(str::to_string),
            last: last.map(str::to_string),
            handle: handle.map(str::to_string),
        }
    }

    #[test]
    fn user_display_name_prefers_full_name_then_first_then_handle() {
        assert_eq!(user(Some("Ada"), Some("Lovelace"), None).display_name(), "Ada Lovelace");
        assert_eq!(user(Some("Ada"), None, Some("ada")).display_name(), "Ada");
        assert_eq!(user(None, Some("Lovelace"), Some("ada")).display_name(), "@ada");
        assert_eq!(user(None, None, None).display_name(), "Unknown User");
    }

    #[test]
    fn chat_like_senders_use_title() {
        let ch = SenderKind::Channel {
            title: Some("Announcements".to_string()),
        };
        assert_eq!(ch.display_name(), "Announcements");
        assert_eq!(ch.handle(), None);
        assert_eq!(
            SenderKind::Chat { title: None }.display_name(),
            "Unknown Channel/Chat"
        );
        assert_eq!(SenderKind::Unknown.display_name(), "Unknown Sender");
    }

    #[test]
    fn effective_text_falls_back_to_caption() {
        let mut m = CandidateMessage {
            id: MessageId(1),
            source: ChatId(-1),
            text: String::new(),
            caption: Some("photo caption".to_string()),
            sender: SenderRef::Unknown,
            outgoing: false,
        };
        assert_eq!(m.effective_text(), "photo caption");
        m.text = "body".to_string();
        assert_eq!(m.effective_text(), "body");
        m.text.clear();
        m.caption = None;
        assert_eq!(m.effective_text(), "");
    }
}
