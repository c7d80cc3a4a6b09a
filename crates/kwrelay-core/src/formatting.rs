//! Formatting utilities for Telegram HTML parse mode.

use crate::domain::ChatId;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `<a href="url">text</a>` with both parts escaped.
pub fn link(url: &str, text: &str) -> String {
    format!(r#"<a href="{}">{}</a>"#, escape_html(url), escape_html(text))
}

/// Public link to a chat: by handle when it has one, otherwise the
/// `t.me/c/...` form for `-100` supergroup/channel ids.
pub fn chat_link(chat: ChatId, handle: Option<&str>) -> String {
    if let Some(h) = handle.filter(|h| !h.is_empty()) {
        return format!("https://t.me/{h}");
    }
    let raw = chat.0.to_string();
    match raw.strip_prefix("-100") {
        Some(internal) => format!("https://t.me/c/{internal}"),
        None => format!("https://t.me/{raw}"),
    }
}
