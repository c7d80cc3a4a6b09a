use std::collections::HashMap;

use crate::domain::{ChatId, MessageId};

/// Where a source's cursor starts when the process boots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorStart {
    /// Seed from the newest existing message so history is not replayed.
    #[default]
    Latest,
    /// Start at zero and evaluate everything the backend still returns.
    Zero,
}

impl CursorStart {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "latest" | "now" => Some(Self::Latest),
            "zero" | "all" | "replay" => Some(Self::Zero),
            _ => None,
        }
    }
}

/// Per-source "highest evaluated message id".
///
/// Cursors only move forward. A message is evaluated at most once: the
/// scheduler advances past it whether or not its deliveries succeeded.
#[derive(Clone, Debug, Default)]
pub struct CursorStore {
    cursors: HashMap<ChatId, MessageId>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: ChatId) -> MessageId {
        self.cursors.get(&source).copied().unwrap_or_default()
    }

    /// Raise the cursor to `id`; lower ids are ignored.
    pub fn advance(&mut self, source: ChatId, id: MessageId) {
        let cur = self.cursors.entry(source).or_default();
        if id > *cur {
            *cur = id;
        }
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
