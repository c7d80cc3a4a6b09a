use std::{collections::HashMap, sync::Arc};

use crate::{
    backend::port::ChatBackend, config::Config, domain::ChatId, formatting::chat_link,
    routing::RoutingTable,
};

/// What startup learned about a chat it could reach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub display_name: String,
    pub link: String,
}

/// Display names and public links of the chats verified at startup.
#[derive(Clone, Debug, Default)]
pub struct ChatDirectory {
    entries: HashMap<ChatId, DirectoryEntry>,
}

impl ChatDirectory {
    pub fn insert(&mut self, chat: ChatId, display_name: String, handle: Option<&str>) {
        self.entries.insert(
            chat,
            DirectoryEntry {
                display_name,
                link: chat_link(chat, handle),
            },
        );
    }

    pub fn get(&self, chat: ChatId) -> Option<&DirectoryEntry> {
        self.entries.get(&chat)
    }
}

/// Process-wide state shared by the scheduler, delivery and liveness tasks.
///
/// Built once by startup and read-only afterwards.
pub struct RelayContext {
    pub cfg: Arc<Config>,
    pub backend: Arc<dyn ChatBackend>,
    pub routing: RoutingTable,
    pub directory: ChatDirectory,
}

impl RelayContext {
    pub fn new(
        cfg: Arc<Config>,
        backend: Arc<dyn ChatBackend>,
        routing: RoutingTable,
        directory: ChatDirectory,
    ) -> Self {
        Self {
            cfg,
            backend,
            routing,
            directory,
        }
    }

    /// Resolved chat title when known, else the configured source name.
    pub fn source_display_name(&self, id: ChatId) -> String {
        self.directory
            .get(id)
            .map(|e| e.display_name.clone())
            .unwrap_or_else(|| self.routing.source_name(id))
    }

    pub fn destination_display_name(&self, id: ChatId) -> String {
        self.directory
            .get(id)
            .map(|e| e.display_name.clone())
            .unwrap_or_else(|| self.routing.destination_name(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{config, two_destination_routes, FakeBackend};

    #[test]
    fn display_names_prefer_directory() {
        let cfg = Arc::new(config(two_destination_routes()));
        let routing = RoutingTable::from_config(&cfg.routes);
        let mut directory = ChatDirectory::default();
        directory.insert(ChatId(-1), "Market Feed".to_string(), Some("feed"));

        let ctx = RelayContext::new(cfg, Arc::new(FakeBackend::new()), routing, directory);
        assert_eq!(ctx.source_display_name(ChatId(-1)), "Market Feed");
        assert_eq!(ctx.destination_display_name(ChatId(-10)), "Alpha");
        assert_eq!(ctx.source_display_name(ChatId(-3)), "Chat -3");
        assert_eq!(
            ctx.directory.get(ChatId(-1)).map(|e| e.link.as_str()),
            Some("https://t.me/feed")
        );
    }
}
