use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{config::RoutesConfig, domain::ChatId, matcher::KeywordSet};

/// One monitored source and every destination it feeds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceEntry {
    pub id: ChatId,
    pub name: String,
    pub destinations: BTreeMap<ChatId, KeywordSet>,
}

/// Static source -> {destination -> keywords} index built from the routes file.
///
/// A source listed under several destinations is merged into a single entry,
/// so a polling cycle visits it once.
#[derive(Clone, Debug, Default)]
pub struct RoutingTable {
    sources: BTreeMap<ChatId, SourceEntry>,
    source_names: HashMap<ChatId, String>,
    destination_names: HashMap<ChatId, String>,
    destinations: BTreeSet<ChatId>,
}

impl RoutingTable {
    pub fn from_config(routes: &RoutesConfig) -> Self {
        let mut table = Self::default();

        for (dest_name, dest) in &routes.destinations {
            let dest_id = ChatId(dest.destination);
            table.destinations.insert(dest_id);
            table
                .destination_names
                .entry(dest_id)
                .or_insert_with(|| dest_name.clone());

            for (source_name, source) in &dest.sources {
                let source_id = ChatId(source.source);
                table
                    .source_names
                    .entry(source_id)
                    .or_insert_with(|| source_name.clone());

                let entry = table
                    .sources
                    .entry(source_id)
                    .or_insert_with(|| SourceEntry {
                        id: source_id,
                        name: source_name.clone(),
                        destinations: BTreeMap::new(),
                    });
                entry
                    .destinations
                    .insert(dest_id, KeywordSet::new(source.keywords.iter().cloned()));
            }
        }

        table
    }

    pub fn sources_index(&self) -> &BTreeMap<ChatId, SourceEntry> {
        &self.sources
    }

    pub fn source(&self, id: ChatId) -> Option<&SourceEntry> {
        self.sources.get(&id)
    }

    pub fn source_ids(&self) -> Vec<ChatId> {
        self.sources.keys().copied().collect()
    }

    /// Active destination ids, sorted.
    pub fn destination_ids(&self) -> Vec<ChatId> {
        self.destinations.iter().copied().collect()
    }

    /// Sources (with their keywords) that feed `dest`.
    pub fn sources_for(&self, dest: ChatId) -> Vec<(&SourceEntry, &KeywordSet)> {
        self.sources
            .values()
            .filter_map(|s| s.destinations.get(&dest).map(|kws| (s, kws)))
            .collect()
    }

    pub fn destination_name(&self, id: ChatId) -> String {
        self.destination_names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Chat {id}"))
    }

    pub fn source_name(&self, id: ChatId) -> String {
        self.source_names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("Chat {id}"))
    }

    /// Drop a source from the active set (names stay resolvable for reporting).
    pub fn exclude_source(&mut self, id: ChatId) {
        self.sources.remove(&id);
    }

    /// Drop `id` and every binding to it; sources left without a destination
    /// are dropped too. The name stays resolvable for reporting.
    pub fn exclude_destination(&mut self, id: ChatId) {
        self.destinations.remove(&id);
        for entry in self.sources.values_mut() {
            entry.destinations.remove(&id);
        }
        self.sources.retain(|_, e| !e.destinations.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
