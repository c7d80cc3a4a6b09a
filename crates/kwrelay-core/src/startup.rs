//! Startup: authenticate, verify every configured chat, seed cursors and
//! announce what is being monitored.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    backend::port::ChatBackend,
    config::{Config, RelayMode},
    context::{ChatDirectory, RelayContext},
    cursor::{CursorStart, CursorStore},
    domain::{ChatId, EntityInfo, MessageId, SessionInfo},
    formatting::{chat_link, escape_html, link},
    routing::RoutingTable,
    Result,
};

/// Chats that were configured but could not be reached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Exclusions {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
}

pub struct Startup {
    pub session: SessionInfo,
    pub ctx: RelayContext,
    pub cursors: CursorStore,
    pub excluded: Exclusions,
}

/// Connect and verify. Only a failed `connect` is fatal; an unreachable chat
/// is logged and dropped from routing.
pub async fn prepare(cfg: Arc<Config>, backend: Arc<dyn ChatBackend>) -> Result<Startup> {
    let session = backend.connect().await?;
    match &session.handle {
        Some(h) => info!("signed in as {} (@{h})", session.display_name),
        None => info!("signed in as {}", session.display_name),
    }

    let mut routing = RoutingTable::from_config(&cfg.routes);
    let mut directory = ChatDirectory::default();
    let mut cursors = CursorStore::new();
    let mut excluded = Exclusions::default();

    for dest in routing.destination_ids() {
        match backend.resolve_entity(dest).await {
            Ok(info) => {
                info!("destination verified: {} ({dest})", info.display_name);
                directory.insert(dest, info.display_name, info.handle.as_deref());
            }
            Err(e) => {
                let name = routing.destination_name(dest);
                warn!("cannot access destination {name} ({dest}): {e}");
                excluded.destinations.push(name);
                routing.exclude_destination(dest);
            }
        }
    }

    for source in routing.source_ids() {
        match verify_source(backend.as_ref(), source, cfg.cursor_start).await {
            Ok((info, latest)) => {
                info!("source verified: {} ({source})", info.display_name);
                directory.insert(source, info.display_name, info.handle.as_deref());
                if let Some(id) = latest {
                    cursors.advance(source, id);
                }
            }
            Err(e) => {
                let name = routing.source_name(source);
                warn!("cannot access source {name} ({source}): {e}");
                excluded.sources.push(name);
                routing.exclude_source(source);
            }
        }
    }

    if routing.is_empty() {
        warn!("no accessible sources; nothing will be relayed");
    }

    Ok(Startup {
        session,
        ctx: RelayContext::new(cfg, backend, routing, directory),
        cursors,
        excluded,
    })
}

async fn verify_source(
    backend: &dyn ChatBackend,
    source: ChatId,
    start: CursorStart,
) -> Result<(EntityInfo, Option<MessageId>)> {
    let info = backend.resolve_entity(source).await?;
    let latest = match start {
        CursorStart::Latest => backend.latest_message_id(source).await?,
        CursorStart::Zero => None,
    };
    Ok((info, latest))
}

/// Send the summary to every reachable destination. Failures are logged only.
pub async fn announce(ctx: &RelayContext, excluded: &Exclusions) {
    for dest in ctx.routing.destination_ids() {
        let html = summary_html(ctx, dest, excluded);
        match ctx.backend.send_message(dest, &html, true).await {
            Ok(_) => info!(
                "startup summary sent to {}",
                ctx.destination_display_name(dest)
            ),
            Err(e) => warn!(
                "failed to send startup summary to {}: {e}",
                ctx.destination_display_name(dest)
            ),
        }
    }
}

/// Summary for one destination: the sources that feed it with their links
/// and keywords, plus anything that was excluded.
pub fn summary_html(ctx: &RelayContext, dest: ChatId, excluded: &Exclusions) -> String {
    let sources = ctx.routing.sources_for(dest);

    let cadence = match ctx.cfg.mode {
        RelayMode::Poll => format!("every <b>{} minutes</b>", ctx.cfg.interval_minutes()),
        RelayMode::Events => "as messages arrive".to_string(),
    };

    let mut out = String::new();
    out.push_str("🤖 <b>Keyword relay is online</b>\n\n");
    out.push_str(&format!(
        "Monitoring <b>{} sources</b> {cadence}.\n",
        sources.len()
    ));
    out.push_str("Messages containing your keywords are forwarded here.\n\n");

    out.push_str("📝 <b>Sources:</b>\n");
    for (source, keywords) in &sources {
        let url = ctx
            .directory
            .get(source.id)
            .map(|e| e.link.clone())
            .unwrap_or_else(|| chat_link(source.id, None));
        let kws: Vec<String> = keywords.original().iter().map(|k| escape_html(k)).collect();
        out.push_str(&format!(
            "• {} ({} keywords): {}\n",
            link(&url, &ctx.source_display_name(source.id)),
            keywords.len(),
            kws.join(", ")
        ));
    }

    if !excluded.sources.is_empty() {
        out.push_str(&format!(
            "\n⚠️ <b>Inaccessible sources:</b> {}\n",
            escape_names(&excluded.sources)
        ));
    }
    if !excluded.destinations.is_empty() {
        out.push_str(&format!(
            "\n⚠️ <b>Inaccessible destinations:</b> {}\n",
            escape_names(&excluded.destinations)
        ));
    }

    out.trim_end().to_string()
}

fn escape_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| escape_html(n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RoutesConfig,
        test_support::{config, message, two_destination_routes, FakeBackend},
        Error,
    };

    fn routes_with_private_source() -> RoutesConfig {
        RoutesConfig::from_json(
            r#"{"destinations": {
                "Alpha": {"destination": -10, "sources": {
                    "Feed": {"source": -1, "keywords": ["foo", "Will List"]},
                    "Private": {"source": -2, "keywords": ["foo"]}
                }},
                "Gone": {"destination": -30, "sources": {
                    "Orphan": {"source": -3, "keywords": ["foo"]}
                }}
            }}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn excludes_unreachable_chats_and_seeds_cursors() {
        let fake = Arc::new(FakeBackend::new());
        fake.add_entity(-10, "Alpha Room", None);
        fake.add_entity(-1, "Market Feed", Some("feed"));
        fake.add_entity(-3, "Orphan Feed", None);
        fake.post(message(-1, 41, "old news"));
        fake.post(message(-1, 42, "older news"));

        let cfg = Arc::new(config(routes_with_private_source()));
        let startup = prepare(cfg, fake.clone()).await.unwrap();

        assert_eq!(startup.session.display_name, "Relay Bot");
        assert_eq!(startup.excluded.destinations, vec!["Gone".to_string()]);
        assert_eq!(startup.excluded.sources, vec!["Private".to_string()]);
        assert_eq!(startup.ctx.routing.source_ids(), vec![ChatId(-1)]);
        assert_eq!(startup.ctx.routing.destination_ids(), vec![ChatId(-10)]);
        assert_eq!(startup.cursors.get(ChatId(-1)), MessageId(42));
        assert_eq!(startup.ctx.source_display_name(ChatId(-1)), "Market Feed");
    }

    #[tokio::test]
    async fn replay_from_zero_leaves_cursors_unset() {
        let fake = Arc::new(FakeBackend::new());
        for (id, name) in [(-10, "Alpha"), (-20, "Beta"), (-1, "Feed")] {
            fake.add_entity(id, name, None);
        }
        fake.post(message(-1, 42, "foo"));

        let mut cfg = config(two_destination_routes());
        cfg.cursor_start = CursorStart::Zero;
        let startup = prepare(Arc::new(cfg), fake.clone()).await.unwrap();
        assert_eq!(startup.cursors.get(ChatId(-1)), MessageId(0));
    }

    #[tokio::test]
    async fn connect_failure_is_fatal() {
        let fake = Arc::new(FakeBackend::new());
        fake.lose_auth();
        let cfg = Arc::new(config(two_destination_routes()));
        let err = prepare(cfg, fake).await.err().unwrap();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn announces_to_reachable_destinations() {
        let fake = Arc::new(FakeBackend::new());
        fake.add_entity(-10, "Alpha Room", None);
        fake.add_entity(-1, "Market Feed", Some("feed"));
        fake.add_entity(-3, "Orphan Feed", None);

        let cfg = Arc::new(config(routes_with_private_source()));
        let startup = prepare(cfg, fake.clone()).await.unwrap();
        announce(&startup.ctx, &startup.excluded).await;

        let sent = fake.sent();
        assert_eq!(sent.len(), 1);
        let (dest, html, no_preview) = &sent[0];
        assert_eq!(*dest, ChatId(-10));
        assert!(*no_preview);
        assert!(html.contains("Monitoring <b>1 sources</b> every <b>7 minutes</b>"));
        assert!(html.contains(r#"<a href="https://t.me/feed">Market Feed</a> (2 keywords): foo, Will List"#));
        assert!(html.contains("<b>Inaccessible sources:</b> Private"));
        assert!(html.contains("<b>Inaccessible destinations:</b> Gone"));
    }

    #[tokio::test]
    async fn failed_announcement_is_not_fatal() {
        let fake = Arc::new(FakeBackend::new());
        for (id, name) in [(-10, "Alpha"), (-20, "Beta"), (-1, "Feed")] {
            fake.add_entity(id, name, None);
        }
        fake.fail_sends_to(-10);

        let cfg = Arc::new(config(two_destination_routes()));
        let startup = prepare(cfg, fake.clone()).await.unwrap();
        announce(&startup.ctx, &startup.excluded).await;

        let sent = fake.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChatId(-20));
    }

    #[test]
    fn event_mode_summary_has_no_interval() {
        let mut cfg = config(two_destination_routes());
        cfg.mode = RelayMode::Events;
        let cfg = Arc::new(cfg);
        let routing = RoutingTable::from_config(&cfg.routes);
        let ctx = RelayContext::new(
            cfg,
            Arc::new(FakeBackend::new()),
            routing,
            ChatDirectory::default(),
        );

        let html = summary_html(&ctx, ChatId(-20), &Exclusions::default());
        assert!(html.contains("as messages arrive"));
        assert!(html.contains(r#"<a href="https://t.me/-1">Feed</a> (1 keywords): bar baz"#));
        assert!(!html.contains("Inaccessible"));
    }
}
