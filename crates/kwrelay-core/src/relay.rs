//! Per-message evaluation shared by polling and event mode.
//!
//! One candidate message is checked against every destination its source
//! feeds. Each matching destination gets exactly one delivery attempt; a
//! failure for one destination never affects the others.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    context::RelayContext,
    delivery::{DeliveryEngine, DeliveryOutcome},
    domain::{CandidateMessage, ChatId, SenderKind},
    routing::SourceEntry,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestinationResult {
    pub dest: ChatId,
    pub matched: Vec<String>,
    pub outcome: DeliveryOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub results: Vec<DestinationResult>,
}

impl RelayReport {
    pub fn delivered(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.is_delivered())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.delivered()
    }
}

#[derive(Clone)]
pub struct MessageRelay {
    ctx: Arc<RelayContext>,
    delivery: DeliveryEngine,
}

impl MessageRelay {
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        let delivery = DeliveryEngine::new(ctx.backend.clone());
        Self { ctx, delivery }
    }

    /// Look the message's source up in the routing table, then relay it.
    /// Messages from unrouted chats are ignored.
    pub async fn relay_routed(&self, msg: &CandidateMessage) -> RelayReport {
        let Some(source) = self.ctx.routing.source(msg.source) else {
            debug!(source = %msg.source, "message from unrouted chat ignored");
            return RelayReport::default();
        };
        self.relay(source, msg).await
    }

    pub async fn relay(&self, source: &SourceEntry, msg: &CandidateMessage) -> RelayReport {
        let mut report = RelayReport::default();
        if msg.outgoing {
            return report;
        }
        let text = msg.effective_text();
        if text.is_empty() {
            return report;
        }

        // Resolved on the first match only; most messages match nothing.
        let mut sender: Option<SenderKind> = None;
        let source_name = self.ctx.source_display_name(source.id);

        for (dest, keywords) in &source.destinations {
            let matched: Vec<String> = keywords
                .matches(text)
                .into_iter()
                .map(str::to_string)
                .collect();
            if matched.is_empty() {
                continue;
            }

            let who = match &sender {
                Some(s) => s.clone(),
                None => {
                    let resolved = self.resolve_sender(msg).await;
                    sender = Some(resolved.clone());
                    resolved
                }
            };

            let outcome = self
                .delivery
                .deliver(msg, *dest, &who, &source_name)
                .await;
            let dest_name = self.ctx.destination_display_name(*dest);
            match &outcome {
                DeliveryOutcome::Relayed => info!(
                    source = %source_name,
                    msg_id = msg.id.0,
                    "forwarded to {dest_name} (matched: {})",
                    matched.join(", ")
                ),
                DeliveryOutcome::CopiedWithHeader => info!(
                    source = %source_name,
                    msg_id = msg.id.0,
                    "copied to {dest_name} (matched: {})",
                    matched.join(", ")
                ),
                DeliveryOutcome::Failed(reason) => warn!(
                    source = %source_name,
                    msg_id = msg.id.0,
                    "delivery to {dest_name} failed: {reason}"
                ),
            }

            report.results.push(DestinationResult {
                dest: *dest,
                matched,
                outcome,
            });
        }

        report
    }

    async fn resolve_sender(&self, msg: &CandidateMessage) -> SenderKind {
        match self.ctx.backend.resolve_sender(msg).await {
            Ok(kind) => kind,
            Err(e) => {
                debug!(msg_id = msg.id.0, "sender lookup failed: {e}");
                SenderKind::Unknown
            }
        }
    }
}
