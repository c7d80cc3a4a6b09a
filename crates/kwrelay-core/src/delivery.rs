//! Relay-with-fallback delivery.
//!
//! Delivery is best-effort and at-most-once: a failed delivery is logged and
//! reported, never retried (the scheduler advances the cursor regardless).

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    backend::port::ChatBackend,
    domain::{CandidateMessage, ChatId, SenderKind},
    errors::Error,
    formatting::escape_html,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Native forward succeeded.
    Relayed,
    /// Forward was restricted; a reconstructed copy was sent instead.
    CopiedWithHeader,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        !matches!(self, DeliveryOutcome::Failed(_))
    }
}

#[derive(Clone)]
pub struct DeliveryEngine {
    backend: Arc<dyn ChatBackend>,
}

impl DeliveryEngine {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub async fn deliver(
        &self,
        msg: &CandidateMessage,
        dest: ChatId,
        sender: &SenderKind,
        source_display_name: &str,
    ) -> DeliveryOutcome {
        let forward_err = match self.backend.forward_message(dest, msg).await {
            Ok(_) => return DeliveryOutcome::Relayed,
            Err(e) => e,
        };

        let reason = match forward_err {
            Error::ForwardRestricted(reason) => reason,
            other => {
                warn!(dest = %dest, msg_id = msg.id.0, "forward failed: {other}");
                return DeliveryOutcome::Failed(other.to_string());
            }
        };

        info!(dest = %dest, msg_id = msg.id.0, "forward restricted ({reason}), sending copy");
        let copy = build_copy(msg, sender, source_display_name);
        match self.backend.send_message(dest, &copy, true).await {
            Ok(_) => DeliveryOutcome::CopiedWithHeader,
            Err(e) => {
                warn!(dest = %dest, msg_id = msg.id.0, "copy fallback failed: {e}");
                DeliveryOutcome::Failed(format!("copy failed after restricted forward: {e}"))
            }
        }
    }
}

/// Header line naming sender and source, blank line, then the original text
/// (or caption). HTML parse mode.
pub fn build_copy(msg: &CandidateMessage, sender: &SenderKind, source_display_name: &str) -> String {
    let name = escape_html(&sender.display_name());
    let source = escape_html(source_display_name);
    let header = match sender.handle() {
        Some(h) => format!("<b>From {name} (@{}) in {source}:</b>", escape_html(h)),
        None => format!("<b>From {name} in {source}:</b>"),
    };
    format!("{header}\n\n{}", escape_html(msg.effective_text()))
}
