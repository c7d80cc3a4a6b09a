//! Event-driven relay mode.
//!
//! Messages pushed by the backend are relayed as they arrive, one task per
//! message so a slow destination never holds up the stream. Backends may
//! redeliver a message (reconnects, overlapping updates); a bounded window of
//! recently seen `(source, id)` pairs keeps those from being relayed twice.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    context::RelayContext,
    domain::{CandidateMessage, ChatId, MessageId},
    relay::{MessageRelay, RelayReport},
    Error, Result,
};

const RECENT_WINDOW: usize = 4096;

/// Fixed-size memory of recently relayed messages, oldest evicted first.
#[derive(Debug)]
struct RecentMessages {
    order: VecDeque<(ChatId, MessageId)>,
    seen: HashSet<(ChatId, MessageId)>,
    capacity: usize,
}

impl RecentMessages {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// `true` the first time a key is seen.
    fn insert(&mut self, key: (ChatId, MessageId)) -> bool {
        if !self.seen.insert(key) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }
}

pub struct EventRelay {
    ctx: Arc<RelayContext>,
    relay: MessageRelay,
    recent: RecentMessages,
}

impl EventRelay {
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        let relay = MessageRelay::new(ctx.clone());
        Self {
            ctx,
            relay,
            recent: RecentMessages::new(RECENT_WINDOW),
        }
    }

    /// Subscribe to every routed source and relay until `cancel` fires.
    /// In-flight deliveries are awaited before returning. The backend closing
    /// the stream on its own is an error.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let sources = self.ctx.routing.source_ids();
        let mut rx = self.ctx.backend.subscribe(&sources).await?;
        info!("listening for new messages in {} sources", sources.len());

        let mut tasks: JoinSet<RelayReport> = JoinSet::new();
        let mut stream_closed = false;
        loop {
            tokio::select! {
              _ = cancel.cancelled() => break,
              incoming = rx.recv() => {
                let Some(msg) = incoming else {
                  warn!("backend closed the message stream");
                  stream_closed = true;
                  break;
                };
                if !self.accept(&msg) {
                  continue;
                }
                let relay = self.relay.clone();
                tasks.spawn(async move { relay.relay_routed(&msg).await });
              }
              Some(done) = tasks.join_next(), if !tasks.is_empty() => {
                log_finished(done);
              }
            }
        }

        if !tasks.is_empty() {
            info!("waiting for {} in-flight deliveries", tasks.len());
        }
        while let Some(done) = tasks.join_next().await {
            log_finished(done);
        }
        info!("event relay stopped");
        if stream_closed {
            return Err(Error::External("message stream closed".to_string()));
        }
        Ok(())
    }

    fn accept(&mut self, msg: &CandidateMessage) -> bool {
        if msg.outgoing || self.ctx.routing.source(msg.source).is_none() {
            return false;
        }
        if !self.recent.insert((msg.source, msg.id)) {
            debug!(source = %msg.source, msg_id = msg.id.0, "duplicate delivery ignored");
            return false;
        }
        true
    }
}

fn log_finished(done: std::result::Result<RelayReport, tokio::task::JoinError>) {
    match done {
        Ok(report) if !report.results.is_empty() => {
            debug!(
                delivered = report.delivered(),
                failed = report.failed(),
                "message relayed"
            );
        }
        Ok(_) => {}
        Err(e) => warn!("relay task failed: {e}"),
    }
}
