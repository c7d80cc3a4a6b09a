//! Polling scheduler.
//!
//! Each cycle visits every routed source once, fetches what arrived after the
//! source's cursor (oldest first, at most `page_limit` messages), relays
//! matches and then advances the cursor past everything it saw. Anything
//! beyond the page limit is picked up by the next cycle.
//!
//! Failures stay local to the source that produced them. A cycle only fails
//! as a whole when the backend session is gone or no source could be polled
//! at all; the scheduler then waits `error_cooldown` instead of the normal
//! interval and tries again.

use std::{sync::Arc, time::Duration};

use chrono::Local;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    context::RelayContext,
    cursor::CursorStore,
    relay::MessageRelay,
    routing::SourceEntry,
    Error, Result,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sources: usize,
    pub failed_sources: usize,
    pub fetched: usize,
    pub delivered: usize,
    pub failed_deliveries: usize,
}

#[derive(Debug, Default)]
struct SourceReport {
    fetched: usize,
    delivered: usize,
    failed: usize,
}

pub struct PollScheduler {
    ctx: Arc<RelayContext>,
    relay: MessageRelay,
    cursors: CursorStore,
}

impl PollScheduler {
    pub fn new(ctx: Arc<RelayContext>, cursors: CursorStore) -> Self {
        let relay = MessageRelay::new(ctx.clone());
        Self {
            ctx,
            relay,
            cursors,
        }
    }

    pub fn cursors(&self) -> &CursorStore {
        &self.cursors
    }

    /// Run cycles until `cancel` fires. Cancellation is observed between
    /// cycles and during the wait, never in the middle of a cycle.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "polling {} sources every {} minutes",
            self.ctx.routing.sources_index().len(),
            self.ctx.cfg.interval_minutes()
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let wait = match self.run_cycle().await {
                Ok(report) => {
                    debug!(?report, "cycle complete");
                    self.ctx.cfg.poll_interval
                }
                Err(e) => {
                    error!(
                        "{e}; retrying in {}s",
                        self.ctx.cfg.error_cooldown.as_secs()
                    );
                    self.ctx.cfg.error_cooldown
                }
            };

            if !wait_or_cancel(&cancel, wait).await {
                break;
            }
        }

        info!("polling stopped");
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        info!(
            "checking for new messages at {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        let ctx = self.ctx.clone();
        let mut report = CycleReport::default();
        let mut last_error: Option<Error> = None;

        for source in ctx.routing.sources_index().values() {
            report.sources += 1;
            match self.poll_source(source).await {
                Ok(r) => {
                    report.fetched += r.fetched;
                    report.delivered += r.delivered;
                    report.failed_deliveries += r.failed;
                }
                Err(e) if e.is_session_loss() => return Err(e),
                Err(e) => {
                    warn!(source = %source.name, "error checking source: {e}");
                    report.failed_sources += 1;
                    last_error = Some(e);
                }
            }
        }

        if report.sources > 0 && report.failed_sources == report.sources {
            let last = last_error
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(Error::Cycle(format!(
                "all {} sources failed; last error: {last}",
                report.sources
            )));
        }

        Ok(report)
    }

    async fn poll_source(&mut self, source: &SourceEntry) -> Result<SourceReport> {
        let backend = &self.ctx.backend;
        let since = self.cursors.get(source.id);
        let messages = backend
            .fetch_messages(source.id, since, self.ctx.cfg.page_limit)
            .await?;

        let mut report = SourceReport::default();
        if messages.is_empty() {
            return Ok(report);
        }
        report.fetched = messages.len();
        info!(
            source = %source.name,
            "found {} new messages",
            messages.len()
        );

        let mut newest = since;
        for msg in &messages {
            newest = newest.max(msg.id);
            if msg.outgoing {
                continue;
            }
            let r = self.relay.relay(source, msg).await;
            report.delivered += r.delivered();
            report.failed += r.failed();
        }

        // Past every message seen, including skipped and failed ones.
        self.cursors.advance(source.id, newest);

        if let Err(e) = backend.mark_read(source.id).await {
            debug!(source = %source.name, "mark read failed: {e}");
        }

        Ok(report)
    }
}

/// Sleep for `wait`; `false` when cancelled first.
pub(crate) async fn wait_or_cancel(cancel: &CancellationToken, wait: Duration) -> bool {
    tokio::select! {
      _ = cancel.cancelled() => false,
      _ = sleep(wait) => true,
    }
}
