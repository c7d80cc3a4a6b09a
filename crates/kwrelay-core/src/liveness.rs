//! Periodic low-cost activity that keeps the backend session from idling out.
//!
//! Failures here are expected noise (rate limits, chats that disappeared) and
//! never affect relaying; only every `ERROR_LOG_SAMPLE`th one is logged.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{backend::port::ChatBackend, domain::ChatId, scheduler::wait_or_cancel};

const ERROR_LOG_SAMPLE: u64 = 100;

pub struct LivenessKeeper {
    backend: Arc<dyn ChatBackend>,
    sources: Vec<ChatId>,
    interval: Duration,
    failures: u64,
}

impl LivenessKeeper {
    pub fn new(backend: Arc<dyn ChatBackend>, sources: Vec<ChatId>, interval: Duration) -> Self {
        Self {
            backend,
            sources,
            interval,
            failures: 0,
        }
    }

    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "liveness keeper started ({} sources every {}s)",
                self.sources.len(),
                self.interval.as_secs()
            );
            while wait_or_cancel(&cancel, self.interval).await {
                self.tick().await;
            }
            debug!("liveness keeper stopped");
        })
    }

    async fn tick(&mut self) {
        for source in &self.sources {
            if let Err(e) = self.backend.mark_read(*source).await {
                self.failures += 1;
                if should_log(self.failures) {
                    debug!(
                        source = %source,
                        failures = self.failures,
                        "liveness ping failed: {e}"
                    );
                }
            }
        }
    }
}

fn should_log(failures: u64) -> bool {
    failures % ERROR_LOG_SAMPLE == 1
}
