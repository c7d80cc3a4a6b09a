//! Top-level relay lifecycle: startup, then the configured mode until shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    backend::port::ChatBackend,
    config::{Config, RelayMode},
    events::EventRelay,
    liveness::LivenessKeeper,
    scheduler::PollScheduler,
    startup, Result,
};

/// Run the relay until `cancel` fires.
///
/// Returns an error only for fatal conditions: a failed `connect`, or (event
/// mode) a subscription the backend could not open or closed on its own.
pub async fn run(
    cfg: Arc<Config>,
    backend: Arc<dyn ChatBackend>,
    cancel: CancellationToken,
) -> Result<()> {
    let startup::Startup {
        ctx,
        cursors,
        excluded,
        ..
    } = startup::prepare(cfg.clone(), backend).await?;
    let ctx = Arc::new(ctx);

    if cfg.startup_summary {
        startup::announce(&ctx, &excluded).await;
    }

    // Stops the keeper whichever way the relay loop ends.
    let background = cancel.child_token();
    let liveness = cfg.liveness_enabled.then(|| {
        LivenessKeeper::new(
            ctx.backend.clone(),
            ctx.routing.source_ids(),
            cfg.liveness_interval,
        )
        .spawn(background.clone())
    });

    let result = match cfg.mode {
        RelayMode::Poll => {
            PollScheduler::new(ctx.clone(), cursors)
                .run(cancel.clone())
                .await;
            Ok(())
        }
        RelayMode::Events => EventRelay::new(ctx.clone()).run(cancel.clone()).await,
    };

    background.cancel();
    if let Some(handle) = liveness {
        let _ = handle.await;
    }
    info!("relay shut down");
    result
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        domain::ChatId,
        test_support::{config, message, two_destination_routes, FakeBackend},
        Error,
    };

    fn reachable_fake() -> Arc<FakeBackend> {
        let fake = Arc::new(FakeBackend::new());
        for (id, name) in [(-10, "Alpha"), (-20, "Beta"), (-1, "Feed")] {
            fake.add_entity(id, name, None);
        }
        fake
    }

    #[tokio::test(start_paused = true)]
    async fn polls_from_latest_and_stops_on_cancel() {
        let fake = reachable_fake();
        fake.post(message(-1, 1, "foo before startup"));

        let mut cfg = config(two_destination_routes());
        cfg.liveness_enabled = true;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::new(cfg), fake.clone(), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        fake.post(message(-1, 2, "foo after startup"));
        tokio::time::sleep(Duration::from_secs(420)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        let forwards = fake.forwards();
        assert_eq!(forwards.len(), 1);
        assert_eq!(forwards[0].1, message(-1, 2, "").reference());
        assert_eq!(fake.sent().len(), 2);
        assert!(fake.marked_read().contains(&ChatId(-1)));
    }

    #[tokio::test]
    async fn unauthenticated_backend_is_fatal() {
        let fake = reachable_fake();
        fake.lose_auth();
        let cfg = Arc::new(config(two_destination_routes()));
        let err = run(cfg, fake, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
