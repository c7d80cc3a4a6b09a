use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use kwrelay_core::{backend, config::Config, routing::RoutingTable, runtime};
use kwrelay_telegram::TelegramBackend;

mod health;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kwrelay_core::logging::init("kwrelay")?;

    let cfg = Arc::new(Config::load().context("loading configuration")?);
    info!(
        "loaded {} destinations from {}",
        cfg.routes.destinations.len(),
        cfg.routes_file.display()
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    if cfg.health_enabled {
        let addr = format!("0.0.0.0:{}", cfg.health_port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind health endpoint on {addr}"))?;
        info!("health endpoint listening on {addr}");
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(listener, cancel).await {
                error!("health endpoint failed: {e}");
            }
        });
    }

    let sources = RoutingTable::from_config(&cfg.routes).source_ids();
    let telegram = Arc::new(TelegramBackend::from_token(
        &cfg.telegram_bot_token,
        sources,
        cfg.cursor_start,
        cancel.clone(),
    ));
    let chat = backend::layered(telegram, cfg.backend_timeout);

    let result = runtime::run(cfg, chat, cancel.clone()).await;
    cancel.cancel();
    result.context("relay stopped with an error")
}

async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                  _ = tokio::signal::ctrl_c() => {}
                  _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown requested");
    cancel.cancel();
}
