//! Update dispatcher: receives `message` and `channel_post` updates and feeds
//! them into the inbox.

use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*,
    update_listeners::Polling,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{convert::candidate_from, inbox::Inbox};

struct UpdatePump {
    inbox: Arc<Inbox>,
    bot_id: u64,
}

async fn on_message(msg: Message, pump: Arc<UpdatePump>) -> ResponseResult<()> {
    let (candidate, sender) = candidate_from(&msg, Some(pump.bot_id));
    debug!(
        chat = %candidate.source,
        msg_id = candidate.id.0,
        "update buffered"
    );
    pump.inbox.push(candidate, sender).await;
    Ok(())
}

/// Start long polling in the background until `cancel` fires.
///
/// With `drop_pending` the backlog Telegram kept while the relay was offline
/// is discarded instead of replayed.
pub fn spawn_dispatcher(
    bot: Bot,
    bot_id: u64,
    inbox: Arc<Inbox>,
    drop_pending: bool,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let pump = Arc::new(UpdatePump { inbox, bot_id });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_channel_post().endpoint(on_message));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![pump])
        .default_handler(|_: Arc<Update>| async {})
        .build();

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        cancel.cancelled().await;
        match shutdown.shutdown() {
            Ok(done) => done.await,
            Err(e) => warn!("dispatcher shutdown: {e}"),
        }
    });

    tokio::spawn(async move {
        let mut polling = Polling::builder(bot);
        if drop_pending {
            polling = polling.drop_pending_updates();
        }
        info!("receiving telegram updates");
        dispatcher
            .dispatch_with_listener(
                polling.build(),
                LoggingErrorHandler::with_custom_text("telegram update listener error"),
            )
            .await;
        info!("telegram dispatcher stopped");
    })
}
