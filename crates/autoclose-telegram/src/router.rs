use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use autoclose_core::{
    activity::ActivityListener,
    command::AutoCloseCommand,
    config::Config,
    domain::ScopeId,
    lifecycle::Lifecycle,
    messaging::{
        port::ThreadNotifier,
        throttled::{ThrottleConfig, ThrottledNotifier},
    },
    store::EntryStore,
    sweep::SweepEngine,
    tickets::JsonTicketTable,
};

use crate::handlers;
use crate::TelegramNotifier;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub listener: Arc<ActivityListener>,
    pub command: Arc<AutoCloseCommand>,
    pub bot_user_id: u64,
}

/// Run the bot until Ctrl-C: sweep loop in the background, long polling in
/// the foreground.
pub async fn run_polling(cfg: Arc<Config>, store: Arc<dyn EntryStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let tickets = Arc::new(JsonTicketTable::new(cfg.tickets_file.clone()));

    // Throttle so a sweep warning many threads at once does not hit 429s. The
    // adapter still retries once on RetryAfter.
    let raw_notifier: Arc<dyn ThreadNotifier> =
        Arc::new(TelegramNotifier::new(bot.clone(), cfg.inbox_chat_id));
    let notifier: Arc<dyn ThreadNotifier> = Arc::new(ThrottledNotifier::new(
        raw_notifier,
        ThrottleConfig::default(),
    ));

    // A corrupt state file is fatal here; the error tells the operator to delete it.
    let lifecycle = Lifecycle::load(
        cfg.autoclose.clone(),
        store,
        tickets.clone(),
        notifier.clone(),
    )?;

    let me = bot.get_me().await?;
    info!("AutoClose started: @{}", me.username());
    info!("Inbox chat: {}", cfg.inbox_chat_id);
    info!("Ticket table: {}", cfg.tickets_file.display());

    let sweep = SweepEngine::new(
        lifecycle.clone(),
        tickets.clone(),
        notifier.clone(),
        tickets.clone(),
        me.id.0.to_string(),
    );
    if !sweep.start().await {
        warn!("Sweep loop was already running");
    }

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        listener: Arc::new(ActivityListener::new(
            lifecycle.clone(),
            tickets.clone(),
            ScopeId(cfg.inbox_chat_id),
            cfg.command_prefix.clone(),
        )),
        command: Arc::new(AutoCloseCommand::new(
            lifecycle,
            tickets,
            notifier,
            cfg.command_prefix.clone(),
        )),
        bot_user_id: me.id.0,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Shutting down");
    sweep.stop().await;

    Ok(())
}
