use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info};

use stella::bot::{schema, Command, Controller};
use stella::config::{BotConfig, MediaMode, Transport};
use stella::db::{self, PgDirectory, PgSubmissionStore};
use stella::localization::LocalizationManager;
use stella::logging::init_logging;
use stella::media::{ArchiveRelay, TelegramFileRelay};
use stella::services::MediaRelay;
use stella::session::SessionStorage;

/// How often expired sessions are swept
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env().context("Invalid configuration")?;
    init_logging(config.log_format);

    info!("Starting Stella Telegram Bot");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::init_database_schema(&pool).await?;

    let bot = Bot::new(&config.telegram_token);
    bot.set_my_commands(Command::bot_commands())
        .await
        .context("Failed to set bot commands")?;

    let media: Arc<dyn MediaRelay> = match &config.media {
        MediaMode::TelegramFile => Arc::new(TelegramFileRelay::new(bot.clone())),
        MediaMode::Archive(dir) => {
            info!(dir = %dir.display(), "Archiving photos locally");
            Arc::new(ArchiveRelay::new(bot.clone(), dir)?)
        }
    };

    let storage = SessionStorage::new(config.session_ttl);
    if storage.ttl().is_some() {
        tokio::spawn(sweep_sessions(Arc::clone(&storage)));
    }

    let localization = Arc::new(LocalizationManager::new()?);
    let controller = Arc::new(Controller::new(
        Arc::new(PgDirectory::new(pool.clone(), config.station_search_radius_m)),
        Arc::new(PgSubmissionStore::new(pool, Arc::clone(&localization))),
        media,
        localization,
        config.company_page_size,
    ));

    info!("Bot initialized, starting dispatcher");

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![controller, storage])
        .enable_ctrlc_handler()
        .build();

    match config.transport {
        Transport::Polling => dispatcher.dispatch().await,
        Transport::Webhook { url, port } => {
            info!(url = %url, port, "Receiving updates through webhook");
            let listener =
                webhooks::axum(bot, webhooks::Options::new(([0, 0, 0, 0], port).into(), url))
                    .await
                    .context("Failed to set up webhook")?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        }
    }

    Ok(())
}

async fn sweep_sessions(sessions: Arc<SessionStorage>) {
    let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let evicted = sessions.evict_expired().await;
        if evicted > 0 {
            debug!(evicted, "Expired sessions evicted");
        }
    }
}
