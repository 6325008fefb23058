mod backoff;
mod bot;
mod config;
mod error;
mod handler;
mod platform;
mod poller;
mod scheduler;
mod users;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Bot;
use crate::config::Config;
use crate::handler::Dispatcher;
use crate::platform::telegram::HttpTransport;
use crate::platform::Transport;
use crate::poller::UpdatePoller;
use crate::scheduler::broadcast::Broadcaster;
use crate::scheduler::Scheduler;
use crate::users::UserDirectory;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pollbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  API: {}", config.telegram.api_base_url);
    info!("  Poll timeout: {}s", config.telegram.poll_timeout_secs);
    info!(
        "  Backoff: {}s..{}s",
        config.backoff.initial_secs, config.backoff.max_secs
    );
    if config.broadcast.enabled {
        info!("  Broadcast every {}s", config.broadcast.interval_secs);
    } else {
        info!("  Broadcast disabled");
    }

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
        &config.telegram.api_base_url,
        &config.telegram.bot_token,
        config.send_timeout(),
    ));
    let bot = Bot::new(transport.clone());
    let users = UserDirectory::new();
    let shutdown = CancellationToken::new();

    // Broadcast loop
    let mut scheduler = Scheduler::new(shutdown.clone());
    if config.broadcast.enabled {
        let broadcaster = Broadcaster::new(
            bot.clone(),
            users.clone(),
            config.broadcast.text.clone(),
            shutdown.clone(),
        );
        scheduler
            .add_interval_job(config.broadcast_interval(), "broadcast", move || {
                let broadcaster = broadcaster.clone();
                Box::pin(async move {
                    broadcaster.run_cycle().await;
                })
            })
            .context("Failed to schedule broadcast")?;
    }

    // Poll loop
    let dispatcher = Dispatcher::new(bot, users.clone());
    let mut poller = UpdatePoller::new(
        transport,
        config.poll_settings(),
        config.backoff(),
        shutdown.clone(),
    );
    let poll_task = tokio::spawn(async move {
        poller.run(&dispatcher).await;
    });

    info!("Bot is running, press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Shutting down...");
    shutdown.cancel();

    scheduler.shutdown().await;
    poll_task.await.context("Poll loop ended abnormally")?;

    info!("Stopped with {} registered user(s)", users.len().await);
    Ok(())
}
