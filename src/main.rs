use anyhow::Result;
use std::sync::Arc;
use teloxide::Bot;
use tracing_subscriber::EnvFilter;

use product_copywriter::config::Config;
use product_copywriter::session::SessionStore;
use product_copywriter::telegram::{self, TelegramMessenger};
use product_copywriter::{build_controller, build_generator, build_observer, health};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;

    let bot = Bot::new(config.telegram.token.clone());
    let observer = build_observer(&config);
    let generator = build_generator(&config, observer.clone())?;
    let controller = build_controller(
        generator,
        Arc::new(TelegramMessenger::new(bot.clone())),
        observer,
    );
    let sessions = controller.sessions().clone();

    if let Some(ttl) = config.session_idle_ttl() {
        spawn_session_sweeper(sessions.clone(), ttl, config.sweep_interval())?;
    }

    if let Some(bind) = config.health_bind()? {
        let listener_sessions = sessions.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(bind, listener_sessions).await {
                tracing::error!(%bind, "Health endpoint stopped: {}", e);
            }
        });
    }

    telegram::run(bot, controller).await;
    tracing::info!("Bot shutting down");
    Ok(())
}

fn spawn_session_sweeper(
    sessions: Arc<SessionStore>,
    ttl: std::time::Duration,
    every: std::time::Duration,
) -> Result<()> {
    let max_idle = chrono::Duration::from_std(ttl)?;
    tracing::info!(ttl_secs = ttl.as_secs(), "Idle session sweeper enabled");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = sessions.prune_idle(max_idle).await;
            if removed > 0 {
                tracing::info!(removed, "Pruned idle sessions");
            }
        }
    });
    Ok(())
}
