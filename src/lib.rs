pub mod config;
pub mod copywriter;
pub mod dialogue;
pub mod error;
pub mod health;
pub mod models;
pub mod observe;
pub mod prompt;
pub mod session;
pub mod telegram;
pub mod transport;

use std::sync::Arc;

use crate::config::Config;
use crate::copywriter::{Generator, YandexCopywriter};
use crate::dialogue::{DialogueController, Messenger};
use crate::error::Result;
use crate::observe::{LangfuseObserver, NoopObserver, Observer};
use crate::session::SessionStore;
use crate::transport::{Transport, YandexTransport};

/// Tracing sink described by `cfg`: Langfuse, or nothing when disabled
pub fn build_observer(cfg: &Config) -> Arc<dyn Observer> {
    if cfg.langfuse.enabled {
        Arc::new(LangfuseObserver::new(
            &cfg.langfuse.host,
            cfg.langfuse.public_key.clone(),
            cfg.langfuse.secret_key.clone(),
        ))
    } else {
        tracing::info!("Langfuse tracing disabled");
        Arc::new(NoopObserver)
    }
}

/// Build the generation client described by `cfg`
pub fn build_generator(cfg: &Config, observer: Arc<dyn Observer>) -> Result<Arc<dyn Generator>> {
    let transport = Arc::new(YandexTransport::new(
        cfg.backend.endpoint.clone(),
        cfg.backend.iam_token.clone(),
    )?);

    Ok(Arc::new(YandexCopywriter::new(
        transport as Arc<dyn Transport>,
        observer,
        cfg.backend.model_uri.clone(),
    )))
}

/// Wire the controller around a fresh session store
pub fn build_controller(
    generator: Arc<dyn Generator>,
    messenger: Arc<dyn Messenger>,
    observer: Arc<dyn Observer>,
) -> Arc<DialogueController> {
    Arc::new(DialogueController::new(
        Arc::new(SessionStore::new()),
        generator,
        messenger,
        observer,
    ))
}
