pub mod run;
pub mod vocabulary;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};

use agendasync_core::SyncEngine;
use agendasync_core::config::AppConfig;
use agendasync_core::notify::{LogNotifier, Notifier, WebhookNotifier};
use agendasync_core::remote::RealworksClient;
use agendasync_core::store::PostgrestStore;

/// Wire the configured collaborators into an engine.
pub fn build_engine(config: &AppConfig) -> Result<SyncEngine> {
    let store = PostgrestStore::new(
        &config.store.url,
        &config.store.service_key,
        config.store.timeout(),
    )
    .context("Failed to set up the store client")?;

    let mut source = RealworksClient::new(&config.realworks.url, config.realworks.timeout())
        .context("Failed to set up the agenda client")?;
    if let Some(token) = &config.realworks.token {
        source = source.with_token(token);
    }

    let notifier: Arc<dyn Notifier> = match &config.notifications.webhook_url {
        Some(url) => Arc::new(
            WebhookNotifier::new(url, config.realworks.timeout())
                .context("Failed to set up the notification client")?,
        ),
        None => {
            tracing::warn!("no notification webhook configured, confirmations are only logged");
            Arc::new(LogNotifier)
        }
    };

    Ok(SyncEngine::new(
        Arc::new(store),
        Arc::new(source),
        notifier,
        config.sync.clone(),
        config.notifications.base_url.clone(),
    ))
}
