use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use guardian_notify::{
    Dispatcher, DispatcherSettings, EmailChannel, PayoutPauser, SlackChannel, StripePauser,
};
use guardian_server::api::{build_router, AppState};
use guardian_server::backfill::{BackfillOrchestrator, StripeEventProvider};
use guardian_server::config::Config;
use guardian_server::config_cache::RuleConfigCache;
use guardian_server::pipeline::{NotifyTargets, Pipeline};
use guardian_storage::GuardianStore;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/server.toml".to_string());
    let config = Config::load_or_default(&PathBuf::from(&config_path))?;

    guardian_common::id::init(config.server.machine_id, config.server.node_id);

    if config.database.url.is_none() {
        std::fs::create_dir_all(&config.database.data_dir).context("create data dir")?;
    }
    let store = Arc::new(GuardianStore::new(&config.database.effective_url()).await?);
    store.seed_default_rule_set().await?;

    let config_cache = Arc::new(RuleConfigCache::new(
        store.clone(),
        std::time::Duration::from_secs(config.notify.config_cache_ttl_secs),
    ));

    let pauser: Option<Arc<dyn PayoutPauser>> =
        if config.stripe.auto_pause && !config.stripe.secret_key.is_empty() {
            Some(Arc::new(StripePauser::new(
                &config.stripe.api_base,
                &config.stripe.secret_key,
            )?))
        } else {
            if config.stripe.auto_pause {
                tracing::warn!("Auto-pause enabled but no Stripe key configured; pausing disabled");
            }
            None
        };

    let targets = NotifyTargets {
        max_attempts: config.notify.max_attempts,
        email_enabled: config.notify.email.enabled,
        default_email: config.notify.email.default_to.clone(),
        slack_enabled: config.notify.slack.enabled,
        default_slack_webhook: config.notify.slack.default_webhook_url.clone(),
    };
    let pipeline = Arc::new(Pipeline::new(store.clone(), config_cache, targets));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut dispatcher = Dispatcher::new(
        store.clone(),
        pauser,
        DispatcherSettings {
            poll_interval: std::time::Duration::from_secs(config.notify.poll_interval_secs),
            lease: chrono::Duration::seconds(config.notify.lease_secs),
            base_backoff_secs: config.notify.base_backoff_secs,
        },
    );
    if config.notify.email.enabled {
        let email = EmailChannel::new(
            &config.notify.email.smtp_host,
            config.notify.email.smtp_port,
            config.notify.email.username.as_deref(),
            config.notify.email.password.as_deref(),
            &config.notify.email.from,
        )?;
        dispatcher.register_channel(Arc::new(email));
    }
    if config.notify.slack.enabled {
        let slack = SlackChannel::new(std::time::Duration::from_secs(
            config.notify.slack.timeout_secs,
        ))?;
        dispatcher.register_channel(Arc::new(slack));
    }
    let dispatcher = Arc::new(dispatcher);
    let dispatcher_task = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let shutdown = shutdown_rx.clone();
        async move { dispatcher.run(shutdown).await }
    });

    let provider = Arc::new(StripeEventProvider::new(
        &config.stripe.api_base,
        &config.stripe.secret_key,
    )?);
    let backfill = Arc::new(BackfillOrchestrator::new(
        store.clone(),
        pipeline.clone(),
        provider,
        config.backfill.lookback_days,
        config.backfill.page_size,
        shutdown_rx,
    ));

    let app = build_router(AppState {
        store,
        pipeline,
        backfill,
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    let _ = dispatcher_task.await;
    Ok(())
}
