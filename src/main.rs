//! Alpha Sync - entry point
//!
//! 1. Loads configuration
//! 2. Starts the intelligence feed
//! 3. Starts one valuation actor per configured fund
//! 4. Logs updates until Ctrl+C, then shuts everything down

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use alpha_sync::adapters::{
    AutoTransport, CredentialStore, DurableStore, EnvCredentialStore, FanoutNotifier,
    IntelligenceHistorySource, JsonFileStore, LogNotifier, MemoryStore, Notifier, RestClient,
    WebhookNotifier,
};
use alpha_sync::config::{self, constants, AppConfig};
use alpha_sync::core::{
    FilterMode, IntelligenceDeps, IntelligenceFeed, RecordFilter, SeenRecords, ValuationDeps,
    ValuationRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    config::init_logging();
    info!("Alpha Sync starting...");

    let config_path = constants::config_path();
    let config = match config::load_config(&config_path) {
        Ok(cfg) => {
            info!(
                path = %config_path.display(),
                funds = cfg.funds.len(),
                "[CONFIG] Loaded configuration"
            );
            cfg
        }
        Err(e) => {
            error!("[ERROR] Configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    let credentials: Arc<dyn CredentialStore> =
        Arc::new(EnvCredentialStore::new(constants::token_env_prefix()));
    let transport = Arc::new(AutoTransport::new().context("building stream transport")?);
    let rest = Arc::new(
        RestClient::new(
            config.api.base_url.clone(),
            config.api.rest_paths(),
            credentials.clone(),
            config.api.token_key.clone(),
        )
        .context("building REST client")?,
    );
    let store = open_store(&config).await;
    let notifier = build_notifier(&config)?;

    let mut feed = IntelligenceFeed::spawn(
        config.intelligence_feed_config(),
        IntelligenceDeps {
            transport: transport.clone(),
            history: Some(rest.clone() as Arc<dyn IntelligenceHistorySource>),
            store,
            credentials: credentials.clone(),
        },
    );

    let mut registry = ValuationRegistry::new(
        config.valuation_settings(),
        ValuationDeps {
            transport,
            history: rest,
            notifier,
            credentials,
        },
    );
    for fund in &config.funds {
        registry.watch(fund.clone());
    }

    let essential = RecordFilter::new("", FilterMode::Essential);
    let mut seen = SeenRecords::new();
    let mut records_rx = feed.subscribe();
    let status_every = Duration::from_secs(constants::status_interval_secs().max(1));
    let mut status_tick = tokio::time::interval(status_every);

    info!("Running. Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C signal");
                }
                info!("[SHUTDOWN] Graceful shutdown initiated");
                break;
            }
            changed = records_rx.changed() => {
                if changed.is_err() {
                    warn!("Intelligence feed ended");
                    break;
                }
                let view = records_rx.borrow_and_update().clone();
                for record in seen.fresh(&essential, &view.records) {
                    info!(
                        id = record.id,
                        urgency = record.urgency_score,
                        sentiment = %record.sentiment,
                        from_cache = view.from_cache,
                        "[INTEL] {}",
                        record.summary
                    );
                }
            }
            _ = status_tick.tick() => {
                info!(
                    status = %feed.status(),
                    records = feed.records().len(),
                    "[STATUS] Intelligence feed"
                );
                for code in registry.codes() {
                    if let Some(actor) = registry.get(&code) {
                        info!(
                            instrument = %code,
                            state = %actor.state(),
                            live = actor.is_live(),
                            growth = actor.snapshot().map(|s| s.estimated_growth_pct),
                            threshold = actor.threshold(),
                            "[STATUS] Valuation"
                        );
                    }
                }
            }
        }
    }

    registry.shutdown().await;
    feed.stop().await;
    info!("[SHUTDOWN] Clean exit");
    Ok(())
}

/// JSON file cache when configured, else in-memory; an unreadable cache is not fatal
async fn open_store(config: &AppConfig) -> Arc<dyn DurableStore> {
    let retention = config.feed.cache_retention;
    match &config.feed.cache_path {
        Some(path) => match JsonFileStore::open(path).await {
            Ok(store) => Arc::new(store.with_retention(retention)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Record cache unavailable, using memory");
                Arc::new(MemoryStore::with_retention(retention))
            }
        },
        None => Arc::new(MemoryStore::with_retention(retention)),
    }
}

fn build_notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.alarm.webhook_url {
        Some(url) => {
            let webhook = WebhookNotifier::new(url.clone()).context("building webhook notifier")?;
            Ok(Arc::new(FanoutNotifier::new(vec![Box::new(LogNotifier), Box::new(webhook)])))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}
