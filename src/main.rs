mod analyzer;
mod config;
mod lifecycle;
mod market;
mod model;
mod parser;
mod scheduler;
mod storage;
mod utils;

use analyzer::AnalysisEngine;
use config::{load_config, AppConfig};
use lifecycle::{ItemContext, WatchedItem};
use market::SteamMarketClient;
use model::ItemIdentity;
use rand::seq::SliceRandom;
use scheduler::Scheduler;
use std::sync::Arc;
use storage::SqliteStorage;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let config: AppConfig = match load_config("config.json") {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };

    let storage = match SqliteStorage::new(&config.database_path) {
        Ok(s) => Arc::new(Mutex::new(s)),
        Err(e) => {
            error!("Failed to initialize storage: {:?}", e);
            return;
        }
    };

    let market = match SteamMarketClient::new(config.market.clone(), config.credentials.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build market client: {}", e);
            return;
        }
    };
    info!("Market client ready for account '{}'", market.account());
    let missing = config.credentials.missing();
    if !missing.is_empty() {
        warn!("Credentials incomplete, the session layer will refuse to log in: {:?}", missing);
    }

    let engine = match AnalysisEngine::new(config.analysis.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Invalid analysis settings: {}", e);
            return;
        }
    };

    let ctx = Arc::new(ItemContext::new(
        Arc::new(market),
        storage,
        engine,
        &config.scheduler,
    ));

    loop {
        info!("Watching {} items", config.items.len());
        let mut scheduler = Scheduler::new(Duration::from_millis(config.scheduler.step_delay_ms));
        for item in seed_items(&config, &ctx) {
            scheduler.push(item);
        }

        let report = scheduler.run().await;
        info!(
            "Cycle finished: {} steps, {} released or evicted, {} exhausted",
            report.steps, report.deleted, report.exhausted
        );

        if !config.scheduler.run_forever {
            break;
        }
        info!("Waiting {}s before the next cycle...", config.check_interval_seconds);
        sleep(Duration::from_secs(config.check_interval_seconds)).await;
    }
}

/// Builds a fresh item per configured entry, in random order so no item is
/// always served first.
fn seed_items(config: &AppConfig, ctx: &Arc<ItemContext>) -> Vec<WatchedItem> {
    let mut items: Vec<WatchedItem> = config
        .items
        .iter()
        .map(|item| {
            let identity = ItemIdentity {
                item_name_id: item.item_name_id,
                market_hash_name: item.market_hash_name.clone(),
            };
            WatchedItem::new(identity, ctx.clone())
        })
        .collect();
    items.shuffle(&mut rand::rng());
    items
}
