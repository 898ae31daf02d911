//! Service wiring: pick a storage backend and build the three application
//! services on top of it, sharing one store and one notification bus.

use std::sync::Arc;

use anyhow::Context;
use chrono::{FixedOffset, Offset, Utc};

use stockline_events::EventBus;
use stockline_infra::config::{AppConfig, StorageConfig};
use stockline_infra::services::{InventoryLedger, ItemTypeRegistry, SeedOutcome, TransferLifecycleManager};
use stockline_infra::store::{InMemoryStockStore, PostgresStockStore, StockStore};
use stockline_infra::NotificationBus;

#[derive(Clone)]
pub struct AppServices {
    pub registry: ItemTypeRegistry,
    pub ledger: InventoryLedger,
    pub transfers: TransferLifecycleManager,
    pub bus: Arc<NotificationBus>,
}

impl AppServices {
    pub fn new(store: Arc<dyn StockStore>, day_offset: FixedOffset) -> Self {
        let bus = Arc::new(NotificationBus::new());
        Self {
            registry: ItemTypeRegistry::new(store.clone(), bus.clone()),
            ledger: InventoryLedger::new(store.clone(), bus.clone()),
            transfers: TransferLifecycleManager::new(store, bus.clone(), day_offset),
            bus,
        }
    }

    /// Empty in-memory services (dev/test), grouping days in UTC.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStockStore::new()), Utc.fix())
    }
}

/// Build services for `config`: connect and migrate Postgres when persistent
/// stores are enabled, then seed the starter catalog if asked to.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn StockStore> = match &config.storage {
        StorageConfig::InMemory => {
            tracing::info!("using in-memory stores");
            Arc::new(InMemoryStockStore::new())
        }
        StorageConfig::Postgres { database_url } => {
            let store = PostgresStockStore::connect(database_url)
                .await
                .context("failed to connect to Postgres")?;
            store.migrate().await.context("failed to apply schema")?;
            tracing::info!("using Postgres stores");
            Arc::new(store)
        }
    };

    let services = AppServices::new(store, config.operation_day_offset);

    if config.seed_on_startup {
        match services.registry.seed_defaults().await.context("failed to seed item types")? {
            SeedOutcome::Seeded(n) => tracing::info!(count = n, "starter catalog loaded"),
            SeedOutcome::AlreadySeeded => tracing::debug!("item types present; seed skipped"),
        }
    }

    Ok(services)
}

/// Log every committed change notification at debug level.
///
/// Runs on a blocking thread until the bus is dropped.
pub fn spawn_change_log(bus: &NotificationBus) -> tokio::task::JoinHandle<()> {
    let sub = bus.subscribe();
    tokio::task::spawn_blocking(move || {
        while let Ok(env) = sub.recv() {
            tracing::debug!(
                stream_type = env.stream_type(),
                stream_id = env.stream_id(),
                event_type = env.event_type(),
                "change committed"
            );
        }
    })
}
