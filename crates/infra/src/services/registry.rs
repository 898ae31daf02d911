use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::instrument;

use stockline_catalog::{CatalogEvent, ItemType, ItemTypeId, ItemTypePatch, NewItemType, default_catalog};

use crate::error::ServiceError;
use crate::notify::{NotificationBus, STREAM_ITEM_TYPE, publish};
use crate::store::{StockStore, StockTx, StoreError};

/// Listing filter; the default lists everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemTypeQuery {
    pub active_only: bool,
    pub visible_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "count", rename_all = "snake_case")]
pub enum SeedOutcome {
    Seeded(usize),
    AlreadySeeded,
}

/// Item type registry service.
#[derive(Clone)]
pub struct ItemTypeRegistry {
    store: Arc<dyn StockStore>,
    bus: Arc<NotificationBus>,
}

impl ItemTypeRegistry {
    pub fn new(store: Arc<dyn StockStore>, bus: Arc<NotificationBus>) -> Self {
        Self { store, bus }
    }

    #[instrument(skip(self, input), fields(requested_id = ?input.id), err)]
    pub async fn create(&self, input: NewItemType) -> Result<ItemType, ServiceError> {
        let (item, event) = ItemType::create(input, Utc::now())?;

        let mut tx = self.store.begin().await?;
        if tx.item_type(item.id()).await?.is_some() {
            return Err(ServiceError::validation(format!(
                "item type '{}' already exists",
                item.id()
            )));
        }
        tx.insert_item_type(&item).await.map_err(|e| match e {
            // Lost a race with a concurrent create of the same id.
            StoreError::Conflict(_) => {
                ServiceError::validation(format!("item type '{}' already exists", item.id()))
            }
            other => other.into(),
        })?;
        tx.commit().await?;

        tracing::info!(item_type_id = %item.id(), "item type created");
        self.notify(&event);
        Ok(item)
    }

    pub async fn get(&self, id: &ItemTypeId) -> Result<ItemType, ServiceError> {
        let mut tx = self.store.begin().await?;
        load(&mut *tx, id).await
    }

    /// Ordered by `sort_order`, then id.
    pub async fn list(&self, query: ItemTypeQuery) -> Result<Vec<ItemType>, ServiceError> {
        let mut tx = self.store.begin().await?;
        let items = tx.item_types().await?;
        Ok(items
            .into_iter()
            .filter(|i| !query.active_only || i.is_active())
            .filter(|i| !query.visible_only || i.is_visible())
            .collect())
    }

    #[instrument(skip(self, patch), fields(item_type_id = %id), err)]
    pub async fn update(&self, id: &ItemTypeId, patch: ItemTypePatch) -> Result<ItemType, ServiceError> {
        self.modify(id, |item| item.apply_patch(patch, Utc::now()).map_err(Into::into))
            .await
    }

    /// Existing ledger records are untouched.
    #[instrument(skip(self), fields(item_type_id = %id), err)]
    pub async fn toggle_active(&self, id: &ItemTypeId, active: bool) -> Result<ItemType, ServiceError> {
        self.modify(id, |item| Ok(item.set_active(active, Utc::now())))
            .await
    }

    #[instrument(skip(self), fields(item_type_id = %id), err)]
    pub async fn toggle_visibility(&self, id: &ItemTypeId, visible: bool) -> Result<ItemType, ServiceError> {
        self.modify(id, |item| Ok(item.set_visible(visible, Utc::now())))
            .await
    }

    /// Load the starter catalog into an empty registry.
    ///
    /// A registry holding any item type is left alone and reported as
    /// `AlreadySeeded`; repeated calls never duplicate rows.
    #[instrument(skip(self), err)]
    pub async fn seed_defaults(&self) -> Result<SeedOutcome, ServiceError> {
        let mut tx = self.store.begin().await?;
        if !tx.item_types().await?.is_empty() {
            tracing::debug!("registry not empty; skipping seed");
            return Ok(SeedOutcome::AlreadySeeded);
        }

        let catalog = default_catalog(Utc::now());
        for item in &catalog {
            match tx.insert_item_type(item).await {
                Ok(()) => {}
                // A concurrent seed committed first.
                Err(StoreError::Conflict(reason)) => {
                    tracing::debug!(%reason, "lost seeding race");
                    return Ok(SeedOutcome::AlreadySeeded);
                }
                Err(other) => return Err(other.into()),
            }
        }
        tx.commit().await?;

        tracing::info!(count = catalog.len(), "seeded default item types");
        Ok(SeedOutcome::Seeded(catalog.len()))
    }

    async fn modify<F>(&self, id: &ItemTypeId, change: F) -> Result<ItemType, ServiceError>
    where
        F: FnOnce(&mut ItemType) -> Result<CatalogEvent, ServiceError>,
    {
        let mut tx = self.store.begin().await?;
        let mut item = load(&mut *tx, id).await?;
        let event = change(&mut item)?;
        tx.update_item_type(&item).await?;
        tx.commit().await?;

        self.notify(&event);
        Ok(item)
    }

    fn notify(&self, event: &CatalogEvent) {
        publish(
            &self.bus,
            STREAM_ITEM_TYPE,
            event.item_type_id().to_string(),
            event,
        );
    }
}

/// Fetch an item type inside an open unit of work.
pub(crate) async fn load(tx: &mut dyn StockTx, id: &ItemTypeId) -> Result<ItemType, ServiceError> {
    tx.item_type(id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("item type '{id}'")))
}
