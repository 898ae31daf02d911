use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use tracing::instrument;

use stockline_catalog::{ItemTypeId, PackagingType};
use stockline_core::{ActorId, AggregateRoot, ExpectedVersion, TechnicianId, TransferId, WarehouseId};
use stockline_events::execute;
use stockline_inventory::{ChangeReason, LedgerEvent, OwnerRef};
use stockline_transfers::{
    AcceptTransfer, ItemTypeGate, Operation, RejectTransfer, SubmitTransfer, TransferAccepted, TransferCommand,
    TransferEvent, TransferRecord, TransferRequest, TransferStatus, group_operations,
};

use crate::error::ServiceError;
use crate::notify::{NotificationBus, STREAM_LEDGER, STREAM_TRANSFER, publish};
use crate::services::ledger::apply_delta;
use crate::services::registry::load;
use crate::store::{StockStore, StockTx, TransferFilter};

/// Caller input for a new transfer request. The performing actor is passed
/// separately since it comes from the request context, not the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDraft {
    pub warehouse_id: WarehouseId,
    pub technician_id: TechnicianId,
    pub item_type_id: ItemTypeId,
    pub packaging_type: PackagingType,
    pub quantity: i64,
    pub notes: Option<String>,
}

/// Drives transfer requests through `pending -> accepted | rejected`.
///
/// Accept and reject each run in one unit of work: the transfer row is read
/// under lock, the transition is decided by the aggregate, ledger writes (accept
/// only) and the new row are written, then the whole thing commits at once. A
/// failed step drops the unit of work, so nothing it wrote survives.
#[derive(Clone)]
pub struct TransferLifecycleManager {
    store: Arc<dyn StockStore>,
    bus: Arc<NotificationBus>,
    day_offset: FixedOffset,
}

impl TransferLifecycleManager {
    pub fn new(store: Arc<dyn StockStore>, bus: Arc<NotificationBus>, day_offset: FixedOffset) -> Self {
        Self {
            store,
            bus,
            day_offset,
        }
    }

    #[instrument(
        skip(self, draft),
        fields(
            warehouse_id = %draft.warehouse_id,
            technician_id = %draft.technician_id,
            item_type_id = %draft.item_type_id,
            performed_by = %performed_by,
        ),
        err
    )]
    pub async fn submit(&self, draft: TransferDraft, performed_by: ActorId) -> Result<TransferRecord, ServiceError> {
        let transfer_id = TransferId::new();
        let mut tx = self.store.begin().await?;

        let item = match load(&mut *tx, &draft.item_type_id).await {
            Err(ServiceError::NotFound(_)) => {
                return Err(ServiceError::validation(format!(
                    "unknown item type '{}'",
                    draft.item_type_id
                )));
            }
            other => other?,
        };

        let mut request = TransferRequest::empty(transfer_id);
        let command = TransferCommand::Submit(SubmitTransfer {
            transfer_id,
            warehouse_id: draft.warehouse_id,
            technician_id: draft.technician_id,
            item_type_id: draft.item_type_id,
            item: ItemTypeGate {
                is_active: item.is_active(),
                packaging_rule: item.packaging_rule(),
            },
            packaging_type: draft.packaging_type,
            quantity: draft.quantity,
            performed_by,
            notes: draft.notes,
            occurred_at: Utc::now(),
        });
        let events = execute(&mut request, &command)?;

        let row = snapshot(&request)?;
        tx.insert_transfer(&row).await?;
        tx.commit().await?;

        tracing::info!(%transfer_id, quantity = row.quantity, "transfer submitted");
        self.notify(&events);
        Ok(row)
    }

    /// Accept a pending request: debit the warehouse, credit the technician's
    /// moving stock, mark the row accepted. All or nothing.
    #[instrument(skip(self), fields(transfer_id = %transfer_id), err)]
    pub async fn accept(&self, transfer_id: TransferId) -> Result<TransferRecord, ServiceError> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut request = lock_request(&mut *tx, transfer_id).await?;
        let expected = ExpectedVersion::Exact(request.version());

        let command = TransferCommand::Accept(AcceptTransfer {
            transfer_id,
            occurred_at: now,
        });
        let events = execute(&mut request, &command).inspect_err(|err| {
            tracing::debug!(error = %err, "accept refused");
        })?;
        let accepted = events
            .iter()
            .find_map(|e| match e {
                TransferEvent::Accepted(a) => Some(a.clone()),
                _ => None,
            })
            .ok_or_else(|| ServiceError::Conflict(format!("transfer {transfer_id} produced no acceptance")))?;

        let ledger_events = move_stock(&mut *tx, &accepted, now).await?;

        let row = snapshot(&request)?;
        tx.update_transfer(&row, expected).await?;
        tx.commit().await?;

        tracing::info!(
            quantity = accepted.quantity,
            packaging = %accepted.packaging_type,
            "transfer accepted"
        );
        self.notify(&events);
        for event in &ledger_events {
            publish(&self.bus, STREAM_LEDGER, event.stream_id(), event);
        }
        Ok(row)
    }

    /// Reject a pending request. The ledger is never touched.
    #[instrument(skip(self, reason), fields(transfer_id = %transfer_id), err)]
    pub async fn reject(&self, transfer_id: TransferId, reason: Option<String>) -> Result<TransferRecord, ServiceError> {
        let mut tx = self.store.begin().await?;
        let mut request = lock_request(&mut *tx, transfer_id).await?;
        let expected = ExpectedVersion::Exact(request.version());

        let command = TransferCommand::Reject(RejectTransfer {
            transfer_id,
            reason,
            occurred_at: Utc::now(),
        });
        let events = execute(&mut request, &command).inspect_err(|err| {
            tracing::debug!(error = %err, "reject refused");
        })?;

        let row = snapshot(&request)?;
        tx.update_transfer(&row, expected).await?;
        tx.commit().await?;

        tracing::info!("transfer rejected");
        self.notify(&events);
        Ok(row)
    }

    /// Hard-delete processed requests. Fails, deleting nothing, if any of
    /// the ids is still pending; ids that do not exist are skipped.
    #[instrument(skip(self, ids), fields(requested = ids.len()), err)]
    pub async fn bulk_delete(&self, ids: &[TransferId]) -> Result<u64, ServiceError> {
        let mut tx = self.store.begin().await?;

        let mut pending = Vec::new();
        for id in ids {
            if let Some(row) = tx.transfer(*id).await? {
                if row.status == TransferStatus::Pending {
                    pending.push(id.to_string());
                }
            }
        }
        if !pending.is_empty() {
            tracing::warn!(pending = pending.len(), "bulk delete refused");
            return Err(ServiceError::validation(format!(
                "pending transfers cannot be deleted: {}",
                pending.join(", ")
            )));
        }

        let deleted = tx.delete_transfers(ids).await?;
        tx.commit().await?;

        tracing::info!(deleted, "transfers deleted");
        Ok(deleted)
    }

    pub async fn get(&self, transfer_id: TransferId) -> Result<TransferRecord, ServiceError> {
        let mut tx = self.store.begin().await?;
        tx.transfer(transfer_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("transfer {transfer_id}")))
    }

    /// Newest first.
    pub async fn list(&self, filter: &TransferFilter) -> Result<Vec<TransferRecord>, ServiceError> {
        let mut tx = self.store.begin().await?;
        Ok(tx.transfers(filter).await?)
    }

    /// Derived operations over processed requests matching `filter`.
    pub async fn operations(&self, filter: &TransferFilter) -> Result<Vec<Operation>, ServiceError> {
        let rows = self.list(filter).await?;
        Ok(group_operations(&rows, self.day_offset))
    }

    fn notify(&self, events: &[TransferEvent]) {
        for event in events {
            publish(&self.bus, STREAM_TRANSFER, event.transfer_id().to_string(), event);
        }
    }
}

async fn lock_request(tx: &mut dyn StockTx, transfer_id: TransferId) -> Result<TransferRequest, ServiceError> {
    let row = tx
        .transfer(transfer_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("transfer {transfer_id}")))?;
    Ok(TransferRequest::restore(row))
}

fn snapshot(request: &TransferRequest) -> Result<TransferRecord, ServiceError> {
    request
        .to_record()
        .ok_or_else(|| ServiceError::Conflict(format!("transfer {} is not submitted", request.id_typed())))
}

/// Warehouse debit then technician-moving credit, same item and packaging.
async fn move_stock(
    tx: &mut dyn StockTx,
    accepted: &TransferAccepted,
    now: chrono::DateTime<Utc>,
) -> Result<[LedgerEvent; 2], ServiceError> {
    let packaging = accepted.packaging_type;
    let quantity = accepted.quantity;

    let (_, debit) = apply_delta(
        tx,
        OwnerRef::warehouse(accepted.warehouse_id),
        &accepted.item_type_id,
        packaging,
        -quantity,
        ChangeReason::TransferAccepted {
            transfer_id: accepted.transfer_id,
            packaging,
            delta: -quantity,
        },
        now,
    )
    .await?;

    let (_, credit) = apply_delta(
        tx,
        OwnerRef::technician_moving(accepted.technician_id),
        &accepted.item_type_id,
        packaging,
        quantity,
        ChangeReason::TransferAccepted {
            transfer_id: accepted.transfer_id,
            packaging,
            delta: quantity,
        },
        now,
    )
    .await?;

    Ok([debit, credit])
}
