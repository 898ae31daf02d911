use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockline_catalog::{ItemTypeId, PackagingRule, PackagingType};
use stockline_core::{
    ActorId, Aggregate, AggregateRoot, DomainError, TechnicianId, TransferId, WarehouseId,
};
use stockline_events::Event;

/// Transfer request status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Accepted,
    Rejected,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Accepted => "accepted",
            TransferStatus::Rejected => "rejected",
        }
    }
}

impl core::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransferStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TransferStatus::Pending),
            "accepted" => Ok(TransferStatus::Accepted),
            "rejected" => Ok(TransferStatus::Rejected),
            other => Err(DomainError::validation(format!("unknown transfer status '{other}'"))),
        }
    }
}

/// Blank or whitespace-only notes mean "no notes".
pub fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Flat persisted form of a transfer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub id: TransferId,
    pub warehouse_id: WarehouseId,
    pub technician_id: TechnicianId,
    pub item_type_id: ItemTypeId,
    pub packaging_type: PackagingType,
    pub quantity: i64,
    pub performed_by: ActorId,
    pub notes: Option<String>,
    pub status: TransferStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub version: u64,
}

/// Aggregate root: TransferRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    id: TransferId,
    warehouse_id: WarehouseId,
    technician_id: TechnicianId,
    item_type_id: Option<ItemTypeId>,
    packaging_type: PackagingType,
    quantity: i64,
    performed_by: Option<ActorId>,
    notes: Option<String>,
    status: TransferStatus,
    rejection_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    responded_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl TransferRequest {
    /// Not-yet-submitted instance; `SubmitTransfer` brings it to life.
    pub fn empty(id: TransferId) -> Self {
        Self {
            id,
            warehouse_id: WarehouseId::from_uuid(Uuid::nil()),
            technician_id: TechnicianId::from_uuid(Uuid::nil()),
            item_type_id: None,
            packaging_type: PackagingType::Unit,
            quantity: 0,
            performed_by: None,
            notes: None,
            status: TransferStatus::Pending,
            rejection_reason: None,
            created_at: None,
            responded_at: None,
            version: 0,
            created: false,
        }
    }

    /// Rebuild from a stored row.
    pub fn restore(row: TransferRecord) -> Self {
        Self {
            id: row.id,
            warehouse_id: row.warehouse_id,
            technician_id: row.technician_id,
            item_type_id: Some(row.item_type_id),
            packaging_type: row.packaging_type,
            quantity: row.quantity,
            performed_by: Some(row.performed_by),
            notes: row.notes,
            status: row.status,
            rejection_reason: row.rejection_reason,
            created_at: Some(row.created_at),
            responded_at: row.responded_at,
            version: row.version,
            created: true,
        }
    }

    /// Flatten for storage. `None` until the request has been submitted.
    pub fn to_record(&self) -> Option<TransferRecord> {
        Some(TransferRecord {
            id: self.id,
            warehouse_id: self.warehouse_id,
            technician_id: self.technician_id,
            item_type_id: self.item_type_id.clone()?,
            packaging_type: self.packaging_type,
            quantity: self.quantity,
            performed_by: self.performed_by?,
            notes: self.notes.clone(),
            status: self.status,
            rejection_reason: self.rejection_reason.clone(),
            created_at: self.created_at?,
            responded_at: self.responded_at,
            version: self.version,
        })
    }

    pub fn id_typed(&self) -> TransferId {
        self.id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn technician_id(&self) -> TechnicianId {
        self.technician_id
    }

    pub fn item_type_id(&self) -> Option<&ItemTypeId> {
        self.item_type_id.as_ref()
    }

    pub fn packaging_type(&self) -> PackagingType {
        self.packaging_type
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn performed_by(&self) -> Option<ActorId> {
        self.performed_by
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn responded_at(&self) -> Option<DateTime<Utc>> {
        self.responded_at
    }

    pub fn is_submitted(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for TransferRequest {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// What the aggregate needs to know about the item type being moved.
///
/// Resolved from the registry by the caller; an unknown item type never
/// reaches the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeGate {
    pub is_active: bool,
    pub packaging_rule: PackagingRule,
}

/// Command: SubmitTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTransfer {
    pub transfer_id: TransferId,
    pub warehouse_id: WarehouseId,
    pub technician_id: TechnicianId,
    pub item_type_id: ItemTypeId,
    pub item: ItemTypeGate,
    pub packaging_type: PackagingType,
    pub quantity: i64,
    pub performed_by: ActorId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AcceptTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptTransfer {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectTransfer {
    pub transfer_id: TransferId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    Submit(SubmitTransfer),
    Accept(AcceptTransfer),
    Reject(RejectTransfer),
}

/// Event: TransferSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSubmitted {
    pub transfer_id: TransferId,
    pub warehouse_id: WarehouseId,
    pub technician_id: TechnicianId,
    pub item_type_id: ItemTypeId,
    pub packaging_type: PackagingType,
    pub quantity: i64,
    pub performed_by: ActorId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferAccepted.
///
/// Carries the movement so the ledger side can be driven from the event alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAccepted {
    pub transfer_id: TransferId,
    pub warehouse_id: WarehouseId,
    pub technician_id: TechnicianId,
    pub item_type_id: ItemTypeId,
    pub packaging_type: PackagingType,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRejected {
    pub transfer_id: TransferId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    Submitted(TransferSubmitted),
    Accepted(TransferAccepted),
    Rejected(TransferRejected),
}

impl TransferEvent {
    pub fn transfer_id(&self) -> TransferId {
        match self {
            TransferEvent::Submitted(e) => e.transfer_id,
            TransferEvent::Accepted(e) => e.transfer_id,
            TransferEvent::Rejected(e) => e.transfer_id,
        }
    }
}

impl Event for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::Submitted(_) => "transfers.request.submitted",
            TransferEvent::Accepted(_) => "transfers.request.accepted",
            TransferEvent::Rejected(_) => "transfers.request.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::Submitted(e) => e.occurred_at,
            TransferEvent::Accepted(e) => e.occurred_at,
            TransferEvent::Rejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TransferRequest {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::Submitted(e) => {
                self.id = e.transfer_id;
                self.warehouse_id = e.warehouse_id;
                self.technician_id = e.technician_id;
                self.item_type_id = Some(e.item_type_id.clone());
                self.packaging_type = e.packaging_type;
                self.quantity = e.quantity;
                self.performed_by = Some(e.performed_by);
                self.notes = e.notes.clone();
                self.status = TransferStatus::Pending;
                self.rejection_reason = None;
                self.created_at = Some(e.occurred_at);
                self.responded_at = None;
                self.created = true;
            }
            TransferEvent::Accepted(e) => {
                self.status = TransferStatus::Accepted;
                self.responded_at = Some(e.occurred_at);
            }
            TransferEvent::Rejected(e) => {
                self.status = TransferStatus::Rejected;
                self.rejection_reason = e.reason.clone();
                self.responded_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::Submit(cmd) => self.handle_submit(cmd),
            TransferCommand::Accept(cmd) => self.handle_accept(cmd),
            TransferCommand::Reject(cmd) => self.handle_reject(cmd),
        }
    }
}

impl TransferRequest {
    fn ensure_transfer_id(&self, transfer_id: TransferId) -> Result<(), DomainError> {
        if self.id != transfer_id {
            return Err(DomainError::conflict("transfer_id mismatch"));
        }
        Ok(())
    }

    /// Shared guard for accept/reject: must exist and still be pending.
    fn ensure_pending(&self, transfer_id: TransferId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("transfer {transfer_id}")));
        }
        self.ensure_transfer_id(transfer_id)?;
        if self.status.is_terminal() {
            return Err(DomainError::already_processed(format!(
                "transfer {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transfer request already exists"));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if !cmd.item.is_active {
            return Err(DomainError::validation(format!(
                "item type '{}' is inactive",
                cmd.item_type_id
            )));
        }
        if !cmd.item.packaging_rule.allows(cmd.packaging_type) {
            return Err(DomainError::validation(format!(
                "item type '{}' ({}) cannot be moved in {}",
                cmd.item_type_id,
                cmd.item.packaging_rule.as_str(),
                cmd.packaging_type
            )));
        }

        Ok(vec![TransferEvent::Submitted(TransferSubmitted {
            transfer_id: cmd.transfer_id,
            warehouse_id: cmd.warehouse_id,
            technician_id: cmd.technician_id,
            item_type_id: cmd.item_type_id.clone(),
            packaging_type: cmd.packaging_type,
            quantity: cmd.quantity,
            performed_by: cmd.performed_by,
            notes: normalize_notes(cmd.notes.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_accept(&self, cmd: &AcceptTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_pending(cmd.transfer_id)?;

        let item_type_id = self
            .item_type_id
            .clone()
            .ok_or_else(|| DomainError::conflict("submitted transfer without item type"))?;

        Ok(vec![TransferEvent::Accepted(TransferAccepted {
            transfer_id: self.id,
            warehouse_id: self.warehouse_id,
            technician_id: self.technician_id,
            item_type_id,
            packaging_type: self.packaging_type,
            quantity: self.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_pending(cmd.transfer_id)?;

        Ok(vec![TransferEvent::Rejected(TransferRejected {
            transfer_id: self.id,
            reason: normalize_notes(cmd.reason.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockline_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn n950() -> ItemTypeId {
        ItemTypeId::parse("n950").unwrap()
    }

    fn submit_cmd(id: TransferId) -> SubmitTransfer {
        SubmitTransfer {
            transfer_id: id,
            warehouse_id: WarehouseId::new(),
            technician_id: TechnicianId::new(),
            item_type_id: n950(),
            item: ItemTypeGate {
                is_active: true,
                packaging_rule: PackagingRule::Both,
            },
            packaging_type: PackagingType::Box,
            quantity: 3,
            performed_by: ActorId::new(),
            notes: Some("  ".into()),
            occurred_at: test_time(),
        }
    }

    fn submitted() -> TransferRequest {
        let id = TransferId::new();
        let mut transfer = TransferRequest::empty(id);
        execute(&mut transfer, &TransferCommand::Submit(submit_cmd(id))).unwrap();
        transfer
    }

    #[test]
    fn submit_creates_pending_request_with_normalized_notes() {
        let transfer = submitted();
        assert!(transfer.is_submitted());
        assert_eq!(transfer.status(), TransferStatus::Pending);
        assert_eq!(transfer.notes(), None);
        assert_eq!(transfer.quantity(), 3);
        assert_eq!(transfer.version(), 1);
        assert!(transfer.responded_at().is_none());
    }

    #[test]
    fn submit_rejects_non_positive_quantity() {
        let id = TransferId::new();
        let transfer = TransferRequest::empty(id);
        for qty in [0, -4] {
            let mut cmd = submit_cmd(id);
            cmd.quantity = qty;
            let err = transfer.handle(&TransferCommand::Submit(cmd)).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn submit_rejects_incompatible_packaging_and_inactive_items() {
        let id = TransferId::new();
        let transfer = TransferRequest::empty(id);

        let mut cmd = submit_cmd(id);
        cmd.item.packaging_rule = PackagingRule::UnitOnly;
        assert!(matches!(
            transfer.handle(&TransferCommand::Submit(cmd)),
            Err(DomainError::Validation(_))
        ));

        let mut cmd = submit_cmd(id);
        cmd.item.is_active = false;
        assert!(matches!(
            transfer.handle(&TransferCommand::Submit(cmd)),
            Err(DomainError::Validation(msg)) if msg.contains("inactive")
        ));
    }

    #[test]
    fn accept_sets_responded_at_and_carries_movement() {
        let mut transfer = submitted();
        let at = test_time();
        let transfer_id = transfer.id_typed();
        let events = execute(
            &mut transfer,
            &TransferCommand::Accept(AcceptTransfer {
                transfer_id,
                occurred_at: at,
            }),
        )
        .unwrap();

        match &events[0] {
            TransferEvent::Accepted(e) => {
                assert_eq!(e.quantity, 3);
                assert_eq!(e.packaging_type, PackagingType::Box);
                assert_eq!(e.warehouse_id, transfer.warehouse_id());
            }
            other => panic!("expected Accepted, got {other:?}"),
        }
        assert_eq!(transfer.status(), TransferStatus::Accepted);
        assert_eq!(transfer.responded_at(), Some(at));
        assert_eq!(transfer.rejection_reason(), None);
    }

    #[test]
    fn terminal_requests_answer_already_processed() {
        let mut transfer = submitted();
        let id = transfer.id_typed();
        execute(
            &mut transfer,
            &TransferCommand::Reject(RejectTransfer {
                transfer_id: id,
                reason: Some("wrong model".into()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(transfer.rejection_reason(), Some("wrong model"));
        let snapshot = transfer.clone();

        let accept = TransferCommand::Accept(AcceptTransfer {
            transfer_id: id,
            occurred_at: test_time(),
        });
        let reject = TransferCommand::Reject(RejectTransfer {
            transfer_id: id,
            reason: None,
            occurred_at: test_time(),
        });
        for cmd in [accept, reject] {
            let err = execute(&mut transfer, &cmd).unwrap_err();
            assert!(matches!(err, DomainError::AlreadyProcessed(_)));
        }
        assert_eq!(transfer, snapshot);
    }

    #[test]
    fn accept_on_unsubmitted_request_is_not_found() {
        let id = TransferId::new();
        let transfer = TransferRequest::empty(id);
        let err = transfer
            .handle(&TransferCommand::Accept(AcceptTransfer {
                transfer_id: id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn record_round_trip_preserves_version() {
        let transfer = submitted();
        let record = transfer.to_record().unwrap();
        let restored = TransferRequest::restore(record.clone());
        assert_eq!(restored.version(), 1);
        assert_eq!(restored.to_record().unwrap(), record);
        assert!(TransferRequest::empty(TransferId::new()).to_record().is_none());
    }
}
