//! Postgres-backed store.
//!
//! A unit of work is one database transaction. Rows about to be changed are
//! read `FOR UPDATE`: two concurrent `accept` calls on the same transfer queue
//! up on the transfer row, and the second one observes the first one's
//! committed status. Ledger rows are materialized before they are locked, so
//! writers starting from a legacy field or from nothing queue up too.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (check violation) | `23514` | `Backend` |
//! | Database (other) | any | `Backend` |
//! | PoolClosed / RowNotFound / Other | N/A | `Backend` |

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockline_catalog::{Category, ItemType, ItemTypeId, ItemTypeSpec, PackagingRule, PackagingType};
use stockline_core::{ExpectedVersion, TransferId};
use stockline_inventory::{InventoryRecord, OwnerKind, OwnerRef, StockCounters};
use stockline_transfers::{TransferRecord, TransferStatus};

use super::{StockStore, StockTx, StoreError, TransferFilter};

/// Schema, applied in order by `migrate()`. Every statement is idempotent.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS item_types (
        id             TEXT PRIMARY KEY,
        name_local     TEXT NOT NULL,
        name_alt       TEXT NOT NULL,
        category       TEXT NOT NULL,
        packaging_rule TEXT NOT NULL,
        units_per_box  BIGINT NOT NULL CHECK (units_per_box > 0),
        is_active      BOOLEAN NOT NULL,
        is_visible     BOOLEAN NOT NULL,
        sort_order     INTEGER NOT NULL,
        created_at     TIMESTAMPTZ NOT NULL,
        updated_at     TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inventory_records (
        owner_kind   TEXT NOT NULL,
        owner_id     UUID NOT NULL,
        item_type_id TEXT NOT NULL,
        boxes        BIGINT NOT NULL CHECK (boxes >= 0),
        units        BIGINT NOT NULL CHECK (units >= 0),
        updated_at   TIMESTAMPTZ NULL,
        PRIMARY KEY (owner_kind, owner_id, item_type_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS legacy_stock_fields (
        owner_kind   TEXT NOT NULL,
        owner_id     UUID NOT NULL,
        item_type_id TEXT NOT NULL,
        boxes        BIGINT NOT NULL CHECK (boxes >= 0),
        units        BIGINT NOT NULL CHECK (units >= 0),
        PRIMARY KEY (owner_kind, owner_id, item_type_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transfer_requests (
        id               UUID PRIMARY KEY,
        warehouse_id     UUID NOT NULL,
        technician_id    UUID NOT NULL,
        item_type_id     TEXT NOT NULL,
        packaging_type   TEXT NOT NULL,
        quantity         BIGINT NOT NULL CHECK (quantity > 0),
        performed_by     UUID NOT NULL,
        notes            TEXT NULL,
        status           TEXT NOT NULL,
        rejection_reason TEXT NULL,
        created_at       TIMESTAMPTZ NOT NULL,
        responded_at     TIMESTAMPTZ NULL,
        version          BIGINT NOT NULL
    )
    "#,
    // Serves both the technician listing and the grouping key prefix.
    r#"
    CREATE INDEX IF NOT EXISTS transfer_requests_grouping_idx
        ON transfer_requests (warehouse_id, technician_id, created_at DESC)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS transfer_requests_technician_idx
        ON transfer_requests (technician_id, created_at DESC)
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if missing.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn begin(&self) -> Result<Box<dyn StockTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockTx for PostgresTx {
    async fn item_type(&mut self, id: &ItemTypeId) -> Result<Option<ItemType>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name_local, name_alt, category, packaging_rule, units_per_box,
                   is_active, is_visible, sort_order, created_at, updated_at
            FROM item_types
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("item_type", e))?;

        row.as_ref().map(item_type_from_row).transpose()
    }

    async fn item_types(&mut self) -> Result<Vec<ItemType>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name_local, name_alt, category, packaging_rule, units_per_box,
                   is_active, is_visible, sort_order, created_at, updated_at
            FROM item_types
            ORDER BY sort_order ASC, id ASC
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("item_types", e))?;

        rows.iter().map(item_type_from_row).collect()
    }

    async fn insert_item_type(&mut self, item: &ItemType) -> Result<(), StoreError> {
        let spec = item.spec();
        sqlx::query(
            r#"
            INSERT INTO item_types (
                id, name_local, name_alt, category, packaging_rule, units_per_box,
                is_active, is_visible, sort_order, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(item.id().as_str())
        .bind(&spec.name_local)
        .bind(&spec.name_alt)
        .bind(spec.category.as_str())
        .bind(spec.packaging_rule.as_str())
        .bind(spec.units_per_box)
        .bind(spec.is_active)
        .bind(spec.is_visible)
        .bind(spec.sort_order)
        .bind(item.created_at())
        .bind(item.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item_type", e))?;
        Ok(())
    }

    async fn update_item_type(&mut self, item: &ItemType) -> Result<(), StoreError> {
        let spec = item.spec();
        let result = sqlx::query(
            r#"
            UPDATE item_types SET
                name_local = $2, name_alt = $3, category = $4, packaging_rule = $5,
                units_per_box = $6, is_active = $7, is_visible = $8, sort_order = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(item.id().as_str())
        .bind(&spec.name_local)
        .bind(&spec.name_alt)
        .bind(spec.category.as_str())
        .bind(spec.packaging_rule.as_str())
        .bind(spec.units_per_box)
        .bind(spec.is_active)
        .bind(spec.is_visible)
        .bind(spec.sort_order)
        .bind(item.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_item_type", e))?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Backend(format!(
                "item type '{}' vanished before update",
                item.id()
            )));
        }
        Ok(())
    }

    async fn ledger_record(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT owner_kind, owner_id, item_type_id, boxes, units, updated_at
            FROM inventory_records
            WHERE owner_kind = $1 AND owner_id = $2 AND item_type_id = $3
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.id)
        .bind(item_type_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("ledger_record", e))?;

        row.as_ref().map(ledger_record_from_row).transpose()
    }

    async fn lock_ledger_record(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
    ) -> Result<InventoryRecord, StoreError> {
        // A concurrent insert of the same key blocks here until it commits or
        // rolls back; the lock below then sees the committed row.
        sqlx::query(
            r#"
            INSERT INTO inventory_records (owner_kind, owner_id, item_type_id, boxes, units, updated_at)
            SELECT $1, $2, $3, COALESCE(l.boxes, 0), COALESCE(l.units, 0), NULL
            FROM (SELECT 1) AS seed
            LEFT JOIN legacy_stock_fields l
              ON l.owner_kind = $1 AND l.owner_id = $2 AND l.item_type_id = $3
            ON CONFLICT (owner_kind, owner_id, item_type_id) DO NOTHING
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.id)
        .bind(item_type_id.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("materialize_ledger_record", e))?;

        let row = sqlx::query(
            r#"
            SELECT owner_kind, owner_id, item_type_id, boxes, units, updated_at
            FROM inventory_records
            WHERE owner_kind = $1 AND owner_id = $2 AND item_type_id = $3
            FOR UPDATE
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.id)
        .bind(item_type_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_ledger_record", e))?
        .ok_or_else(|| {
            StoreError::Backend(format!("ledger record {owner}/{item_type_id} vanished after insert"))
        })?;

        ledger_record_from_row(&row)
    }

    async fn ledger_records(&mut self, owner: OwnerRef) -> Result<Vec<InventoryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT owner_kind, owner_id, item_type_id, boxes, units, updated_at
            FROM inventory_records
            WHERE owner_kind = $1 AND owner_id = $2
            ORDER BY item_type_id ASC
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("ledger_records", e))?;

        rows.iter().map(ledger_record_from_row).collect()
    }

    async fn put_ledger_record(&mut self, record: &InventoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_records (owner_kind, owner_id, item_type_id, boxes, units, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (owner_kind, owner_id, item_type_id)
            DO UPDATE SET
                boxes = EXCLUDED.boxes,
                units = EXCLUDED.units,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.owner_kind.as_str())
        .bind(record.owner_id)
        .bind(record.item_type_id.as_str())
        .bind(record.boxes)
        .bind(record.units)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("put_ledger_record", e))?;
        Ok(())
    }

    async fn legacy_counters(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
    ) -> Result<Option<StockCounters>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT boxes, units
            FROM legacy_stock_fields
            WHERE owner_kind = $1 AND owner_id = $2 AND item_type_id = $3
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.id)
        .bind(item_type_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("legacy_counters", e))?;

        row.as_ref().map(counters_from_row).transpose()
    }

    async fn legacy_entries(
        &mut self,
        owner: OwnerRef,
    ) -> Result<Vec<(ItemTypeId, StockCounters)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT item_type_id, boxes, units
            FROM legacy_stock_fields
            WHERE owner_kind = $1 AND owner_id = $2
            ORDER BY item_type_id ASC
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("legacy_entries", e))?;

        rows.iter()
            .map(|row| {
                let id: String = get(row, "item_type_id")?;
                Ok((parse_column("item_type_id", &id, ItemTypeId::from_str)?, counters_from_row(row)?))
            })
            .collect()
    }

    async fn put_legacy_counters(
        &mut self,
        owner: OwnerRef,
        item_type_id: &ItemTypeId,
        counters: StockCounters,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO legacy_stock_fields (owner_kind, owner_id, item_type_id, boxes, units)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_kind, owner_id, item_type_id)
            DO UPDATE SET boxes = EXCLUDED.boxes, units = EXCLUDED.units
            "#,
        )
        .bind(owner.kind.as_str())
        .bind(owner.id)
        .bind(item_type_id.as_str())
        .bind(counters.boxes)
        .bind(counters.units)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("put_legacy_counters", e))?;
        Ok(())
    }

    async fn transfer(&mut self, id: TransferId) -> Result<Option<TransferRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, warehouse_id, technician_id, item_type_id, packaging_type, quantity,
                   performed_by, notes, status, rejection_reason, created_at, responded_at, version
            FROM transfer_requests
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("transfer", e))?;

        row.as_ref().map(transfer_from_row).transpose()
    }

    async fn insert_transfer(&mut self, row: &TransferRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transfer_requests (
                id, warehouse_id, technician_id, item_type_id, packaging_type, quantity,
                performed_by, notes, status, rejection_reason, created_at, responded_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(row.id.as_uuid())
        .bind(row.warehouse_id.as_uuid())
        .bind(row.technician_id.as_uuid())
        .bind(row.item_type_id.as_str())
        .bind(row.packaging_type.as_str())
        .bind(row.quantity)
        .bind(row.performed_by.as_uuid())
        .bind(row.notes.as_deref())
        .bind(row.status.as_str())
        .bind(row.rejection_reason.as_deref())
        .bind(row.created_at)
        .bind(row.responded_at)
        .bind(row.version as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transfer", e))?;
        Ok(())
    }

    async fn update_transfer(
        &mut self,
        row: &TransferRecord,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let expected_version: Option<i64> = match expected {
            ExpectedVersion::Any => None,
            ExpectedVersion::Exact(v) => Some(v as i64),
        };

        let result = sqlx::query(
            r#"
            UPDATE transfer_requests SET
                status = $2,
                rejection_reason = $3,
                responded_at = $4,
                notes = $5,
                version = $6
            WHERE id = $1
              AND ($7::bigint IS NULL OR version = $7)
            "#,
        )
        .bind(row.id.as_uuid())
        .bind(row.status.as_str())
        .bind(row.rejection_reason.as_deref())
        .bind(row.responded_at)
        .bind(row.notes.as_deref())
        .bind(row.version as i64)
        .bind(expected_version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_transfer", e))?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Conflict(format!(
                "transfer {}: optimistic concurrency check failed (expected {expected:?})",
                row.id
            )));
        }
        Ok(())
    }

    async fn transfers(&mut self, filter: &TransferFilter) -> Result<Vec<TransferRecord>, StoreError> {
        let technician: Option<Uuid> = filter.technician_id.map(Uuid::from);
        let warehouse: Option<Uuid> = filter.warehouse_id.map(Uuid::from);
        let status: Option<&str> = filter.status.map(TransferStatus::as_str);

        let rows = sqlx::query(
            r#"
            SELECT id, warehouse_id, technician_id, item_type_id, packaging_type, quantity,
                   performed_by, notes, status, rejection_reason, created_at, responded_at, version
            FROM transfer_requests
            WHERE ($1::uuid IS NULL OR technician_id = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(technician)
        .bind(warehouse)
        .bind(status)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("transfers", e))?;

        rows.iter().map(transfer_from_row).collect()
    }

    async fn delete_transfers(&mut self, ids: &[TransferId]) -> Result<u64, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| Uuid::from(*id)).collect();
        let result = sqlx::query("DELETE FROM transfer_requests WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_transfers", e))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read {column}: {e}")))
}

fn parse_column<T, E: core::fmt::Display>(
    column: &str,
    raw: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, StoreError> {
    parse(raw).map_err(|e| StoreError::Backend(format!("malformed {column} '{raw}': {e}")))
}

fn item_type_from_row(row: &PgRow) -> Result<ItemType, StoreError> {
    let id: String = get(row, "id")?;
    let category: String = get(row, "category")?;
    let rule: String = get(row, "packaging_rule")?;

    let spec = ItemTypeSpec {
        name_local: get(row, "name_local")?,
        name_alt: get(row, "name_alt")?,
        category: parse_column("category", &category, Category::from_str)?,
        packaging_rule: parse_column("packaging_rule", &rule, PackagingRule::from_str)?,
        units_per_box: get(row, "units_per_box")?,
        is_active: get(row, "is_active")?,
        is_visible: get(row, "is_visible")?,
        sort_order: get(row, "sort_order")?,
    };

    Ok(ItemType::restore(
        parse_column("id", &id, ItemTypeId::from_str)?,
        spec,
        get(row, "created_at")?,
        get(row, "updated_at")?,
    ))
}

fn counters_from_row(row: &PgRow) -> Result<StockCounters, StoreError> {
    Ok(StockCounters {
        boxes: get(row, "boxes")?,
        units: get(row, "units")?,
    })
}

fn ledger_record_from_row(row: &PgRow) -> Result<InventoryRecord, StoreError> {
    let kind: String = get(row, "owner_kind")?;
    let item: String = get(row, "item_type_id")?;
    let owner = OwnerRef::new(
        parse_column("owner_kind", &kind, OwnerKind::from_str)?,
        get(row, "owner_id")?,
    );

    Ok(InventoryRecord::with_counters(
        owner,
        parse_column("item_type_id", &item, ItemTypeId::from_str)?,
        counters_from_row(row)?,
        get(row, "updated_at")?,
    ))
}

fn transfer_from_row(row: &PgRow) -> Result<TransferRecord, StoreError> {
    let item: String = get(row, "item_type_id")?;
    let packaging: String = get(row, "packaging_type")?;
    let status: String = get(row, "status")?;
    let version: i64 = get(row, "version")?;

    Ok(TransferRecord {
        id: get::<Uuid>(row, "id")?.into(),
        warehouse_id: get::<Uuid>(row, "warehouse_id")?.into(),
        technician_id: get::<Uuid>(row, "technician_id")?.into(),
        item_type_id: parse_column("item_type_id", &item, ItemTypeId::from_str)?,
        packaging_type: parse_column("packaging_type", &packaging, PackagingType::from_str)?,
        quantity: get(row, "quantity")?,
        performed_by: get::<Uuid>(row, "performed_by")?.into(),
        notes: get(row, "notes")?,
        status: parse_column("status", &status, TransferStatus::from_str)?,
        rejection_reason: get(row, "rejection_reason")?,
        created_at: get(row, "created_at")?,
        responded_at: get(row, "responded_at")?,
        version: version.max(0) as u64,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
