//! Postgres-backed stock store.
//!
//! ## Schema
//!
//! Created by [`PostgresStockStore::ensure_schema`]:
//!
//! - `stock`: one row per record, `UNIQUE (name)` across deleted rows too;
//! - `stock_history` and `stock_adjustment`: append-only, `ON DELETE CASCADE`
//!   to `stock`, with a `BIGSERIAL seq` used as the ordering tiebreak.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | RowNotFound | N/A | `NotFound` |
//! | Anything else | Any | `Backend` |
//!
//! ## History writes
//!
//! Each history insert runs inside its own `SAVEPOINT`. A failing insert is
//! rolled back to the savepoint and reported; the surrounding transaction
//! (stock row plus adjustment) still commits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};
use tracing::{Span, instrument, warn};

use stockledger_core::{Actor, AdjustmentId, HistoryEntryId, StockId};
use stockledger_inventory::{
    AdjustmentKind, AdjustmentRecord, ChangeKind, HistoryEntry, StockFilter, StockItem, UnitPrice,
};

use super::{CommitReport, HistoryWriteFailure, StockStore, StoreError, UnitOfWork};

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS stock (
        id            UUID PRIMARY KEY,
        name          VARCHAR(30) NOT NULL UNIQUE,
        quantity      BIGINT NOT NULL CHECK (quantity >= 0),
        unit_price    NUMERIC(10, 2) NOT NULL CHECK (unit_price > 0),
        is_deleted    BOOLEAN NOT NULL DEFAULT FALSE,
        last_modified TIMESTAMPTZ NOT NULL,
        modified_by   VARCHAR(100) NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_history (
        seq               BIGSERIAL PRIMARY KEY,
        id                UUID NOT NULL UNIQUE,
        stock_id          UUID NOT NULL REFERENCES stock (id) ON DELETE CASCADE,
        previous_quantity BIGINT NULL CHECK (previous_quantity >= 0),
        new_quantity      BIGINT NULL CHECK (new_quantity >= 0),
        previous_name     VARCHAR(30) NULL,
        new_name          VARCHAR(30) NULL,
        previous_price    NUMERIC(10, 2) NULL,
        new_price         NUMERIC(10, 2) NULL,
        change_type       VARCHAR(20) NOT NULL,
        changed_by        VARCHAR(100) NOT NULL,
        changed_at        TIMESTAMPTZ NOT NULL,
        reason            TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS stock_history_stock_changed_idx
        ON stock_history (stock_id, changed_at DESC, seq DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_adjustment (
        seq               BIGSERIAL PRIMARY KEY,
        id                UUID NOT NULL UNIQUE,
        stock_id          UUID NOT NULL REFERENCES stock (id) ON DELETE CASCADE,
        previous_quantity BIGINT NOT NULL CHECK (previous_quantity >= 0),
        adjusted_quantity BIGINT NOT NULL CHECK (adjusted_quantity >= 0),
        adjustment_type   VARCHAR(20) NOT NULL,
        reason            TEXT NOT NULL,
        adjusted_by       VARCHAR(100) NOT NULL,
        adjusted_at       TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS stock_adjustment_stock_idx
        ON stock_adjustment (stock_id, adjusted_at DESC, seq DESC)
    "#,
];

const STOCK_COLUMNS: &str =
    "id, name, quantity, unit_price, is_deleted, last_modified, modified_by";

/// Postgres-backed stock store.
///
/// Uses a SQLx connection pool, so it is `Send + Sync` and cheap to clone.
/// Every [`StockStore::commit`] runs in one transaction.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    /// Physically remove a record; history and adjustments cascade.
    #[instrument(skip(self), fields(stock_id = %id), err)]
    pub async fn purge(&self, id: StockId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM stock WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("purge", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    #[instrument(skip(self), fields(stock_id = %id), err)]
    async fn get(&self, id: StockId) -> Result<Option<StockItem>, StoreError> {
        let row = sqlx::query(&format!("SELECT {STOCK_COLUMNS} FROM stock WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;
        row.as_ref().map(stock_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_by_name(&self, name: &str) -> Result<Option<StockItem>, StoreError> {
        let row = sqlx::query(&format!("SELECT {STOCK_COLUMNS} FROM stock WHERE name = $1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_name", e))?;
        row.as_ref().map(stock_from_row).transpose()
    }

    #[instrument(skip(self, filter), err)]
    async fn list(
        &self,
        filter: &StockFilter,
        low_stock_threshold: i64,
    ) -> Result<Vec<StockItem>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {STOCK_COLUMNS} FROM stock WHERE is_deleted = FALSE"
        ));
        if let Some(name) = filter.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            qb.push(" AND POSITION(LOWER(")
                .push_bind(name.to_string())
                .push(") IN LOWER(name)) > 0");
        }
        if let Some(min) = filter.quantity_min {
            qb.push(" AND quantity >= ").push_bind(min);
        }
        if let Some(max) = filter.quantity_max {
            qb.push(" AND quantity <= ").push_bind(max);
        }
        if let Some(min) = filter.price_min {
            qb.push(" AND unit_price >= ").push_bind(min);
        }
        if let Some(max) = filter.price_max {
            qb.push(" AND unit_price <= ").push_bind(max);
        }
        let modified_by = filter.modified_by.as_deref().map(str::trim);
        if let Some(actor) = modified_by.filter(|a| !a.is_empty()) {
            qb.push(" AND POSITION(LOWER(")
                .push_bind(actor.to_string())
                .push(") IN LOWER(COALESCE(modified_by, ''))) > 0");
        }
        if let Some(after) = filter.last_modified_after {
            qb.push(" AND last_modified >= ").push_bind(after);
        }
        if let Some(before) = filter.last_modified_before {
            qb.push(" AND last_modified <= ").push_bind(before);
        }
        if filter.low_stock {
            qb.push(" AND quantity <= ").push_bind(low_stock_threshold);
        }
        if filter.out_of_stock {
            qb.push(" AND quantity = 0");
        }
        qb.push(" ORDER BY last_modified DESC, name");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;
        rows.iter().map(stock_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn search(&self, term: &str, limit: usize) -> Result<Vec<StockItem>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {STOCK_COLUMNS} FROM stock \
             WHERE is_deleted = FALSE AND POSITION(LOWER($1) IN LOWER(name)) > 0 \
             ORDER BY name LIMIT $2"
        ))
        .bind(term)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("search", e))?;
        rows.iter().map(stock_from_row).collect()
    }

    #[instrument(skip(self), fields(stock_id = %id), err)]
    async fn history(&self, id: StockId, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                stock_id,
                previous_quantity,
                new_quantity,
                previous_name,
                new_name,
                previous_price,
                new_price,
                change_type,
                changed_by,
                changed_at,
                reason
            FROM stock_history
            WHERE stock_id = $1
            ORDER BY changed_at DESC, seq DESC
            LIMIT $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("history", e))?;
        rows.iter().map(history_from_row).collect()
    }

    #[instrument(skip(self), fields(stock_id = %id), err)]
    async fn adjustments(
        &self,
        id: StockId,
        limit: usize,
    ) -> Result<Vec<AdjustmentRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                stock_id,
                previous_quantity,
                adjusted_quantity,
                adjustment_type,
                reason,
                adjusted_by,
                adjusted_at
            FROM stock_adjustment
            WHERE stock_id = $1
            ORDER BY adjusted_at DESC, seq DESC
            LIMIT $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("adjustments", e))?;
        rows.iter().map(adjustment_from_row).collect()
    }

    #[instrument(
        skip(self, work),
        fields(
            stock_id = %work.stock.id_typed(),
            history_entries = work.history.len(),
            history_failures = tracing::field::Empty
        ),
        err
    )]
    async fn commit(&self, work: UnitOfWork) -> Result<CommitReport, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        upsert_stock(&mut tx, &work.stock)
            .await
            .map_err(|e| map_sqlx_error("upsert_stock", e))?;

        if let Some(adjustment) = &work.adjustment {
            insert_adjustment(&mut tx, adjustment)
                .await
                .map_err(|e| map_sqlx_error("insert_adjustment", e))?;
        }

        let mut report = CommitReport::default();
        for entry in &work.history {
            sqlx::query("SAVEPOINT history_entry")
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("savepoint", e))?;

            match insert_history(&mut tx, entry).await {
                Ok(()) => {
                    sqlx::query("RELEASE SAVEPOINT history_entry")
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error("release_savepoint", e))?;
                    report.history_written += 1;
                }
                Err(e) => {
                    warn!(history_id = %entry.id, error = %e, "history insert failed");
                    sqlx::query("ROLLBACK TO SAVEPOINT history_entry")
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| map_sqlx_error("rollback_savepoint", e))?;
                    report
                        .history_failures
                        .push(HistoryWriteFailure::new(entry, e.to_string()));
                }
            }
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Span::current().record("history_failures", report.history_failures.len());
        Ok(report)
    }
}

async fn upsert_stock(conn: &mut PgConnection, stock: &StockItem) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO stock (id, name, quantity, unit_price, is_deleted, last_modified, modified_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            quantity = EXCLUDED.quantity,
            unit_price = EXCLUDED.unit_price,
            is_deleted = EXCLUDED.is_deleted,
            last_modified = EXCLUDED.last_modified,
            modified_by = EXCLUDED.modified_by
        "#,
    )
    .bind(stock.id_typed().as_uuid())
    .bind(stock.name())
    .bind(stock.quantity())
    .bind(stock.unit_price().amount())
    .bind(stock.is_deleted())
    .bind(stock.last_modified())
    .bind(stock.modified_by().map(Actor::as_str))
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_adjustment(
    conn: &mut PgConnection,
    adjustment: &AdjustmentRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO stock_adjustment (
            id, stock_id, previous_quantity, adjusted_quantity,
            adjustment_type, reason, adjusted_by, adjusted_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(adjustment.id.as_uuid())
    .bind(adjustment.stock_id.as_uuid())
    .bind(adjustment.previous_quantity)
    .bind(adjustment.adjusted_quantity)
    .bind(adjustment.kind.as_str())
    .bind(&adjustment.reason)
    .bind(adjustment.adjusted_by.as_str())
    .bind(adjustment.adjusted_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_history(conn: &mut PgConnection, entry: &HistoryEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO stock_history (
            id, stock_id, previous_quantity, new_quantity, previous_name, new_name,
            previous_price, new_price, change_type, changed_by, changed_at, reason
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(entry.id.as_uuid())
    .bind(entry.stock_id.as_uuid())
    .bind(entry.previous_quantity)
    .bind(entry.new_quantity)
    .bind(entry.previous_name.as_deref())
    .bind(entry.new_name.as_deref())
    .bind(entry.previous_price.map(|p| p.amount()))
    .bind(entry.new_price.map(|p| p.amount()))
    .bind(entry.kind.as_str())
    .bind(entry.changed_by.as_str())
    .bind(entry.changed_at)
    .bind(&entry.reason)
    .execute(conn)
    .await?;
    Ok(())
}

fn stock_from_row(row: &PgRow) -> Result<StockItem, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(decode)?;
    let price: Decimal = row.try_get("unit_price").map_err(decode)?;
    let last_modified: DateTime<Utc> = row.try_get("last_modified").map_err(decode)?;
    let modified_by: Option<String> = row.try_get("modified_by").map_err(decode)?;
    Ok(StockItem::from_stored(
        StockId::from_uuid(id),
        row.try_get("name").map_err(decode)?,
        row.try_get("quantity").map_err(decode)?,
        decode_price(price)?,
        row.try_get("is_deleted").map_err(decode)?,
        last_modified,
        modified_by.map(decode_actor).transpose()?,
    ))
}

fn history_from_row(row: &PgRow) -> Result<HistoryEntry, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(decode)?;
    let stock_id: uuid::Uuid = row.try_get("stock_id").map_err(decode)?;
    let previous_price: Option<Decimal> = row.try_get("previous_price").map_err(decode)?;
    let new_price: Option<Decimal> = row.try_get("new_price").map_err(decode)?;
    let change_type: String = row.try_get("change_type").map_err(decode)?;
    let changed_by: String = row.try_get("changed_by").map_err(decode)?;
    Ok(HistoryEntry {
        id: HistoryEntryId::from_uuid(id),
        stock_id: StockId::from_uuid(stock_id),
        previous_quantity: row.try_get("previous_quantity").map_err(decode)?,
        new_quantity: row.try_get("new_quantity").map_err(decode)?,
        previous_name: row.try_get("previous_name").map_err(decode)?,
        new_name: row.try_get("new_name").map_err(decode)?,
        previous_price: previous_price.map(decode_price).transpose()?,
        new_price: new_price.map(decode_price).transpose()?,
        kind: change_type
            .parse::<ChangeKind>()
            .map_err(|e| StoreError::Decode(e.to_string()))?,
        changed_by: decode_actor(changed_by)?,
        changed_at: row.try_get("changed_at").map_err(decode)?,
        reason: row.try_get("reason").map_err(decode)?,
    })
}

fn adjustment_from_row(row: &PgRow) -> Result<AdjustmentRecord, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(decode)?;
    let stock_id: uuid::Uuid = row.try_get("stock_id").map_err(decode)?;
    let kind: String = row.try_get("adjustment_type").map_err(decode)?;
    let adjusted_by: String = row.try_get("adjusted_by").map_err(decode)?;
    Ok(AdjustmentRecord {
        id: AdjustmentId::from_uuid(id),
        stock_id: StockId::from_uuid(stock_id),
        previous_quantity: row.try_get("previous_quantity").map_err(decode)?,
        adjusted_quantity: row.try_get("adjusted_quantity").map_err(decode)?,
        kind: kind
            .parse::<AdjustmentKind>()
            .map_err(|e| StoreError::Decode(e.to_string()))?,
        reason: row.try_get("reason").map_err(decode)?,
        adjusted_by: decode_actor(adjusted_by)?,
        adjusted_at: row.try_get("adjusted_at").map_err(decode)?,
    })
}

fn decode(err: sqlx::Error) -> StoreError {
    StoreError::Decode(err.to_string())
}

fn decode_price(amount: Decimal) -> Result<UnitPrice, StoreError> {
    UnitPrice::new(amount).map_err(|e| StoreError::Decode(e.to_string()))
}

fn decode_actor(name: String) -> Result<Actor, StoreError> {
    Actor::new(name).map_err(|e| StoreError::Decode(e.to_string()))
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row not found in {operation}")),
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}
