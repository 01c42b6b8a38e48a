//! Stock persistence abstractions.
//!
//! A store persists three things: the current [`StockItem`] rows, their
//! append-only [`HistoryEntry`] trail, and [`AdjustmentRecord`]s. Writes go
//! through [`StockStore::commit`], which applies one [`UnitOfWork`]:
//!
//! - the stock row and the optional adjustment record are **mandatory**: if
//!   either fails, nothing from the unit of work is persisted;
//! - history entries are **best-effort**: an entry that cannot be written is
//!   skipped and reported back in [`CommitReport::history_failures`], while the
//!   rest of the unit of work still commits.

use async_trait::async_trait;
use thiserror::Error;

use stockledger_core::{HistoryEntryId, StockId};
use stockledger_inventory::{AdjustmentRecord, ChangeKind, HistoryEntry, StockFilter, StockItem};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;

/// Storage-level failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another record already uses this name (deleted records included).
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    /// A referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored row could not be turned back into a domain value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Connection, transaction or query failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Everything one logical write persists.
#[derive(Debug, Clone)]
pub struct UnitOfWork {
    /// Saved as an upsert keyed by id.
    pub stock: StockItem,
    pub adjustment: Option<AdjustmentRecord>,
    /// Written in order; ordering is preserved as the "most recent" tiebreak.
    pub history: Vec<HistoryEntry>,
}

impl UnitOfWork {
    pub fn new(stock: StockItem) -> Self {
        Self {
            stock,
            adjustment: None,
            history: Vec::new(),
        }
    }

    pub fn with_adjustment(mut self, adjustment: AdjustmentRecord) -> Self {
        self.adjustment = Some(adjustment);
        self
    }
}

/// A history entry the store could not write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWriteFailure {
    pub entry_id: HistoryEntryId,
    pub stock_id: StockId,
    pub kind: ChangeKind,
    pub error: String,
}

impl HistoryWriteFailure {
    pub fn new(entry: &HistoryEntry, error: impl Into<String>) -> Self {
        Self {
            entry_id: entry.id,
            stock_id: entry.stock_id,
            kind: entry.kind,
            error: error.into(),
        }
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub history_written: usize,
    pub history_failures: Vec<HistoryWriteFailure>,
}

/// Stock record storage.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Load a record by id, deleted or not.
    async fn get(&self, id: StockId) -> Result<Option<StockItem>, StoreError>;

    /// Exact-name lookup across all records, deleted ones included.
    async fn find_by_name(&self, name: &str) -> Result<Option<StockItem>, StoreError>;

    /// Live records matching `filter`, most recently modified first.
    async fn list(
        &self,
        filter: &StockFilter,
        low_stock_threshold: i64,
    ) -> Result<Vec<StockItem>, StoreError>;

    /// Live records whose name contains `term` (case-insensitive), ordered by name.
    async fn search(&self, term: &str, limit: usize) -> Result<Vec<StockItem>, StoreError>;

    /// History of one record, most recent first.
    async fn history(&self, id: StockId, limit: usize) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Adjustment records of one record, most recent first.
    async fn adjustments(
        &self,
        id: StockId,
        limit: usize,
    ) -> Result<Vec<AdjustmentRecord>, StoreError>;

    /// Apply one unit of work atomically (history best-effort, see module docs).
    async fn commit(&self, work: UnitOfWork) -> Result<CommitReport, StoreError>;
}

#[async_trait]
impl<S> StockStore for std::sync::Arc<S>
where
    S: StockStore + ?Sized,
{
    async fn get(&self, id: StockId) -> Result<Option<StockItem>, StoreError> {
        (**self).get(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<StockItem>, StoreError> {
        (**self).find_by_name(name).await
    }

    async fn list(
        &self,
        filter: &StockFilter,
        low_stock_threshold: i64,
    ) -> Result<Vec<StockItem>, StoreError> {
        (**self).list(filter, low_stock_threshold).await
    }

    async fn search(&self, term: &str, limit: usize) -> Result<Vec<StockItem>, StoreError> {
        (**self).search(term, limit).await
    }

    async fn history(&self, id: StockId, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        (**self).history(id, limit).await
    }

    async fn adjustments(
        &self,
        id: StockId,
        limit: usize,
    ) -> Result<Vec<AdjustmentRecord>, StoreError> {
        (**self).adjustments(id, limit).await
    }

    async fn commit(&self, work: UnitOfWork) -> Result<CommitReport, StoreError> {
        (**self).commit(work).await
    }
}
