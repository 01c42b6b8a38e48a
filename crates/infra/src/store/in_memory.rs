use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use stockledger_core::StockId;
use stockledger_inventory::{
    AdjustmentRecord, HistoryEntry, StockFilter, StockItem, search_matches,
};

use super::{CommitReport, HistoryWriteFailure, StockStore, StoreError, UnitOfWork};

#[derive(Debug, Default)]
struct Tables {
    stock: HashMap<StockId, StockItem>,
    /// (insertion sequence, entry)
    history: Vec<(u64, HistoryEntry)>,
    adjustments: Vec<(u64, AdjustmentRecord)>,
    next_seq: u64,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn name_taken(&self, name: &str, except: StockId) -> bool {
        self.stock
            .values()
            .any(|s| s.name() == name && s.id_typed() != except)
    }
}

/// In-memory stock store.
///
/// Intended for tests/dev. A unit of work is checked in full before any table
/// is touched, so a rejected commit leaves no partial state behind. Failure
/// switches let tests exercise the history and adjustment error paths.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    tables: RwLock<Tables>,
    fail_history_writes: AtomicBool,
    fail_adjustment_writes: AtomicBool,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every history insert fail until switched off.
    pub fn fail_history_writes(&self, fail: bool) {
        self.fail_history_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every adjustment insert fail until switched off.
    pub fn fail_adjustment_writes(&self, fail: bool) {
        self.fail_adjustment_writes.store(fail, Ordering::SeqCst);
    }

    /// Physically remove a record together with its history and adjustments.
    ///
    /// Storage maintenance only; the service layer never hard-deletes.
    pub fn purge(&self, id: StockId) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let existed = tables.stock.remove(&id).is_some();
        tables.history.retain(|(_, h)| h.stock_id != id);
        tables.adjustments.retain(|(_, a)| a.stock_id != id);
        Ok(existed)
    }

    /// Number of history rows across all records.
    pub fn history_len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.history.len())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn get(&self, id: StockId) -> Result<Option<StockItem>, StoreError> {
        Ok(self.read()?.stock.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<StockItem>, StoreError> {
        Ok(self.read()?.stock.values().find(|s| s.name() == name).cloned())
    }

    async fn list(
        &self,
        filter: &StockFilter,
        low_stock_threshold: i64,
    ) -> Result<Vec<StockItem>, StoreError> {
        let tables = self.read()?;
        let mut out: Vec<StockItem> = tables
            .stock
            .values()
            .filter(|s| filter.matches(s, low_stock_threshold))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.last_modified()
                .cmp(&a.last_modified())
                .then_with(|| a.name().cmp(b.name()))
        });
        Ok(out)
    }

    async fn search(&self, term: &str, limit: usize) -> Result<Vec<StockItem>, StoreError> {
        let tables = self.read()?;
        let mut out: Vec<StockItem> = tables
            .stock
            .values()
            .filter(|s| search_matches(s, term))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out.truncate(limit);
        Ok(out)
    }

    async fn history(&self, id: StockId, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let tables = self.read()?;
        let mut rows: Vec<&(u64, HistoryEntry)> =
            tables.history.iter().filter(|(_, h)| h.stock_id == id).collect();
        rows.sort_by(|(sa, a), (sb, b)| b.changed_at.cmp(&a.changed_at).then(sb.cmp(sa)));
        Ok(rows.into_iter().take(limit).map(|(_, h)| h.clone()).collect())
    }

    async fn adjustments(
        &self,
        id: StockId,
        limit: usize,
    ) -> Result<Vec<AdjustmentRecord>, StoreError> {
        let tables = self.read()?;
        let mut rows: Vec<&(u64, AdjustmentRecord)> = tables
            .adjustments
            .iter()
            .filter(|(_, a)| a.stock_id == id)
            .collect();
        rows.sort_by(|(sa, a), (sb, b)| b.adjusted_at.cmp(&a.adjusted_at).then(sb.cmp(sa)));
        Ok(rows.into_iter().take(limit).map(|(_, a)| a.clone()).collect())
    }

    async fn commit(&self, work: UnitOfWork) -> Result<CommitReport, StoreError> {
        let mut tables = self.write()?;
        let stock_id = work.stock.id_typed();

        // Mandatory part: check everything before mutating.
        if tables.name_taken(work.stock.name(), stock_id) {
            return Err(StoreError::UniqueViolation(work.stock.name().to_string()));
        }
        if let Some(adjustment) = &work.adjustment {
            if adjustment.stock_id != stock_id {
                return Err(StoreError::NotFound(format!(
                    "adjustment references stock {} outside this unit of work",
                    adjustment.stock_id
                )));
            }
            if self.fail_adjustment_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("adjustment insert failed".to_string()));
            }
        }

        tables.stock.insert(stock_id, work.stock);
        if let Some(adjustment) = work.adjustment {
            let seq = tables.next_seq();
            tables.adjustments.push((seq, adjustment));
        }

        let mut report = CommitReport::default();
        let fail_history = self.fail_history_writes.load(Ordering::SeqCst);
        for entry in work.history {
            if fail_history {
                report
                    .history_failures
                    .push(HistoryWriteFailure::new(&entry, "history insert failed"));
                continue;
            }
            if !tables.stock.contains_key(&entry.stock_id) {
                report.history_failures.push(HistoryWriteFailure::new(
                    &entry,
                    format!("stock {} does not exist", entry.stock_id),
                ));
                continue;
            }
            let seq = tables.next_seq();
            tables.history.push((seq, entry));
            report.history_written += 1;
        }

        Ok(report)
    }
}
