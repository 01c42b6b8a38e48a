//! Best-effort history logging.
//!
//! History entries never block the stock write they describe. An entry that
//! fails its shape check is dropped before it reaches the store; an entry the
//! store cannot insert is dropped by the store. Either way the failure goes to
//! an [`AuditSink`] and the surrounding operation succeeds.

use std::sync::{Arc, Mutex};

use tracing::error;

use stockledger_core::{HistoryEntryId, StockId};
use stockledger_inventory::{ChangeKind, HistoryEntry};

use crate::store::{CommitReport, UnitOfWork};

/// Where a history entry was lost.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuditStage {
    /// Rejected by [`HistoryEntry::validate`] before the write.
    Staging,
    /// Rejected by the store during the write.
    Write,
}

impl AuditStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStage::Staging => "staging",
            AuditStage::Write => "write",
        }
    }
}

/// A history entry that was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFailure {
    pub entry_id: HistoryEntryId,
    pub stock_id: StockId,
    pub kind: ChangeKind,
    pub stage: AuditStage,
    pub error: String,
}

/// Receiver for dropped history entries.
pub trait AuditSink: Send + Sync + 'static {
    fn history_dropped(&self, failure: &AuditFailure);
}

/// Default sink: one structured error event per dropped entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn history_dropped(&self, failure: &AuditFailure) {
        error!(
            target: "stockledger::audit",
            stock_id = %failure.stock_id,
            history_id = %failure.entry_id,
            change_type = %failure.kind,
            stage = failure.stage.as_str(),
            error = %failure.error,
            "history entry dropped"
        );
    }
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    inner: Mutex<Vec<AuditFailure>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<AuditFailure> {
        self.inner.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl AuditSink for RecordingAuditSink {
    fn history_dropped(&self, failure: &AuditFailure) {
        if let Ok(mut v) = self.inner.lock() {
            v.push(failure.clone());
        }
    }
}

/// Stages history entries into a unit of work and reports what was lost.
#[derive(Clone)]
pub struct HistoryLogger {
    sink: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for HistoryLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLogger").finish_non_exhaustive()
    }
}

impl Default for HistoryLogger {
    fn default() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }
}

impl HistoryLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Add `entry` to `work` if it passes validation. Returns whether it was staged.
    pub fn stage(&self, work: &mut UnitOfWork, entry: HistoryEntry) -> bool {
        match entry.validate() {
            Ok(()) => {
                work.history.push(entry);
                true
            }
            Err(e) => {
                self.sink.history_dropped(&AuditFailure {
                    entry_id: entry.id,
                    stock_id: entry.stock_id,
                    kind: entry.kind,
                    stage: AuditStage::Staging,
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Forward store-side history failures from a finished commit.
    pub fn report(&self, report: &CommitReport) {
        for failure in &report.history_failures {
            self.sink.history_dropped(&AuditFailure {
                entry_id: failure.entry_id,
                stock_id: failure.stock_id,
                kind: failure.kind,
                stage: AuditStage::Write,
                error: failure.error.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HistoryWriteFailure;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockledger_core::Actor;
    use stockledger_inventory::{StockItem, UnitPrice};

    fn widget() -> StockItem {
        StockItem::create(
            "Widget",
            50,
            UnitPrice::new(dec!(2.50)).unwrap(),
            Actor::system(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn invalid_entry_is_dropped_and_reported() {
        let sink = Arc::new(RecordingAuditSink::new());
        let logger = HistoryLogger::new(sink.clone());
        let item = widget();
        let mut work = UnitOfWork::new(item.clone());

        let mut broken = HistoryEntry::movement(
            item.id_typed(),
            ChangeKind::Sale,
            50,
            40,
            &Actor::system(),
            "sold",
            Utc::now(),
        );
        broken.new_quantity = None;

        assert!(!logger.stage(&mut work, broken));
        let entry = HistoryEntry::created(&item, &Actor::system(), Utc::now());
        assert!(logger.stage(&mut work, entry));
        assert_eq!(work.history.len(), 1);

        let failures = sink.all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, AuditStage::Staging);
        assert_eq!(failures[0].kind, ChangeKind::Sale);
    }

    #[test]
    fn store_failures_are_forwarded() {
        let sink = Arc::new(RecordingAuditSink::new());
        let logger = HistoryLogger::new(sink.clone());
        let entry = HistoryEntry::created(&widget(), &Actor::system(), Utc::now());
        let report = CommitReport {
            history_written: 0,
            history_failures: vec![HistoryWriteFailure::new(&entry, "disk full")],
        };

        logger.report(&report);
        let failures = sink.all();
        assert_eq!(failures[0].stage, AuditStage::Write);
        assert_eq!(failures[0].error, "disk full");
        assert_eq!(failures[0].entry_id, entry.id);
    }
}
