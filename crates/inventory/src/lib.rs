//! Inventory domain module.
//!
//! Business rules for stock records, their audit trail and adjustments,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).
//! Orchestration of writes lives in `stockledger-infra`.

pub mod adjustment;
pub mod availability;
pub mod diff;
pub mod filter;
pub mod history;
pub mod price;
pub mod report;
pub mod stock;

pub use adjustment::{AdjustmentKind, AdjustmentRecord};
pub use availability::{Availability, check_availability};
pub use diff::{DeleteTransition, FieldChange, StockDiff};
pub use filter::{
    DEFAULT_LOW_STOCK_THRESHOLD, SEARCH_LIMIT, StockFilter, search_matches, search_term,
};
pub use history::{ChangeKind, HistoryEntry, reason_for, select_kind};
pub use price::UnitPrice;
pub use report::{ReportLine, StockReport, ValuationSummary};
pub use stock::{MAX_NAME_LEN, StockItem};
