//! Pre-write snapshot of a stock record.
//!
//! Right before a pending record is persisted, the stored row is re-read and
//! diffed against the pending state. A missing or unreadable stored row means
//! no generic history entry is written for that save; explicit typed entries
//! (adjustments, purchases, sales) are unaffected.

use tracing::{debug, warn};

use stockledger_core::Entity;
use stockledger_inventory::{StockDiff, StockItem};

use crate::store::StockStore;

/// Diff `pending` against what the store currently holds for the same id.
pub async fn track<S>(store: &S, pending: &StockItem) -> Option<StockDiff>
where
    S: StockStore + ?Sized,
{
    let id = pending.id_typed();
    match store.get(id).await {
        Ok(Some(stored)) if stored.same_identity(pending) => {
            Some(StockDiff::between(&stored, pending))
        }
        Ok(Some(stored)) => {
            warn!(
                stock_id = %id,
                returned = %stored.id_typed(),
                "store returned a different record; skipping generic history entry"
            );
            None
        }
        Ok(None) => {
            debug!(stock_id = %id, "no stored row to snapshot; skipping generic history entry");
            None
        }
        Err(e) => {
            warn!(
                stock_id = %id,
                error = %e,
                "snapshot lookup failed; skipping generic history entry"
            );
            None
        }
    }
}
