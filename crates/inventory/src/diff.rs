//! Field-level diff between a stored stock record and its pending write.
//!
//! The diff is computed from the stored version *before* the write lands and
//! is handed to the history logger as a plain value; nothing is stashed on
//! the entity itself.

use serde::{Deserialize, Serialize};

use stockledger_core::StockId;

use crate::price::UnitPrice;
use crate::stock::StockItem;

/// Before/after pair for one changed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange<T> {
    pub previous: T,
    pub new: T,
}

impl<T: PartialEq> FieldChange<T> {
    fn between(previous: T, new: T) -> Option<Self> {
        if previous == new {
            None
        } else {
            Some(Self { previous, new })
        }
    }
}

/// Direction of a soft-delete flag change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeleteTransition {
    Deleted,
    Restored,
}

/// Changed fields of one stock record. `None` means unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDiff {
    pub stock_id: StockId,
    pub quantity: Option<FieldChange<i64>>,
    pub name: Option<FieldChange<String>>,
    pub unit_price: Option<FieldChange<UnitPrice>>,
    pub deleted: Option<FieldChange<bool>>,
}

impl StockDiff {
    /// Diff `stored` (the persisted version) against `pending`.
    pub fn between(stored: &StockItem, pending: &StockItem) -> Self {
        Self {
            stock_id: pending.id_typed(),
            quantity: FieldChange::between(stored.quantity(), pending.quantity()),
            name: FieldChange::between(stored.name().to_string(), pending.name().to_string()),
            unit_price: FieldChange::between(stored.unit_price(), pending.unit_price()),
            deleted: FieldChange::between(stored.is_deleted(), pending.is_deleted()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_none()
            && self.name.is_none()
            && self.unit_price.is_none()
            && self.deleted.is_none()
    }

    pub fn delete_transition(&self) -> Option<DeleteTransition> {
        match &self.deleted {
            Some(FieldChange { previous: false, new: true }) => Some(DeleteTransition::Deleted),
            Some(FieldChange { previous: true, new: false }) => Some(DeleteTransition::Restored),
            _ => None,
        }
    }

    /// `"Field: old → new"` fragments in name, price, quantity order.
    ///
    /// The delete flag is not summarized; it is carried by the entry kind.
    pub fn summary(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(c) = &self.name {
            parts.push(format!("Name: {} → {}", c.previous, c.new));
        }
        if let Some(c) = &self.unit_price {
            parts.push(format!("Price: ${} → ${}", c.previous, c.new));
        }
        if let Some(c) = &self.quantity {
            parts.push(format!("Quantity: {} → {}", c.previous, c.new));
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockledger_core::Actor;

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
    fn identical_records_produce_empty_diff() {
        let stored = widget();
        let diff = StockDiff::between(&stored, &stored.clone());
        assert!(diff.is_empty());
        assert!(diff.summary().is_empty());
        assert_eq!(diff.delete_transition(), None);
    }

    #[test]
    fn metadata_changes_are_not_diffed() {
        let stored = widget();
        let mut pending = stored.clone();
        pending.touch(&Actor::new("bob").unwrap(), Utc::now());
        assert!(StockDiff::between(&stored, &pending).is_empty());
    }

    #[test]
    fn summary_orders_name_price_quantity() {
        let stored = widget();
        let mut pending = stored.clone();
        pending.set_quantity(45).unwrap();
        pending.set_unit_price(UnitPrice::new(dec!(3)).unwrap());
        pending.rename("Gadget").unwrap();

        let diff = StockDiff::between(&stored, &pending);
        assert_eq!(
            diff.summary(),
            vec![
                "Name: Widget → Gadget".to_string(),
                "Price: $2.50 → $3.00".to_string(),
                "Quantity: 50 → 45".to_string(),
            ]
        );
        assert_eq!(diff.quantity, Some(FieldChange { previous: 50, new: 45 }));
    }

    #[test]
    fn delete_flag_transitions() {
        let stored = widget();
        let mut deleted = stored.clone();
        deleted.mark_deleted();

        let d = StockDiff::between(&stored, &deleted);
        assert_eq!(d.delete_transition(), Some(DeleteTransition::Deleted));
        assert!(d.summary().is_empty());

        let r = StockDiff::between(&deleted, &stored);
        assert_eq!(r.delete_transition(), Some(DeleteTransition::Restored));
    }
}
