//! Append-only audit trail of stock changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Actor, DomainError, DomainResult, HistoryEntryId, StockId};

use crate::diff::{DeleteTransition, StockDiff};
use crate::price::UnitPrice;
use crate::stock::StockItem;

pub const CREATED_REASON: &str = "Stock item created";
pub const FALLBACK_REASON: &str = "Stock updated";

/// What kind of change an entry records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Purchase,
    Sale,
    Adjustment,
    Edit,
    Delete,
    Restore,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Purchase => "purchase",
            ChangeKind::Sale => "sale",
            ChangeKind::Adjustment => "adjustment",
            ChangeKind::Edit => "edit",
            ChangeKind::Delete => "delete",
            ChangeKind::Restore => "restore",
        }
    }

    /// Kinds that describe a quantity movement and must carry both quantities.
    pub fn is_movement(&self) -> bool {
        matches!(self, ChangeKind::Purchase | ChangeKind::Sale | ChangeKind::Adjustment)
    }
}

impl core::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ChangeKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "purchase" => Ok(ChangeKind::Purchase),
            "sale" => Ok(ChangeKind::Sale),
            "adjustment" => Ok(ChangeKind::Adjustment),
            "edit" => Ok(ChangeKind::Edit),
            "delete" => Ok(ChangeKind::Delete),
            "restore" => Ok(ChangeKind::Restore),
            other => Err(DomainError::validation(format!("unknown change kind: {other}"))),
        }
    }
}

/// Pick the entry kind for a committed diff.
///
/// A delete-flag transition always wins; otherwise the caller's typed kind,
/// otherwise `edit`.
pub fn select_kind(diff: &StockDiff, explicit: Option<ChangeKind>) -> ChangeKind {
    match diff.delete_transition() {
        Some(DeleteTransition::Deleted) => ChangeKind::Delete,
        Some(DeleteTransition::Restored) => ChangeKind::Restore,
        None => explicit.unwrap_or(ChangeKind::Edit),
    }
}

/// Caller reason if given, else the diff summary, else [`FALLBACK_REASON`].
pub fn reason_for(diff: &StockDiff, supplied: Option<&str>) -> String {
    if let Some(reason) = supplied.map(str::trim).filter(|r| !r.is_empty()) {
        return reason.to_string();
    }
    let parts = diff.summary();
    if parts.is_empty() {
        FALLBACK_REASON.to_string()
    } else {
        parts.join("; ")
    }
}

/// One immutable audit-log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub stock_id: StockId,
    pub previous_quantity: Option<i64>,
    pub new_quantity: Option<i64>,
    pub previous_name: Option<String>,
    pub new_name: Option<String>,
    pub previous_price: Option<UnitPrice>,
    pub new_price: Option<UnitPrice>,
    pub kind: ChangeKind,
    pub changed_by: Actor,
    pub changed_at: DateTime<Utc>,
    pub reason: String,
}

impl HistoryEntry {
    /// Entry written alongside a brand-new record.
    pub fn created(item: &StockItem, actor: &Actor, at: DateTime<Utc>) -> Self {
        Self {
            id: HistoryEntryId::new(),
            stock_id: item.id_typed(),
            previous_quantity: Some(0),
            new_quantity: Some(item.quantity()),
            previous_name: None,
            new_name: None,
            previous_price: None,
            new_price: None,
            kind: ChangeKind::Edit,
            changed_by: actor.clone(),
            changed_at: at,
            reason: CREATED_REASON.to_string(),
        }
    }

    /// Generic entry for a tracked update.
    pub fn from_diff(
        diff: &StockDiff,
        explicit: Option<ChangeKind>,
        actor: &Actor,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryEntryId::new(),
            stock_id: diff.stock_id,
            previous_quantity: diff.quantity.as_ref().map(|c| c.previous),
            new_quantity: diff.quantity.as_ref().map(|c| c.new),
            previous_name: diff.name.as_ref().map(|c| c.previous.clone()),
            new_name: diff.name.as_ref().map(|c| c.new.clone()),
            previous_price: diff.unit_price.as_ref().map(|c| c.previous),
            new_price: diff.unit_price.as_ref().map(|c| c.new),
            kind: select_kind(diff, explicit),
            changed_by: actor.clone(),
            changed_at: at,
            reason: reason_for(diff, reason),
        }
    }

    /// Typed quantity movement (purchase, sale, adjustment).
    pub fn movement(
        stock_id: StockId,
        kind: ChangeKind,
        previous_quantity: i64,
        new_quantity: i64,
        actor: &Actor,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: HistoryEntryId::new(),
            stock_id,
            previous_quantity: Some(previous_quantity),
            new_quantity: Some(new_quantity),
            previous_name: None,
            new_name: None,
            previous_price: None,
            new_price: None,
            kind,
            changed_by: actor.clone(),
            changed_at: at,
            reason: reason.into(),
        }
    }

    /// Shape check run before the entry is staged for writing.
    pub fn validate(&self) -> DomainResult<()> {
        if self.kind.is_movement()
            && (self.previous_quantity.is_none() || self.new_quantity.is_none())
        {
            return Err(DomainError::invariant(format!(
                "{} entry must record previous and new quantity",
                self.kind
            )));
        }
        for q in [self.previous_quantity, self.new_quantity].into_iter().flatten() {
            if q < 0 {
                return Err(DomainError::invariant("history quantity cannot be negative"));
            }
        }
        if self.previous_name.is_some() != self.new_name.is_some()
            || self.previous_price.is_some() != self.new_price.is_some()
        {
            return Err(DomainError::invariant("history value pairs must be complete"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn widget(quantity: i64) -> StockItem {
        StockItem::create(
            "Widget",
            quantity,
            UnitPrice::new(dec!(2.50)).unwrap(),
            Actor::new("alice").unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn created_entry_starts_from_zero() {
        let item = widget(50);
        let entry = HistoryEntry::created(&item, &Actor::new("alice").unwrap(), Utc::now());
        assert_eq!(entry.kind, ChangeKind::Edit);
        assert_eq!(entry.previous_quantity, Some(0));
        assert_eq!(entry.new_quantity, Some(50));
        assert_eq!(entry.reason, "Stock item created");
        assert_eq!(entry.changed_by.as_str(), "alice");
        entry.validate().unwrap();
    }

    #[test]
    fn delete_transition_overrides_explicit_kind() {
        let stored = widget(5);
        let mut pending = stored.clone();
        pending.mark_deleted();
        let diff = StockDiff::between(&stored, &pending);
        assert_eq!(select_kind(&diff, Some(ChangeKind::Sale)), ChangeKind::Delete);
    }

    #[test]
    fn explicit_kind_used_without_delete_transition() {
        let stored = widget(5);
        let diff = StockDiff::between(&stored, &stored);
        assert_eq!(select_kind(&diff, Some(ChangeKind::Purchase)), ChangeKind::Purchase);
        assert_eq!(select_kind(&diff, None), ChangeKind::Edit);
    }

    #[test]
    fn reason_prefers_caller_then_summary_then_fallback() {
        let stored = widget(5);
        let mut pending = stored.clone();
        pending.set_quantity(7).unwrap();
        let diff = StockDiff::between(&stored, &pending);

        assert_eq!(reason_for(&diff, Some("Recount")), "Recount");
        assert_eq!(reason_for(&diff, Some("   ")), "Quantity: 5 → 7");
        assert_eq!(reason_for(&diff, None), "Quantity: 5 → 7");

        let empty = StockDiff::between(&stored, &stored);
        assert_eq!(reason_for(&empty, None), "Stock updated");
    }

    #[test]
    fn from_diff_fills_only_changed_pairs() {
        let stored = widget(5);
        let mut pending = stored.clone();
        pending.rename("Gadget").unwrap();
        let diff = StockDiff::between(&stored, &pending);
        let entry = HistoryEntry::from_diff(&diff, None, &Actor::system(), None, Utc::now());

        assert_eq!(entry.previous_name.as_deref(), Some("Widget"));
        assert_eq!(entry.new_name.as_deref(), Some("Gadget"));
        assert_eq!(entry.previous_quantity, None);
        assert_eq!(entry.previous_price, None);
        assert_eq!(entry.reason, "Name: Widget → Gadget");
        entry.validate().unwrap();
    }

    #[test]
    fn movement_without_quantities_is_rejected() {
        let item = widget(5);
        let mut entry = HistoryEntry::movement(
            item.id_typed(),
            ChangeKind::Sale,
            5,
            3,
            &Actor::system(),
            "",
            Utc::now(),
        );
        entry.validate().unwrap();
        entry.new_quantity = None;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Adjustment".parse::<ChangeKind>().unwrap(), ChangeKind::Adjustment);
        assert!("transfer".parse::<ChangeKind>().is_err());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: an entry built from a diff mirrors the pre- and post-image
            /// of every changed field and nothing else.
            #[test]
            fn entry_mirrors_diff(
                before in 0i64..10_000,
                after in 0i64..10_000,
                cents_before in 1i64..1_000_000,
                cents_after in 1i64..1_000_000,
                rename in any::<bool>(),
            ) {
                let stored = StockItem::create(
                    "Widget",
                    before,
                    UnitPrice::new(rust_decimal::Decimal::new(cents_before, 2)).unwrap(),
                    Actor::system(),
                    Utc::now(),
                ).unwrap();
                let mut pending = stored.clone();
                pending.set_quantity(after).unwrap();
                let new_price = rust_decimal::Decimal::new(cents_after, 2);
                pending.set_unit_price(UnitPrice::new(new_price).unwrap());
                if rename {
                    pending.rename("Gadget").unwrap();
                }

                let diff = StockDiff::between(&stored, &pending);
                let entry =
                    HistoryEntry::from_diff(&diff, None, &Actor::system(), None, Utc::now());
                prop_assert!(entry.validate().is_ok());
                prop_assert_eq!(entry.kind, ChangeKind::Edit);

                if before == after {
                    prop_assert_eq!(entry.previous_quantity, None);
                } else {
                    prop_assert_eq!(entry.previous_quantity, Some(before));
                    prop_assert_eq!(entry.new_quantity, Some(after));
                }
                prop_assert_eq!(entry.previous_price.is_some(), cents_before != cents_after);
                prop_assert_eq!(entry.new_name.is_some(), rename);
                if diff.is_empty() {
                    prop_assert_eq!(entry.reason.as_str(), FALLBACK_REASON);
                } else {
                    prop_assert_eq!(entry.reason.split("; ").count(), diff.summary().len());
                }
            }

            /// Property: negative quantities never survive a write path.
            #[test]
            fn negative_quantity_always_rejected(q in i64::MIN..0) {
                let mut item = StockItem::create(
                    "Widget",
                    1,
                    UnitPrice::new(rust_decimal::Decimal::ONE).unwrap(),
                    Actor::system(),
                    Utc::now(),
                ).unwrap();
                prop_assert!(item.set_quantity(q).is_err());
                prop_assert_eq!(item.quantity(), 1);
            }
        }
    }
}
