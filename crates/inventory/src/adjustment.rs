//! Manual, reason-coded quantity corrections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Actor, AdjustmentId, DomainError, DomainResult, StockId};

use crate::history::{ChangeKind, HistoryEntry};
use crate::stock::StockItem;

/// Why a quantity was corrected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    Correction,
    Damage,
    Loss,
    Found,
    Other,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Correction => "correction",
            AdjustmentKind::Damage => "damage",
            AdjustmentKind::Loss => "loss",
            AdjustmentKind::Found => "found",
            AdjustmentKind::Other => "other",
        }
    }

    /// Human-readable label used in audit reasons.
    pub fn label(&self) -> &'static str {
        match self {
            AdjustmentKind::Correction => "Correction",
            AdjustmentKind::Damage => "Damage",
            AdjustmentKind::Loss => "Loss",
            AdjustmentKind::Found => "Found",
            AdjustmentKind::Other => "Other",
        }
    }
}

impl core::str::FromStr for AdjustmentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "correction" => Ok(AdjustmentKind::Correction),
            "damage" => Ok(AdjustmentKind::Damage),
            "loss" => Ok(AdjustmentKind::Loss),
            "found" => Ok(AdjustmentKind::Found),
            "other" => Ok(AdjustmentKind::Other),
            _ => Err(DomainError::validation(
                "kind must be one of: correction, damage, loss, found, other",
            )),
        }
    }
}

/// Dedicated record of one adjustment. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    pub id: AdjustmentId,
    pub stock_id: StockId,
    pub previous_quantity: i64,
    pub adjusted_quantity: i64,
    pub kind: AdjustmentKind,
    pub reason: String,
    pub adjusted_by: Actor,
    pub adjusted_at: DateTime<Utc>,
}

impl AdjustmentRecord {
    /// Record an adjustment of `item` to the absolute `adjusted_quantity`.
    ///
    /// `previous_quantity` is taken from `item` as it is before the change.
    pub fn new(
        item: &StockItem,
        adjusted_quantity: i64,
        kind: AdjustmentKind,
        reason: &str,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if adjusted_quantity < 0 {
            return Err(DomainError::validation("Adjusted quantity cannot be negative."));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("Adjustment reason is required."));
        }
        Ok(Self {
            id: AdjustmentId::new(),
            stock_id: item.id_typed(),
            previous_quantity: item.quantity(),
            adjusted_quantity,
            kind,
            reason: reason.to_string(),
            adjusted_by: actor.clone(),
            adjusted_at: at,
        })
    }

    /// Signed change in quantity (`adjusted - previous`).
    pub fn delta(&self) -> i64 {
        self.adjusted_quantity - self.previous_quantity
    }

    /// Reason stamped on the generic update entry of the same unit of work.
    pub fn update_reason(&self) -> String {
        format!("Stock adjustment: {}", self.kind.label())
    }

    /// The typed `adjustment` history entry paired with this record.
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry::movement(
            self.stock_id,
            ChangeKind::Adjustment,
            self.previous_quantity,
            self.adjusted_quantity,
            &self.adjusted_by,
            format!("{}: {}", self.kind.label(), self.reason),
            self.adjusted_at,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::UnitPrice;
    use rust_decimal_macros::dec;

    fn widget() -> StockItem {
        StockItem::create(
            "Widget",
            50,
            UnitPrice::new(dec!(2.50)).unwrap(),
            Actor::new("alice").unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn records_previous_and_adjusted_quantities() {
        let bob = Actor::new("bob").unwrap();
        let adj = AdjustmentRecord::new(
            &widget(),
            45,
            AdjustmentKind::Damage,
            "Water damage",
            &bob,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(adj.previous_quantity, 50);
        assert_eq!(adj.adjusted_quantity, 45);
        assert_eq!(adj.delta(), -5);
        assert_eq!(adj.update_reason(), "Stock adjustment: Damage");

        let entry = adj.history_entry();
        assert_eq!(entry.kind, ChangeKind::Adjustment);
        assert_eq!(entry.previous_quantity, Some(50));
        assert_eq!(entry.new_quantity, Some(45));
        assert_eq!(entry.reason, "Damage: Water damage");
        assert_eq!(entry.changed_by, bob);
        assert_eq!(entry.changed_at, adj.adjusted_at);
    }

    #[test]
    fn rejects_negative_target() {
        let err = AdjustmentRecord::new(
            &widget(),
            -1,
            AdjustmentKind::Loss,
            "gone",
            &Actor::system(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn reason_is_mandatory() {
        let system = Actor::system();
        let result =
            AdjustmentRecord::new(&widget(), 10, AdjustmentKind::Found, "  ", &system, Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn kind_parses_and_rejects_unknown() {
        assert_eq!("FOUND".parse::<AdjustmentKind>().unwrap(), AdjustmentKind::Found);
        assert!("theft".parse::<AdjustmentKind>().is_err());
    }
}
