use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use stockledger_core::{Actor, DomainError, DomainResult, Entity, StockId};

use crate::price::UnitPrice;

/// Maximum stored length of a stock item name.
pub const MAX_NAME_LEN: usize = 30;

/// One inventory item.
///
/// Records are never physically removed by the application: `is_deleted` is a
/// reversible soft-delete flag. Every mutator re-checks the field it touches,
/// and [`StockItem::validate`] re-checks the whole record before a write.
/// Serialize-only: a record is rebuilt through [`StockItem::create`] or a
/// store decoder, never from arbitrary input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockItem {
    id: StockId,
    name: String,
    quantity: i64,
    unit_price: UnitPrice,
    is_deleted: bool,
    last_modified: DateTime<Utc>,
    modified_by: Option<Actor>,
}

impl StockItem {
    /// Build a brand-new record, validating every invariant.
    pub fn create(
        name: &str,
        quantity: i64,
        unit_price: UnitPrice,
        actor: Actor,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = validate_name(name)?;
        validate_quantity(quantity)?;
        Ok(Self {
            id: StockId::new(),
            name,
            quantity,
            unit_price,
            is_deleted: false,
            last_modified: at,
            modified_by: Some(actor),
        })
    }

    /// Rebuild a record from storage. Stored rows already passed validation.
    pub fn from_stored(
        id: StockId,
        name: String,
        quantity: i64,
        unit_price: UnitPrice,
        is_deleted: bool,
        last_modified: DateTime<Utc>,
        modified_by: Option<Actor>,
    ) -> Self {
        Self {
            id,
            name,
            quantity,
            unit_price,
            is_deleted,
            last_modified,
            modified_by,
        }
    }

    pub fn id_typed(&self) -> StockId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> UnitPrice {
        self.unit_price
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn modified_by(&self) -> Option<&Actor> {
        self.modified_by.as_ref()
    }

    /// Stock value of this holding (`quantity × unit_price`).
    pub fn value(&self) -> Decimal {
        self.unit_price.value_of(self.quantity)
    }

    pub fn rename(&mut self, name: &str) -> DomainResult<()> {
        self.name = validate_name(name)?;
        Ok(())
    }

    pub fn set_quantity(&mut self, quantity: i64) -> DomainResult<()> {
        validate_quantity(quantity)?;
        self.quantity = quantity;
        Ok(())
    }

    pub fn set_unit_price(&mut self, unit_price: UnitPrice) {
        self.unit_price = unit_price;
    }

    pub fn mark_deleted(&mut self) {
        self.is_deleted = true;
    }

    pub fn mark_restored(&mut self) {
        self.is_deleted = false;
    }

    /// Stamp last-modified metadata for a pending write.
    pub fn touch(&mut self, actor: &Actor, at: DateTime<Utc>) {
        self.last_modified = at;
        self.modified_by = Some(actor.clone());
    }

    /// Full-record check run before every write.
    pub fn validate(&self) -> DomainResult<()> {
        validate_name(&self.name)?;
        validate_quantity(self.quantity)?;
        if self.unit_price.amount() <= Decimal::ZERO {
            return Err(DomainError::validation("Unit price must be greater than zero."));
        }
        Ok(())
    }
}

impl Entity for StockItem {
    type Id = StockId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

pub fn validate_quantity(quantity: i64) -> DomainResult<()> {
    if quantity < 0 {
        return Err(DomainError::validation("Quantity cannot be negative."));
    }
    Ok(())
}

/// Trim and check a name; returns the stored form.
pub fn validate_name(name: &str) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("Name cannot be empty."));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "Name cannot exceed {MAX_NAME_LEN} characters."
        )));
    }
    Ok(trimmed.to_string())
}
