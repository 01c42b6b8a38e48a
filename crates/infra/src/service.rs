//! Stock application service.
//!
//! Every mutating operation follows the same shape:
//!
//! 1. load the stored record and build the pending state (domain validation
//!    happens here, before anything is written);
//! 2. snapshot the stored row and diff it against the pending state
//!    ([`change_tracker::track`]);
//! 3. stage the history entries and any adjustment record into one
//!    [`UnitOfWork`];
//! 4. commit, then forward dropped history entries to the audit sink.
//!
//! There is no locking between the snapshot and the commit. Two concurrent
//! writers on the same record can lose an update; this is a known gap.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument};

use stockledger_core::{Actor, DomainError, StockId};
use stockledger_inventory::{
    AdjustmentKind, AdjustmentRecord, Availability, ChangeKind, HistoryEntry, SEARCH_LIMIT,
    StockFilter, StockItem, StockReport, UnitPrice, check_availability, search_term,
};

use crate::change_tracker;
use crate::config::ServiceSettings;
use crate::history_logger::HistoryLogger;
use crate::store::{StockStore, StoreError, UnitOfWork};

/// Message used when a name is already taken (soft-deleted records included).
pub const DUPLICATE_NAME: &str = "Stock with this Name already exists.";

pub const BULK_DELETE_REASON: &str = "Bulk delete";

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input failed validation; nothing was persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The change would break a stock invariant (e.g. reserving more than is available).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Unknown record, or one hidden by soft-delete for this operation.
    #[error("not found")]
    NotFound,

    /// Record is in the wrong state (e.g. deleting an already deleted record).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persisting failed; the whole unit of work was rolled back.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::InvariantViolation(msg),
            DomainError::InvalidId(msg) => ServiceError::InvalidId(msg),
            DomainError::NotFound => ServiceError::NotFound,
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UniqueViolation(_) => ServiceError::Validation(DUPLICATE_NAME.to_string()),
            StoreError::NotFound(_) => ServiceError::NotFound,
            other => ServiceError::Store(other),
        }
    }
}

/// Field changes for [`StockService::update`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockChanges {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub unit_price: Option<Decimal>,
}

/// How the generic (diff-derived) history entry of a save is written.
#[derive(Debug, Clone, Copy, Default)]
struct GenericEntry<'a> {
    kind: Option<ChangeKind>,
    reason: Option<&'a str>,
}

/// Application operations over stock records.
#[derive(Debug, Clone)]
pub struct StockService<S> {
    store: S,
    logger: HistoryLogger,
    settings: ServiceSettings,
}

impl<S> StockService<S>
where
    S: StockStore,
{
    pub fn new(store: S) -> Self {
        Self::with_settings(store, ServiceSettings::default(), HistoryLogger::default())
    }

    pub fn with_settings(store: S, settings: ServiceSettings, logger: HistoryLogger) -> Self {
        Self {
            store,
            logger,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Create a record and its "Stock item created" history entry.
    #[instrument(skip(self, actor), fields(actor = %actor), err)]
    pub async fn create(
        &self,
        name: &str,
        quantity: i64,
        unit_price: Decimal,
        actor: &Actor,
    ) -> Result<StockItem, ServiceError> {
        let at = Utc::now();
        let price = UnitPrice::new(unit_price)?;
        let item = StockItem::create(name, quantity, price, actor.clone(), at)?;
        self.ensure_name_free(item.name(), None).await?;

        let mut work = UnitOfWork::new(item.clone());
        self.logger
            .stage(&mut work, HistoryEntry::created(&item, actor, at));
        let report = self.store.commit(work).await?;
        self.logger.report(&report);

        info!(stock_id = %item.id_typed(), name = item.name(), quantity, "stock item created");
        Ok(item)
    }

    /// Apply field changes and write one generic history entry.
    ///
    /// A caller `reason` replaces the computed change summary. An update that
    /// changes nothing still writes an `edit` entry ("Stock updated").
    #[instrument(skip(self, changes, actor, reason), fields(stock_id = %id, actor = %actor), err)]
    pub async fn update(
        &self,
        id: StockId,
        changes: StockChanges,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<StockItem, ServiceError> {
        let stored = self.load(id).await?;
        let mut pending = stored.clone();

        if let Some(name) = changes.name.as_deref() {
            pending.rename(name)?;
            if pending.name() != stored.name() {
                self.ensure_name_free(pending.name(), Some(id)).await?;
            }
        }
        if let Some(quantity) = changes.quantity {
            pending.set_quantity(quantity)?;
        }
        if let Some(price) = changes.unit_price {
            pending.set_unit_price(UnitPrice::new(price)?);
        }

        let at = Utc::now();
        pending.touch(actor, at);
        let saved = self
            .save(pending, actor, at, Some(GenericEntry { kind: None, reason }), None, None)
            .await?;
        info!(stock_id = %id, "stock item updated");
        Ok(saved)
    }

    /// Edit name and/or price only. Quantity changes go through the
    /// movement operations or [`StockService::adjust`].
    pub async fn edit_details(
        &self,
        id: StockId,
        name: Option<String>,
        unit_price: Option<Decimal>,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<StockItem, ServiceError> {
        let changes = StockChanges {
            name,
            quantity: None,
            unit_price,
        };
        self.update(id, changes, actor, reason).await
    }

    /// Soft-delete a live record (history kind `delete`).
    #[instrument(skip(self, actor, reason), fields(stock_id = %id, actor = %actor), err)]
    pub async fn soft_delete(
        &self,
        id: StockId,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<StockItem, ServiceError> {
        let mut pending = self.load(id).await?;
        if pending.is_deleted() {
            return Err(DomainError::conflict("stock item is already deleted").into());
        }
        pending.mark_deleted();
        let at = Utc::now();
        pending.touch(actor, at);
        let saved = self
            .save(pending, actor, at, Some(GenericEntry { kind: None, reason }), None, None)
            .await?;
        info!(stock_id = %id, "stock item deleted");
        Ok(saved)
    }

    /// Restore a soft-deleted record (history kind `restore`).
    #[instrument(skip(self, actor), fields(stock_id = %id, actor = %actor), err)]
    pub async fn restore(&self, id: StockId, actor: &Actor) -> Result<StockItem, ServiceError> {
        let mut pending = self.load(id).await?;
        if !pending.is_deleted() {
            return Err(DomainError::conflict("stock item is not deleted").into());
        }
        pending.mark_restored();
        let at = Utc::now();
        pending.touch(actor, at);
        let saved = self
            .save(pending, actor, at, Some(GenericEntry::default()), None, None)
            .await?;
        info!(stock_id = %id, "stock item restored");
        Ok(saved)
    }

    /// Pure availability query; never writes.
    #[instrument(skip(self), fields(stock_id = %id), err)]
    pub async fn check_availability(
        &self,
        id: StockId,
        requested: i64,
    ) -> Result<Availability, ServiceError> {
        non_negative(requested, "Requested quantity")?;
        let item = self.load(id).await?;
        Ok(check_availability(&item, requested))
    }

    /// Take `quantity` units out of stock, if available.
    #[instrument(skip(self, actor), fields(stock_id = %id, actor = %actor), err)]
    pub async fn reserve(
        &self,
        id: StockId,
        quantity: i64,
        actor: &Actor,
    ) -> Result<StockItem, ServiceError> {
        non_negative(quantity, "Reserved quantity")?;
        let stored = self.load(id).await?;
        let availability = check_availability(&stored, quantity);
        if !availability.available {
            return Err(DomainError::invariant(format!(
                "Cannot reserve stock: {}",
                availability.message
            ))
            .into());
        }

        let mut pending = stored.clone();
        pending.set_quantity(stored.quantity() - quantity)?;
        let at = Utc::now();
        pending.touch(actor, at);
        self.save(pending, actor, at, Some(GenericEntry::default()), None, None)
            .await
    }

    /// Put `quantity` units back into stock.
    #[instrument(skip(self, actor), fields(stock_id = %id, actor = %actor), err)]
    pub async fn release(
        &self,
        id: StockId,
        quantity: i64,
        actor: &Actor,
    ) -> Result<StockItem, ServiceError> {
        non_negative(quantity, "Released quantity")?;
        let stored = self.load(id).await?;
        let mut pending = stored.clone();
        pending.set_quantity(checked_add(stored.quantity(), quantity)?)?;
        let at = Utc::now();
        pending.touch(actor, at);
        self.save(pending, actor, at, Some(GenericEntry::default()), None, None)
            .await
    }

    /// Receive `quantity` units; writes a single `purchase` entry.
    #[instrument(skip(self, actor, reason), fields(stock_id = %id, actor = %actor), err)]
    pub async fn record_purchase(
        &self,
        id: StockId,
        quantity: i64,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<StockItem, ServiceError> {
        positive(quantity, "Purchased quantity")?;
        let stored = self.load_live(id).await?;
        let new_quantity = checked_add(stored.quantity(), quantity)?;
        let reason = movement_reason(reason, || format!("Purchased {quantity} unit(s)"));
        self.movement(stored, new_quantity, ChangeKind::Purchase, reason, actor)
            .await
    }

    /// Ship `quantity` units, if available; writes a single `sale` entry.
    #[instrument(skip(self, actor, reason), fields(stock_id = %id, actor = %actor), err)]
    pub async fn record_sale(
        &self,
        id: StockId,
        quantity: i64,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<StockItem, ServiceError> {
        positive(quantity, "Sold quantity")?;
        let stored = self.load_live(id).await?;
        let availability = check_availability(&stored, quantity);
        if !availability.available {
            return Err(DomainError::invariant(format!(
                "Cannot sell stock: {}",
                availability.message
            ))
            .into());
        }
        let new_quantity = stored.quantity() - quantity;
        let reason = movement_reason(reason, || format!("Sold {quantity} unit(s)"));
        self.movement(stored, new_quantity, ChangeKind::Sale, reason, actor)
            .await
    }

    /// Set the quantity of a live record to `new_quantity` for a stated reason.
    ///
    /// One unit of work carries the adjustment record, the generic `edit`
    /// entry (unless suppressed in settings) and the typed `adjustment` entry.
    #[instrument(
        skip(self, reason, actor),
        fields(stock_id = %id, actor = %actor, kind = kind.as_str()),
        err
    )]
    pub async fn adjust(
        &self,
        id: StockId,
        new_quantity: i64,
        kind: AdjustmentKind,
        reason: &str,
        actor: &Actor,
    ) -> Result<(StockItem, AdjustmentRecord), ServiceError> {
        let stored = self.load_live(id).await?;
        let at = Utc::now();
        let adjustment = AdjustmentRecord::new(&stored, new_quantity, kind, reason, actor, at)?;

        let mut pending = stored;
        pending.set_quantity(new_quantity)?;
        pending.touch(actor, at);

        let update_reason = adjustment.update_reason();
        let generic = if self.settings.suppress_generic_adjustment_entry {
            None
        } else {
            Some(GenericEntry {
                kind: None,
                reason: Some(update_reason.as_str()),
            })
        };
        let typed = adjustment.history_entry();
        let saved = self
            .save(pending, actor, at, generic, Some(adjustment.clone()), Some(typed))
            .await?;

        info!(
            stock_id = %id,
            previous = adjustment.previous_quantity,
            adjusted = adjustment.adjusted_quantity,
            "stock adjusted"
        );
        Ok((saved, adjustment))
    }

    /// Load a record, deleted or not.
    pub async fn get(&self, id: StockId) -> Result<StockItem, ServiceError> {
        self.load(id).await
    }

    /// Price lookup: live records only.
    pub async fn price(&self, id: StockId) -> Result<StockItem, ServiceError> {
        self.load_live(id).await
    }

    /// History of one record, most recent first.
    ///
    /// `limit` defaults to, and is capped at, the configured history limit.
    #[instrument(skip(self), fields(stock_id = %id), err)]
    pub async fn history(
        &self,
        id: StockId,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>, ServiceError> {
        self.load(id).await?;
        let limit = self.page_size(limit);
        Ok(self.store.history(id, limit).await?)
    }

    /// Adjustment records of one record, most recent first.
    #[instrument(skip(self), fields(stock_id = %id), err)]
    pub async fn adjustments(
        &self,
        id: StockId,
        limit: Option<usize>,
    ) -> Result<Vec<AdjustmentRecord>, ServiceError> {
        self.load(id).await?;
        let limit = self.page_size(limit);
        Ok(self.store.adjustments(id, limit).await?)
    }

    pub async fn list(&self, filter: &StockFilter) -> Result<Vec<StockItem>, ServiceError> {
        Ok(self
            .store
            .list(filter, self.settings.low_stock_threshold)
            .await?)
    }

    /// Autocomplete over live names; too-short queries return nothing.
    pub async fn search(&self, query: &str) -> Result<Vec<StockItem>, ServiceError> {
        match search_term(query) {
            Some(term) => Ok(self.store.search(term, SEARCH_LIMIT).await?),
            None => Ok(Vec::new()),
        }
    }

    /// Soft-delete every listed live record. Unknown or already deleted ids
    /// are skipped. Returns how many records were deleted.
    #[instrument(skip(self, ids, actor), fields(requested = ids.len(), actor = %actor), err)]
    pub async fn bulk_delete(&self, ids: &[StockId], actor: &Actor) -> Result<usize, ServiceError> {
        let mut deleted = 0;
        for id in ids {
            match self.store.get(*id).await? {
                Some(item) if !item.is_deleted() => {
                    self.soft_delete(*id, actor, Some(BULK_DELETE_REASON)).await?;
                    deleted += 1;
                }
                _ => {}
            }
        }
        info!(deleted, "bulk delete finished");
        Ok(deleted)
    }

    /// Valuation report over live records.
    pub async fn report(&self) -> Result<StockReport, ServiceError> {
        let threshold = self.settings.low_stock_threshold;
        let live = self.store.list(&StockFilter::default(), threshold).await?;
        Ok(StockReport::build(&live, threshold)?)
    }

    async fn load(&self, id: StockId) -> Result<StockItem, ServiceError> {
        self.store.get(id).await?.ok_or(ServiceError::NotFound)
    }

    async fn load_live(&self, id: StockId) -> Result<StockItem, ServiceError> {
        match self.load(id).await? {
            item if item.is_deleted() => Err(ServiceError::NotFound),
            item => Ok(item),
        }
    }

    async fn ensure_name_free(
        &self,
        name: &str,
        except: Option<StockId>,
    ) -> Result<(), ServiceError> {
        match self.store.find_by_name(name).await? {
            Some(existing) if Some(existing.id_typed()) != except => {
                Err(DomainError::validation(DUPLICATE_NAME).into())
            }
            _ => Ok(()),
        }
    }

    fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.settings.history_limit)
            .min(self.settings.history_limit)
    }

    /// Typed quantity movement: one explicit entry, no generic entry.
    async fn movement(
        &self,
        stored: StockItem,
        new_quantity: i64,
        kind: ChangeKind,
        reason: String,
        actor: &Actor,
    ) -> Result<StockItem, ServiceError> {
        let at = Utc::now();
        let entry = HistoryEntry::movement(
            stored.id_typed(),
            kind,
            stored.quantity(),
            new_quantity,
            actor,
            reason,
            at,
        );
        let mut pending = stored;
        pending.set_quantity(new_quantity)?;
        pending.touch(actor, at);
        let saved = self.save(pending, actor, at, None, None, Some(entry)).await?;
        info!(
            stock_id = %saved.id_typed(),
            change_type = %kind,
            quantity = new_quantity,
            "stock movement recorded"
        );
        Ok(saved)
    }

    async fn save(
        &self,
        pending: StockItem,
        actor: &Actor,
        at: DateTime<Utc>,
        generic: Option<GenericEntry<'_>>,
        adjustment: Option<AdjustmentRecord>,
        typed: Option<HistoryEntry>,
    ) -> Result<StockItem, ServiceError> {
        pending.validate()?;
        let mut work = UnitOfWork::new(pending.clone());

        if let Some(generic) = generic {
            if let Some(diff) = change_tracker::track(&self.store, &pending).await {
                let entry = HistoryEntry::from_diff(&diff, generic.kind, actor, generic.reason, at);
                self.logger.stage(&mut work, entry);
            }
        }
        if let Some(adjustment) = adjustment {
            work = work.with_adjustment(adjustment);
        }
        if let Some(entry) = typed {
            self.logger.stage(&mut work, entry);
        }

        let report = self.store.commit(work).await?;
        self.logger.report(&report);
        Ok(pending)
    }
}

fn non_negative(quantity: i64, what: &str) -> Result<(), ServiceError> {
    if quantity < 0 {
        return Err(DomainError::validation(format!("{what} cannot be negative.")).into());
    }
    Ok(())
}

fn positive(quantity: i64, what: &str) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!("{what} must be positive.")).into());
    }
    Ok(())
}

fn checked_add(current: i64, quantity: i64) -> Result<i64, ServiceError> {
    current
        .checked_add(quantity)
        .ok_or_else(|| DomainError::validation("Quantity is too large.").into())
}

fn movement_reason(supplied: Option<&str>, default: impl FnOnce() -> String) -> String {
    supplied
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .unwrap_or_else(default)
}
