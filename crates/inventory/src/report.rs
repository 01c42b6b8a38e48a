//! Stock valuation report over live records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, StockId};

use crate::stock::StockItem;

/// Number of rows in the "high value" ranking.
pub const HIGH_VALUE_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationSummary {
    pub total_items: usize,
    /// Wider than a single record's quantity; many records may each hold up to `i64::MAX`.
    pub total_quantity: i128,
    pub total_value: Decimal,
    pub avg_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLine {
    pub stock_id: StockId,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub value: Decimal,
}

impl From<&StockItem> for ReportLine {
    fn from(item: &StockItem) -> Self {
        Self {
            stock_id: item.id_typed(),
            name: item.name().to_string(),
            quantity: item.quantity(),
            unit_price: item.unit_price().amount(),
            value: item.value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReport {
    pub summary: ValuationSummary,
    pub low_stock_threshold: i64,
    /// Ascending by quantity.
    pub low_stock: Vec<ReportLine>,
    pub out_of_stock: Vec<ReportLine>,
    /// Descending by value, at most [`HIGH_VALUE_LIMIT`] rows.
    pub high_value: Vec<ReportLine>,
}

impl StockReport {
    /// Build the report; deleted records in `items` are ignored.
    ///
    /// Fails when the combined value of the live records exceeds what a
    /// [`Decimal`] can hold.
    pub fn build<'a>(
        items: impl IntoIterator<Item = &'a StockItem>,
        low_stock_threshold: i64,
    ) -> DomainResult<Self> {
        let live: Vec<&StockItem> = items.into_iter().filter(|i| !i.is_deleted()).collect();

        let prices: Vec<Decimal> = live.iter().map(|i| i.unit_price().amount()).collect();
        let avg_price = if prices.is_empty() {
            None
        } else {
            Some((prices.iter().sum::<Decimal>() / Decimal::from(prices.len())).round_dp(2))
        };

        let total_quantity = live
            .iter()
            .try_fold(0i128, |acc, i| acc.checked_add(i128::from(i.quantity())))
            .ok_or_else(too_large)?;
        let total_value = live
            .iter()
            .try_fold(Decimal::ZERO, |acc, i| acc.checked_add(i.value()))
            .ok_or_else(too_large)?;

        let summary = ValuationSummary {
            total_items: live.len(),
            total_quantity,
            total_value,
            avg_price,
            max_price: prices.iter().copied().max(),
            min_price: prices.iter().copied().min(),
        };

        let mut low_stock: Vec<&StockItem> = live
            .iter()
            .copied()
            .filter(|i| i.quantity() <= low_stock_threshold)
            .collect();
        low_stock.sort_by(|a, b| {
            a.quantity()
                .cmp(&b.quantity())
                .then_with(|| a.name().cmp(b.name()))
        });

        let out_of_stock = live.iter().copied().filter(|i| i.quantity() == 0);

        let mut high_value = live.clone();
        high_value.sort_by(|a, b| b.value().cmp(&a.value()).then_with(|| a.name().cmp(b.name())));
        high_value.truncate(HIGH_VALUE_LIMIT);

        Ok(Self {
            summary,
            low_stock_threshold,
            low_stock: low_stock.into_iter().map(ReportLine::from).collect(),
            out_of_stock: out_of_stock.map(ReportLine::from).collect(),
            high_value: high_value.into_iter().map(ReportLine::from).collect(),
        })
    }
}

fn too_large() -> DomainError {
    DomainError::invariant("Stock totals are too large to report.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::UnitPrice;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockledger_core::Actor;

    fn item(name: &str, quantity: i64, price: Decimal) -> StockItem {
        let price = UnitPrice::new(price).unwrap();
        StockItem::create(name, quantity, price, Actor::system(), Utc::now()).unwrap()
    }

    #[test]
    fn empty_inventory_has_no_price_stats() {
        let report = StockReport::build(&Vec::<StockItem>::new(), 10).unwrap();
        assert_eq!(report.summary.total_items, 0);
        assert_eq!(report.summary.total_value, Decimal::ZERO);
        assert_eq!(report.summary.avg_price, None);
        assert!(report.high_value.is_empty());
    }

    #[test]
    fn summary_and_rankings() {
        let mut gone = item("Gone", 100, dec!(99));
        gone.mark_deleted();
        let items = vec![
            item("Widget", 50, dec!(2.50)),
            item("Bolt", 0, dec!(0.10)),
            item("Gear", 4, dec!(10.00)),
            gone,
        ];

        let report = StockReport::build(&items, 10).unwrap();
        assert_eq!(report.summary.total_items, 3);
        assert_eq!(report.summary.total_quantity, 54);
        assert_eq!(report.summary.total_value, dec!(165.00));
        assert_eq!(report.summary.max_price, Some(dec!(10.00)));
        assert_eq!(report.summary.min_price, Some(dec!(0.10)));
        assert_eq!(report.summary.avg_price, Some(dec!(4.20)));

        let low: Vec<_> = report.low_stock.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(low, vec!["Bolt", "Gear"]);
        assert_eq!(report.out_of_stock.len(), 1);
        assert_eq!(report.high_value[0].name, "Widget");
        assert_eq!(report.high_value[0].value, dec!(125.00));
    }

    #[test]
    fn quantities_beyond_i64_are_totalled() {
        let items = vec![item("Big A", i64::MAX, dec!(1)), item("Big B", 1, dec!(1))];

        let report = StockReport::build(&items, 10).unwrap();
        assert_eq!(report.summary.total_quantity, i128::from(i64::MAX) + 1);
        assert_eq!(report.summary.total_value, Decimal::from(i64::MAX) + Decimal::ONE);
    }

    #[test]
    fn value_overflow_is_an_error() {
        let max_price = dec!(99999999.99);
        let items: Vec<StockItem> = (0..200)
            .map(|n| item(&format!("Item {n}"), i64::MAX, max_price))
            .collect();

        let err = StockReport::build(&items, 10).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }
}
