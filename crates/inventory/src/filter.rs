//! Listing and search predicates over stock records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::stock::StockItem;

/// Default threshold below (or at) which an item counts as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Minimum query length before search returns anything.
pub const MIN_SEARCH_LEN: usize = 2;

/// Maximum number of search hits.
pub const SEARCH_LIMIT: usize = 10;

/// Listing filter. Every set field must match; deleted records never match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockFilter {
    pub name: Option<String>,
    pub quantity_min: Option<i64>,
    pub quantity_max: Option<i64>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub modified_by: Option<String>,
    pub last_modified_after: Option<DateTime<Utc>>,
    pub last_modified_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub low_stock: bool,
    #[serde(default)]
    pub out_of_stock: bool,
}

impl StockFilter {
    pub fn matches(&self, item: &StockItem, low_stock_threshold: i64) -> bool {
        if item.is_deleted() {
            return false;
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            if !contains_ignore_case(item.name(), name.trim()) {
                return false;
            }
        }
        if self.quantity_min.is_some_and(|min| item.quantity() < min) {
            return false;
        }
        if self.quantity_max.is_some_and(|max| item.quantity() > max) {
            return false;
        }
        let price = item.unit_price().amount();
        if self.price_min.is_some_and(|min| price < min) {
            return false;
        }
        if self.price_max.is_some_and(|max| price > max) {
            return false;
        }
        if let Some(actor) = self.modified_by.as_deref().filter(|a| !a.trim().is_empty()) {
            match item.modified_by() {
                Some(m) if contains_ignore_case(m.as_str(), actor.trim()) => {}
                _ => return false,
            }
        }
        if self.last_modified_after.is_some_and(|t| item.last_modified() < t) {
            return false;
        }
        if self.last_modified_before.is_some_and(|t| item.last_modified() > t) {
            return false;
        }
        if self.low_stock && item.quantity() > low_stock_threshold {
            return false;
        }
        if self.out_of_stock && item.quantity() != 0 {
            return false;
        }
        true
    }
}

/// Autocomplete search: `None` when the query is too short to run.
pub fn search_term(query: &str) -> Option<&str> {
    let q = query.trim();
    if q.chars().count() < MIN_SEARCH_LEN {
        None
    } else {
        Some(q)
    }
}

pub fn search_matches(item: &StockItem, term: &str) -> bool {
    !item.is_deleted() && contains_ignore_case(item.name(), term)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::UnitPrice;
    use rust_decimal_macros::dec;
    use stockledger_core::Actor;

    fn item(name: &str, quantity: i64, price: Decimal, actor: &str) -> StockItem {
        StockItem::create(
            name,
            quantity,
            UnitPrice::new(price).unwrap(),
            Actor::new(actor).unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn empty_filter_matches_live_items_only() {
        let f = StockFilter::default();
        let mut it = item("Widget", 5, dec!(1), "alice");
        assert!(f.matches(&it, DEFAULT_LOW_STOCK_THRESHOLD));
        it.mark_deleted();
        assert!(!f.matches(&it, DEFAULT_LOW_STOCK_THRESHOLD));
    }

    #[test]
    fn name_and_actor_are_case_insensitive_substrings() {
        let it = item("Blue Widget", 5, dec!(1), "Alice");
        let f = StockFilter {
            name: Some("widg".into()),
            modified_by: Some("ALI".into()),
            ..Default::default()
        };
        assert!(f.matches(&it, DEFAULT_LOW_STOCK_THRESHOLD));
        let miss = StockFilter {
            name: Some("gadget".into()),
            ..Default::default()
        };
        assert!(!miss.matches(&it, DEFAULT_LOW_STOCK_THRESHOLD));
    }

    #[test]
    fn ranges_are_inclusive() {
        let it = item("Widget", 10, dec!(2.50), "alice");
        let f = StockFilter {
            quantity_min: Some(10),
            quantity_max: Some(10),
            price_min: Some(dec!(2.50)),
            price_max: Some(dec!(2.50)),
            ..Default::default()
        };
        assert!(f.matches(&it, DEFAULT_LOW_STOCK_THRESHOLD));
    }

    #[test]
    fn low_and_out_of_stock_flags() {
        let low = item("Low", 10, dec!(1), "a1");
        let plenty = item("Plenty", 11, dec!(1), "a1");
        let none = item("None", 0, dec!(1), "a1");
        let f = StockFilter {
            low_stock: true,
            ..Default::default()
        };
        assert!(f.matches(&low, 10));
        assert!(!f.matches(&plenty, 10));
        let out = StockFilter {
            out_of_stock: true,
            ..Default::default()
        };
        assert!(out.matches(&none, 10));
        assert!(!out.matches(&low, 10));
    }

    #[test]
    fn search_requires_two_characters() {
        assert_eq!(search_term(" w "), None);
        assert_eq!(search_term(" wi "), Some("wi"));
        let it = item("Widget", 1, dec!(1), "a1");
        assert!(search_matches(&it, "DG"));
    }
}
