use serde::{Deserialize, Serialize};

use crate::stock::StockItem;

/// Outcome of an availability query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub message: String,
}

impl Availability {
    fn yes() -> Self {
        Self {
            available: true,
            message: "Stock available".to_string(),
        }
    }

    fn no(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: message.into(),
        }
    }
}

/// Can `requested` units be served from `item`? Never mutates.
pub fn check_availability(item: &StockItem, requested: i64) -> Availability {
    if item.is_deleted() {
        return Availability::no("Stock item is deleted");
    }
    if requested > item.quantity() {
        return Availability::no(format!(
            "Insufficient stock. Available: {}, Requested: {}",
            item.quantity(),
            requested
        ));
    }
    Availability::yes()
}
