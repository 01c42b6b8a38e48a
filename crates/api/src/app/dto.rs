use rust_decimal::Decimal;
use serde::Deserialize;

use stockledger_inventory::StockItem;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateStockRequest {
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

/// Name/price edit. Quantity is deliberately absent.
#[derive(Debug, Deserialize)]
pub struct EditStockRequest {
    pub name: Option<String>,
    pub unit_price: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub new_quantity: i64,
    pub kind: String,
    pub reason: String,
}

/// Body for reserve/release/purchase/sale.
#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub stock_id: String,
    pub quantity: i64,
}

// -------------------------
// Response mapping
// -------------------------

pub fn stock_to_json(item: &StockItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id_typed().to_string(),
        "name": item.name(),
        "quantity": item.quantity(),
        "unit_price": item.unit_price().amount(),
        "value": item.value(),
        "is_deleted": item.is_deleted(),
        "last_modified": item.last_modified(),
        "modified_by": item.modified_by().map(|a| a.as_str()),
    })
}

pub fn search_hit_to_json(item: &StockItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id_typed().to_string(),
        "name": item.name(),
        "quantity": item.quantity(),
        "unit_price": item.unit_price().amount(),
    })
}

pub fn price_to_json(item: &StockItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id_typed().to_string(),
        "unit_price": item.unit_price().amount(),
        "quantity": item.quantity(),
    })
}
