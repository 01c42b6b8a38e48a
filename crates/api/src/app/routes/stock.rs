use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};

use stockledger_core::StockId;
use stockledger_inventory::StockFilter;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_stock).get(list_stock))
        .route("/search", get(search_stock))
        .route("/report", get(stock_report))
        .route("/availability", get(check_availability))
        .route("/bulk-delete", post(bulk_delete))
        .route("/:id", get(get_stock).patch(edit_stock))
        .route("/:id/delete", post(delete_stock))
        .route("/:id/restore", post(restore_stock))
        .route("/:id/adjust", post(adjust_stock))
        .route("/:id/adjustments", get(list_adjustments))
        .route("/:id/reserve", post(reserve_stock))
        .route("/:id/release", post(release_stock))
        .route("/:id/purchase", post(record_purchase))
        .route("/:id/sale", post(record_sale))
        .route("/:id/history", get(stock_history))
        .route("/:id/price", get(stock_price))
}

pub async fn create_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateStockRequest>,
) -> axum::response::Response {
    match services
        .stock
        .create(&body.name, body.quantity, body.unit_price, actor.actor())
        .await
    {
        Ok(item) => (StatusCode::CREATED, Json(dto::stock_to_json(&item))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Query(filter): Query<StockFilter>,
) -> axum::response::Response {
    match services.stock.list(&filter).await {
        Ok(items) => {
            let items: Vec<serde_json::Value> = items.iter().map(dto::stock_to_json).collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "count": items.len(), "items": items })),
            )
                .into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn search_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::SearchQuery>,
) -> axum::response::Response {
    match services.stock.search(&query.q).await {
        Ok(items) => {
            let results: Vec<serde_json::Value> =
                items.iter().map(dto::search_hit_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "results": results }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn stock_report(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.stock.report().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn check_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::AvailabilityQuery>,
) -> axum::response::Response {
    let id = match errors::parse_stock_id(&query.stock_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.stock.check_availability(id, query.quantity).await {
        Ok(availability) => (StatusCode::OK, Json(availability)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn bulk_delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::BulkDeleteRequest>,
) -> axum::response::Response {
    let mut ids: Vec<StockId> = Vec::with_capacity(body.ids.len());
    for raw in &body.ids {
        match errors::parse_stock_id(raw) {
            Ok(id) => ids.push(id),
            Err(res) => return res,
        }
    }
    match services.stock.bulk_delete(&ids, actor.actor()).await {
        Ok(deleted) => {
            (StatusCode::OK, Json(serde_json::json!({ "deleted": deleted }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_stock_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.stock.get(id).await {
        Ok(item) => (StatusCode::OK, Json(dto::stock_to_json(&item))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn edit_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::EditStockRequest>,
) -> axum::response::Response {
    let id = match errors::parse_stock_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services
        .stock
        .edit_details(id, body.name, body.unit_price, actor.actor(), body.reason.as_deref())
        .await
    {
        Ok(item) => (StatusCode::OK, Json(dto::stock_to_json(&item))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_stock_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.stock.soft_delete(id, actor.actor(), None).await {
        Ok(item) => (StatusCode::OK, Json(dto::stock_to_json(&item))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn restore_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_stock_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.stock.restore(id, actor.actor()).await {
        Ok(item) => (StatusCode::OK, Json(dto::stock_to_json(&item))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let id = match errors::parse_stock_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let kind = match errors::parse_adjustment_kind(&body.kind) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services
        .stock
        .adjust(id, body.new_quantity, kind, &body.reason, actor.actor())
        .await
    {
        Ok((item, adjustment)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "stock": dto::stock_to_json(&item),
                "adjustment": adjustment,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_adjustments(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::LimitQuery>,
) -> axum::response::Response {
    let id = match errors::parse_stock_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.stock.adjustments(id, query.limit).await {
        Ok(adjustments) => (StatusCode::OK, Json(adjustments)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Which quantity operation a [`dto::QuantityRequest`] is for.
#[derive(Debug, Copy, Clone)]
enum Movement {
    Reserve,
    Release,
    Purchase,
    Sale,
}

async fn apply_movement(
    services: &AppServices,
    actor: &ActorContext,
    id: String,
    body: dto::QuantityRequest,
    movement: Movement,
) -> axum::response::Response {
    let id = match errors::parse_stock_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let stock = &services.stock;
    let actor = actor.actor();
    let reason = body.reason.as_deref();
    let result = match movement {
        Movement::Reserve => stock.reserve(id, body.quantity, actor).await,
        Movement::Release => stock.release(id, body.quantity, actor).await,
        Movement::Purchase => stock.record_purchase(id, body.quantity, actor, reason).await,
        Movement::Sale => stock.record_sale(id, body.quantity, actor, reason).await,
    };
    match result {
        Ok(item) => (StatusCode::OK, Json(dto::stock_to_json(&item))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn reserve_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuantityRequest>,
) -> axum::response::Response {
    apply_movement(&services, &actor, id, body, Movement::Reserve).await
}

pub async fn release_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuantityRequest>,
) -> axum::response::Response {
    apply_movement(&services, &actor, id, body, Movement::Release).await
}

pub async fn record_purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuantityRequest>,
) -> axum::response::Response {
    apply_movement(&services, &actor, id, body, Movement::Purchase).await
}

pub async fn record_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuantityRequest>,
) -> axum::response::Response {
    apply_movement(&services, &actor, id, body, Movement::Sale).await
}

pub async fn stock_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::LimitQuery>,
) -> axum::response::Response {
    let id = match errors::parse_stock_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.stock.history(id, query.limit).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn stock_price(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_stock_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.stock.price(id).await {
        Ok(item) => (StatusCode::OK, Json(dto::price_to_json(&item))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
