use axum::{routing::get, Router};

pub mod stock;
pub mod system;

/// Router for all actor-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/stock", stock::router())
}
