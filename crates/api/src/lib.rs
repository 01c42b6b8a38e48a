//! Stock ledger HTTP API: router, actor context, and JSON mapping.

pub mod app;
pub mod context;
pub mod middleware;
