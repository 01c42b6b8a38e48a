//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod actor;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use actor::Actor;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AdjustmentId, HistoryEntryId, StockId};
pub use value_object::ValueObject;
