//! Infrastructure layer: storage, audit logging, configuration and the
//! application service that ties them together.

pub mod change_tracker;
pub mod config;
pub mod history_logger;
pub mod service;
pub mod store;


pub use config::{ServiceSettings, Settings};
pub use history_logger::{
    AuditFailure, AuditSink, AuditStage, HistoryLogger, RecordingAuditSink, TracingAuditSink,
};
pub use service::{ServiceError, StockChanges, StockService};
pub use store::{
    CommitReport, InMemoryStockStore, PostgresStockStore, StockStore, StoreError, UnitOfWork,
};
