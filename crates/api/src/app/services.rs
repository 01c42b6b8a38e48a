//! Infrastructure wiring: pick a store backend and build the stock service.

use std::sync::Arc;

use anyhow::Context;

use stockledger_infra::{
    HistoryLogger, InMemoryStockStore, PostgresStockStore, Settings, StockService, StockStore,
};

/// Which store backs the running service.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::InMemory => "in_memory",
            StoreBackend::Postgres => "postgres",
        }
    }
}

pub type DynStockService = StockService<Arc<dyn StockStore>>;

/// Shared per-process services, handed to handlers as an `Extension`.
pub struct AppServices {
    pub stock: DynStockService,
    pub backend: StoreBackend,
}

impl AppServices {
    /// In-memory services (dev/test).
    pub fn in_memory(settings: &Settings) -> Self {
        Self::with_store(Arc::new(InMemoryStockStore::new()), StoreBackend::InMemory, settings)
    }

    pub fn with_store(
        store: Arc<dyn StockStore>,
        backend: StoreBackend,
        settings: &Settings,
    ) -> Self {
        let logger = HistoryLogger::default();
        Self {
            stock: StockService::with_settings(store, settings.service.clone(), logger),
            backend,
        }
    }
}

/// Build services from settings: Postgres when `USE_PERSISTENT_STORES` is
/// set, in-memory otherwise.
pub async fn build_services(settings: &Settings) -> anyhow::Result<AppServices> {
    if !settings.use_persistent_stores {
        return Ok(AppServices::in_memory(settings));
    }

    let Some(database_url) = settings.database_url.as_deref() else {
        tracing::warn!(
            "USE_PERSISTENT_STORES=true but DATABASE_URL not set, falling back to in-memory"
        );
        return Ok(AppServices::in_memory(settings));
    };

    let store = PostgresStockStore::connect(database_url, settings.database_max_connections)
        .await
        .context("failed to connect to Postgres")?;
    store
        .ensure_schema()
        .await
        .context("failed to create stock schema")?;

    tracing::info!("using Postgres stock store");
    Ok(AppServices::with_store(Arc::new(store), StoreBackend::Postgres, settings))
}
