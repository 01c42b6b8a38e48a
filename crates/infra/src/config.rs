//! Configuration loading and representation.
//!
//! Everything comes from environment variables. Unset variables fall back to
//! defaults; unparsable ones fall back too, with a warning.

use std::str::FromStr;

use tracing::warn;

use stockledger_inventory::DEFAULT_LOW_STOCK_THRESHOLD;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Knobs the stock service reads at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Quantity at or below which a record counts as low stock.
    pub low_stock_threshold: i64,
    /// Default page size for history and adjustment listings.
    pub history_limit: usize,
    /// When set, an adjustment writes only its typed `adjustment` entry and
    /// skips the generic `edit` entry for the same save.
    pub suppress_generic_adjustment_entry: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            history_limit: DEFAULT_HISTORY_LIMIT,
            suppress_generic_adjustment_entry: false,
        }
    }
}

/// Process-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub service: ServiceSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            use_persistent_stores: false,
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            service: ServiceSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        Self {
            bind_addr: lookup("BIND_ADDR")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.bind_addr),
            use_persistent_stores: lookup("USE_PERSISTENT_STORES")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: parsed(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            service: ServiceSettings {
                low_stock_threshold: parsed(
                    &lookup,
                    "LOW_STOCK_THRESHOLD",
                    defaults.service.low_stock_threshold,
                ),
                history_limit: parsed(&lookup, "HISTORY_LIMIT", defaults.service.history_limit),
                suppress_generic_adjustment_entry: lookup("AUDIT_SUPPRESS_GENERIC_ADJUSTMENT_ENTRY")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(false),
            },
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, %default, "invalid setting; using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(settings(&[]), Settings::default());
    }

    #[test]
    fn reads_overrides() {
        let s = settings(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/stock"),
            ("LOW_STOCK_THRESHOLD", "3"),
            ("HISTORY_LIMIT", "20"),
            ("AUDIT_SUPPRESS_GENERIC_ADJUSTMENT_ENTRY", "1"),
        ]);
        assert_eq!(s.bind_addr, "127.0.0.1:9000");
        assert!(s.use_persistent_stores);
        assert_eq!(s.database_url.as_deref(), Some("postgres://localhost/stock"));
        assert_eq!(s.service.low_stock_threshold, 3);
        assert_eq!(s.service.history_limit, 20);
        assert!(s.service.suppress_generic_adjustment_entry);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let s = settings(&[("HISTORY_LIMIT", "lots"), ("USE_PERSISTENT_STORES", "nah")]);
        assert_eq!(s.service.history_limit, DEFAULT_HISTORY_LIMIT);
        assert!(!s.use_persistent_stores);
    }
}
