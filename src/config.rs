use serde::{Deserialize, Serialize};

/// Application configuration: server binding plus matching tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub matching: MatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Matching tunables. Historical deployments disagreed on several of these
/// (search window 3 vs 15 days, group cap 5 vs 10), so all of them are
/// configuration with defaults rather than constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Shipment records are candidates within +/- this many days of the
    /// invoice issue date.
    pub date_window_days: i64,
    /// Amount tolerance as a percentage of the invoice total.
    pub amount_tolerance_pct: f64,
    /// Maximum shipment records combined to satisfy one invoice.
    pub max_group_size: usize,
    /// Heuristic candidates below this composite score are discarded.
    pub min_heuristic_score: f64,
    /// Pools larger than this skip multi-record enumeration (degrade to
    /// size-1 search, reported on the result).
    pub max_combination_pool: usize,
    /// Normalized text similarity (0-1) for a product line to count as matched.
    pub similarity_threshold: f64,
    /// Date drift beyond this many days adds a note for the alert registry.
    pub late_days_alert: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            date_window_days: 15,
            amount_tolerance_pct: 2.0,
            max_group_size: 10,
            min_heuristic_score: 70.0,
            max_combination_pool: 15,
            similarity_threshold: 0.8,
            late_days_alert: 7,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            matching: MatchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from an optional `config.toml` next to the binary, overridden by
    /// `RECON_`-prefixed environment variables (e.g. RECON_SERVER__PORT).
    pub fn load() -> Result<Self, crate::error::EngineError> {
        let defaults = config::Config::try_from(&AppConfig::default())?;
        let loaded = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("RECON").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(loaded)
    }
}
