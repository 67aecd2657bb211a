//! Service configuration, read from environment variables with defaults.

use std::env;
use std::time::Duration;

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 5000;

/// Default database path if not specified via environment variable.
pub const DEFAULT_DB_URL: &str = "sqlite:geoplan.db?mode=rwc";

const DEFAULT_INFO_INTERVAL_SECS: u64 = 30;
const DEFAULT_CRITICAL_INTERVAL_SECS: u64 = 120;

/// Deployment flavour. Controls how much error detail clients see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub environment: Environment,

    /// NASA FIRMS map key. Without it fire data is always simulated.
    pub firms_map_key: Option<String>,
    pub firms_base_url: Option<String>,
    pub power_base_url: Option<String>,

    pub info_interval: Duration,
    pub critical_interval: Duration,

    /// Fixes every random source when set.
    pub random_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DB_URL.to_string(),
            environment: Environment::Development,
            firms_map_key: None,
            firms_base_url: None,
            power_base_url: None,
            info_interval: Duration::from_secs(DEFAULT_INFO_INTERVAL_SECS),
            critical_interval: Duration::from_secs(DEFAULT_CRITICAL_INTERVAL_SECS),
            random_seed: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let environment = match non_empty("GEOPLAN_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };

        let secs = |key: &str, default: Duration| {
            non_empty(key)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        Self {
            port: non_empty("GEOPLAN_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_url: non_empty("GEOPLAN_DATABASE_URL").unwrap_or(defaults.database_url),
            environment,
            firms_map_key: non_empty("NASA_FIRMS_MAP_KEY"),
            firms_base_url: non_empty("NASA_FIRMS_BASE_URL"),
            power_base_url: non_empty("NASA_POWER_BASE_URL"),
            info_interval: secs("GEOPLAN_INFO_INTERVAL_SECS", defaults.info_interval),
            critical_interval: secs("GEOPLAN_CRITICAL_INTERVAL_SECS", defaults.critical_interval),
            random_seed: non_empty("GEOPLAN_RANDOM_SEED").and_then(|s| s.parse().ok()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
