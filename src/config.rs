//! Layered configuration for the watch process.
//!
//! Sources, lowest precedence first:
//! - Built-in defaults
//! - TOML configuration file (`devwatch.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Variables are prefixed with `DEVWATCH_` and use double underscores to
//! separate nested levels:
//! - `DEVWATCH_WATCH__DEBOUNCE_MS=500` sets `watch.debounce_ms`
//! - `DEVWATCH_WATCH__REARM=false` sets `watch.rearm`
//! - `DEVWATCH_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "devwatch.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Watch engine configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// File extensions that qualify for individual subscriptions
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Quiescence window in milliseconds, measured from the first event
    /// of a burst
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Re-arm the reload gate automatically after the callback returns.
    /// When false the callback must reset the gate itself.
    #[serde(default = "default_true")]
    pub rearm: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level filter
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides, e.g. `watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_extensions() -> Vec<String> {
    vec!["php".to_string()]
}
fn default_debounce_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            debounce_ms: default_debounce_ms(),
            rearm: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration with an explicit config file path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Layer in environment variables with DEVWATCH_ prefix.
            // Double underscore separates nested levels; single underscores
            // stay as-is within field names.
            .merge(Env::prefixed("DEVWATCH_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }
}
