//! TOML-based engine configuration.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Top-level engine configuration parsed from TOML.
///
/// All fields have defaults matching a production deployment. Load from
/// TOML with [`EngineConfig::from_toml_file`] or use
/// [`EngineConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Tick loop and worker-pool parameters.
    pub engine: EngineSection,
    /// Tariff used to price saved energy.
    pub tariff: TariffSection,
}

/// Tick loop and worker-pool parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    /// Evaluation tick interval in seconds (must be > 0).
    pub tick_seconds: u64,
    /// Maximum number of homes evaluated concurrently (must be > 0).
    pub worker_pool: usize,
    /// Bound on every external call (device control, stores).
    pub io_timeout_ms: u64,
    /// Battery recovery margin above `edg_min_battery_percent` before the
    /// source optimizer returns to solar.
    pub hysteresis_margin_percent: f32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            tick_seconds: 60,
            worker_pool: 8,
            io_timeout_ms: 2_000,
            hysteresis_margin_percent: 5.0,
        }
    }
}

/// Tariff used to price saved energy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffSection {
    /// EDG grid tariff in GNF per kWh.
    pub gnf_per_kwh: f32,
}

impl Default for TariffSection {
    fn default() -> Self {
        Self { gnf_per_kwh: 900.0 }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"engine.tick_seconds"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} — {}", self.field, self.message)
    }
}

impl EngineConfig {
    /// Parses the engine configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is
    /// invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses the engine configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown
    /// fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.engine.tick_seconds == 0 {
            errors.push(ConfigError {
                field: "engine.tick_seconds".into(),
                message: "must be > 0".into(),
            });
        }
        if self.engine.worker_pool == 0 {
            errors.push(ConfigError {
                field: "engine.worker_pool".into(),
                message: "must be > 0".into(),
            });
        }
        if self.engine.io_timeout_ms == 0 {
            errors.push(ConfigError {
                field: "engine.io_timeout_ms".into(),
                message: "must be > 0".into(),
            });
        }
        if self.engine.hysteresis_margin_percent < 0.0 {
            errors.push(ConfigError {
                field: "engine.hysteresis_margin_percent".into(),
                message: "must be >= 0".into(),
            });
        }
        if self.tariff.gnf_per_kwh <= 0.0 {
            errors.push(ConfigError {
                field: "tariff.gnf_per_kwh".into(),
                message: "must be > 0".into(),
            });
        }

        errors
    }
}
