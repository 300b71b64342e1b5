//! Runtime configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file (or
//! no file at all) yields the stock setup.
//!
//! ```toml
//! allowed_cards = ["EE:E0:E8:00", "0A:4E:17:05"]
//!
//! [timing]
//! debounce_ms = 2000
//! measure_interval_ms = 1500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wattkey_core::constants::*;
use wattkey_rfid::ProtocolTiming;

use crate::allow_list::AllowList;

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid allow-list entry: {0}")]
    InvalidCard(#[from] wattkey_core::Error),

    #[error("Timing value `{field}` must be greater than zero")]
    ZeroTiming { field: &'static str },
}

// ----------------------------------------------------------------------------
// Top-level Configuration
// ----------------------------------------------------------------------------

/// Complete controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WattkeyConfig {
    /// Cards allowed to start a session, in external form.
    pub allowed_cards: Vec<String>,

    /// Loop periods and protocol waits.
    pub timing: TimingConfig,
}

impl Default for WattkeyConfig {
    fn default() -> Self {
        Self {
            allowed_cards: DEFAULT_ALLOWED_CARDS.iter().map(|s| s.to_string()).collect(),
            timing: TimingConfig::default(),
        }
    }
}

impl WattkeyConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed TOML, a bad card entry or a
    /// zero period.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Check card entries and periods.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.allow_list()?;
        self.timing.validate()
    }

    /// Build the allow-list from the configured entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCard`] for the first unparsable entry.
    pub fn allow_list(&self) -> Result<AllowList, ConfigError> {
        Ok(AllowList::parse(&self.allowed_cards)?)
    }
}

// ----------------------------------------------------------------------------
// Timing
// ----------------------------------------------------------------------------

/// Loop periods and protocol waits, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub control_tick_ms: u64,
    pub scan_poll_ms: u64,
    pub irq_timeout_ms: u64,
    pub irq_poll_ms: u64,
    pub debounce_ms: u64,
    /// How long the OK screen stays up before the reader is released.
    pub ok_hold_ms: u64,
    pub measure_interval_ms: u64,
    pub energy_persist_ms: u64,
    pub command_poll_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            control_tick_ms: DEFAULT_CONTROL_TICK_MS,
            scan_poll_ms: DEFAULT_SCAN_POLL_MS,
            irq_timeout_ms: DEFAULT_IRQ_TIMEOUT_MS,
            irq_poll_ms: DEFAULT_IRQ_POLL_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ok_hold_ms: DEFAULT_OK_HOLD_MS,
            measure_interval_ms: DEFAULT_MEASURE_INTERVAL_MS,
            energy_persist_ms: DEFAULT_ENERGY_PERSIST_MS,
            command_poll_ms: DEFAULT_COMMAND_POLL_MS,
        }
    }
}

impl TimingConfig {
    /// Reject periods that would spin or stall a loop.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTiming`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("control_tick_ms", self.control_tick_ms),
            ("scan_poll_ms", self.scan_poll_ms),
            ("irq_timeout_ms", self.irq_timeout_ms),
            ("irq_poll_ms", self.irq_poll_ms),
            ("measure_interval_ms", self.measure_interval_ms),
            ("command_poll_ms", self.command_poll_ms),
        ];
        match required.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::ZeroTiming { field: *field }),
            None => Ok(()),
        }
    }

    // Interval periods are clamped to 1 ms; `tokio::time::interval` panics on zero.

    pub fn control_tick(&self) -> Duration {
        Duration::from_millis(self.control_tick_ms.max(1))
    }

    pub fn scan_poll(&self) -> Duration {
        Duration::from_millis(self.scan_poll_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn ok_hold(&self) -> Duration {
        Duration::from_millis(self.ok_hold_ms)
    }

    pub fn measure_interval(&self) -> Duration {
        Duration::from_millis(self.measure_interval_ms)
    }

    pub fn energy_persist(&self) -> Duration {
        Duration::from_millis(self.energy_persist_ms)
    }

    pub fn command_poll(&self) -> Duration {
        Duration::from_millis(self.command_poll_ms.max(1))
    }

    /// Waits handed to the card protocol engine.
    pub fn protocol(&self) -> ProtocolTiming {
        ProtocolTiming {
            irq_timeout: Duration::from_millis(self.irq_timeout_ms),
            irq_poll: Duration::from_millis(self.irq_poll_ms),
            ..ProtocolTiming::default()
        }
    }
}
