//! Error types for hardware operations.
//!
//! This module defines error types specific to peripheral operations:
//! register bus failures, reader bring-up failures, and collaborator
//! failures from meters and relay drivers.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Register bus transfer failed.
    #[error("Bus error: {message}")]
    BusError { message: String },

    /// Reader did not answer the version probe with a plausible value.
    #[error("Reader absent or unresponsive (version 0x{version:02X})")]
    ReaderAbsent { version: u8 },

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Measurement collaborator could not produce a sample.
    #[error("Measurement error: {message}")]
    MeasurementError { message: String },

    /// Relay driver could not switch an output.
    #[error("Actuation error: {message}")]
    ActuationError { message: String },
}

impl HardwareError {
    /// Create a new bus error.
    pub fn bus(message: impl Into<String>) -> Self {
        Self::BusError {
            message: message.into(),
        }
    }

    /// Create a new reader absent error from the probed version byte.
    pub fn reader_absent(version: u8) -> Self {
        Self::ReaderAbsent { version }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new measurement error.
    pub fn measurement(message: impl Into<String>) -> Self {
        Self::MeasurementError {
            message: message.into(),
        }
    }

    /// Create a new actuation error.
    pub fn actuation(message: impl Into<String>) -> Self {
        Self::ActuationError {
            message: message.into(),
        }
    }

    /// Whether the reader itself is missing, as opposed to a transient fault.
    pub fn is_reader_absent(&self) -> bool {
        matches!(self, Self::ReaderAbsent { .. })
    }
}
