//! Hardware collaborator trait definitions.
//!
//! These traits are the seam between the session core and the physical
//! board: the register bus and reset line of the card reader, the relay
//! outputs, the power meters and the status display. Each has a mock
//! implementation in [`crate::mock`].
//!
//! Async methods are declared as `fn ... -> impl Future<Output = _> + Send`
//! so that generic callers can hand the resulting futures to `tokio::spawn`.
//! Implementors may still write them as plain `async fn`.

use std::future::Future;

use wattkey_core::{DeviceSlot, Sample};

use crate::error::Result;
use crate::types::Screen;

/// Synchronous full-duplex register bus (SPI mode 0 in practice).
///
/// One call is exactly one chip-select framed exchange of two bytes. The
/// implementation must not buffer or retry.
///
/// # Examples
///
/// ```
/// use wattkey_hardware::traits::RegisterBus;
/// use wattkey_hardware::mock::MockReaderPort;
/// use wattkey_hardware::traits::ReaderPort;
///
/// let (port, _handle) = MockReaderPort::new();
/// let (mut bus, _reset) = port.open().unwrap();
///
/// // Read the version register (0x37): address byte with the read flag.
/// let rx = bus.transfer([0x80 | (0x37 << 1), 0x00]).unwrap();
/// assert_eq!(rx[1], 0x92);
/// ```
pub trait RegisterBus: Send {
    /// Clock out `frame` and return the bytes clocked in at the same time.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus device is gone or the transfer fails.
    fn transfer(&mut self, frame: [u8; 2]) -> Result<[u8; 2]>;
}

/// Active-low hardware reset input of the reader.
pub trait ResetLine: Send {
    /// Drive the line high (reader running).
    fn set_high(&mut self) -> Result<()>;

    /// Drive the line low (reader held in reset).
    fn set_low(&mut self) -> Result<()>;
}

/// Source of reader sessions.
///
/// Every scan opens a fresh bus device and reset line and drops them when
/// it finishes, so a reader left half-configured by an aborted scan is
/// always brought up from scratch.
pub trait ReaderPort: Send + Sync + 'static {
    /// Bus device type handed out per session.
    type Bus: RegisterBus + 'static;

    /// Reset line type handed out per session.
    type Reset: ResetLine + 'static;

    /// Acquire the bus device and reset line.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus cannot be claimed.
    fn open(&self) -> Result<(Self::Bus, Self::Reset)>;
}

/// Relay outputs feeding the metered devices.
pub trait RelayDriver: Send + Sync {
    /// Switch one output.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be driven.
    fn set(&self, slot: DeviceSlot, on: bool) -> Result<()>;
}

/// Current/voltage sampling for one device slot.
pub trait PowerMeter: Send + Sync + 'static {
    /// Take one measurement pass for `slot`.
    ///
    /// `energy_delta` in the returned sample is the energy (Wh) consumed
    /// since the previous pass for this slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the sensors cannot be read.
    fn sample(&self, slot: DeviceSlot) -> impl Future<Output = Result<Sample>> + Send;
}

/// Status display.
pub trait StatusDisplay: Send + Sync {
    /// Draw `screen`, replacing whatever was shown.
    fn show(&self, screen: &Screen);
}
