//! Core constants for the wattkey session controller.
//!
//! This module centralizes identity formats, device slot counts, remote store
//! keys and the default timing of every loop in the system. Configuration
//! types in `wattkey-session` use these values as their defaults.
//!
//! # Usage
//!
//! ```
//! use wattkey_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(DEVICE_SLOT_COUNT, 2);
//! let window = Duration::from_millis(DEFAULT_DEBOUNCE_MS);
//! assert_eq!(window.as_secs(), 2);
//! ```

// ============================================================================
// Card Identity
// ============================================================================

/// Valid UID lengths in bytes (single, double and triple cascade tiers).
///
/// # Examples
///
/// ```
/// use wattkey_core::constants::UID_LENGTHS;
///
/// assert!(UID_LENGTHS.contains(&4));
/// assert!(!UID_LENGTHS.contains(&5));
/// ```
pub const UID_LENGTHS: [usize; 3] = [4, 7, 10];

/// Separator between hex bytes in the external identifier form.
pub const CARD_ID_SEPARATOR: char = ':';

/// Identifiers accepted when no allow-list is configured.
pub const DEFAULT_ALLOWED_CARDS: [&str; 2] = ["EE:E0:E8:00", "0A:4E:17:05"];

// ============================================================================
// Devices
// ============================================================================

/// Number of metered, relay-switched device slots.
pub const DEVICE_SLOT_COUNT: usize = 2;

// ============================================================================
// Timing (milliseconds)
// ============================================================================

/// Control loop tick.
pub const DEFAULT_CONTROL_TICK_MS: u64 = 10;

/// Delay between presence checks during a scan.
pub const DEFAULT_SCAN_POLL_MS: u64 = 20;

/// Upper bound for one reader transceive cycle.
pub const DEFAULT_IRQ_TIMEOUT_MS: u64 = 50;

/// Interval between interrupt register polls inside a transceive cycle.
pub const DEFAULT_IRQ_POLL_MS: u64 = 1;

/// Window in which a repeated read of the same identifier is suppressed.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// How long the OK screen stays up after a valid card, before the reader is released.
pub const DEFAULT_OK_HOLD_MS: u64 = 2000;

/// Interval between measurement passes while logged in.
pub const DEFAULT_MEASURE_INTERVAL_MS: u64 = 1500;

/// Interval between persisting running energy counters for the current user.
pub const DEFAULT_ENERGY_PERSIST_MS: u64 = 5000;

/// Remote command poll cadence.
pub const DEFAULT_COMMAND_POLL_MS: u64 = 500;

// ============================================================================
// Reader Bring-up (milliseconds)
// ============================================================================

/// Duration of each phase of the hardware reset pulse.
pub const RESET_PULSE_MS: u64 = 10;

/// Settle time after releasing the reset line.
pub const RESET_SETTLE_MS: u64 = 50;

/// Settle time after a soft reset command.
pub const SOFT_RESET_SETTLE_MS: u64 = 50;

/// Pause after HLTA before the reader is idled.
pub const HALT_SETTLE_MS: u64 = 5;
