//! Hardware collaborator abstraction layer for the wattkey session controller.
//!
//! This crate provides trait-based abstractions for the peripherals around
//! the session core: the contactless reader's register bus and reset line,
//! the relay outputs, the power meters and the status display. These traits
//! allow substitution between mock implementations (for development and
//! testing) and real board drivers.
//!
//! # Design Philosophy
//!
//! - **Bus calls are synchronous**: one register access is one two-byte SPI
//!   exchange; waiting happens one layer up in the protocol engine.
//! - **Measurement is async**: a pass over the analog front end takes tens of
//!   milliseconds and must not block the runtime.
//! - **Thread-safe**: all traits require `Send` (and `Sync` where shared) for
//!   use with Tokio.
//! - **Error-aware**: fallible operations return [`Result<T>`][error::Result]
//!   with a [`HardwareError`].
//!
//! # Reader Sessions
//!
//! ```
//! use wattkey_hardware::mock::MockReaderPort;
//! use wattkey_hardware::traits::ReaderPort;
//!
//! let (port, handle) = MockReaderPort::new();
//! {
//!     let (_bus, _reset) = port.open().unwrap();
//!     assert_eq!(handle.open_sessions(), 1);
//! }
//! // Dropping the session releases the bus
//! assert_eq!(handle.open_sessions(), 0);
//! ```
//!
//! # Mock Implementations
//!
//! [`mock`] contains a register-level MFRC522 simulator, a recording display,
//! an atomic relay bank and a fixed-sample power meter.

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{PowerMeter, ReaderPort, RegisterBus, RelayDriver, ResetLine, StatusDisplay};
pub use types::Screen;
