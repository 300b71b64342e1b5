//! MFRC522 card reader support.
//!
//! Layers, bottom up:
//!
//! - [`registers`]: register map and command constants
//! - [`link`]: one register access per two-byte bus exchange
//! - [`reader`]: the card protocol engine (bring-up, REQA, anticollision,
//!   HLTA, antenna control)
//! - [`debounce`]: repeat-read suppression shared across reader sessions
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use wattkey_hardware::ReaderPort;
//! use wattkey_hardware::mock::MockReaderPort;
//! use wattkey_rfid::{CardReader, Debouncer, ProtocolTiming};
//!
//! # async fn example() -> wattkey_hardware::Result<()> {
//! let (port, handle) = MockReaderPort::new();
//! handle.present_card(&[0x0A, 0x4E, 0x17, 0x05]);
//!
//! let (bus, mut reset) = port.open()?;
//! let debounce = Debouncer::new(Duration::from_secs(2));
//! let mut reader = CardReader::init(bus, &mut reset, ProtocolTiming::default(), debounce).await?;
//!
//! if let Some(uid) = reader.poll_card().await {
//!     println!("card {uid}");
//!     reader.halt_card().await;
//! }
//! let _history = reader.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod debounce;
pub mod link;
pub mod reader;
pub mod registers;
pub mod uid;

pub use debounce::Debouncer;
pub use link::ReaderLink;
pub use reader::{CardReader, ProtocolTiming, TransceiveStatus};
pub use uid::CardUid;
