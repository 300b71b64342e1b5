//! Shared vocabulary for wattkey: card identifiers, device slots, meter
//! readings and the timing constants the reader and session layers use.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
