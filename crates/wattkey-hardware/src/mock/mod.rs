//! Mock device implementations for testing and development.
//!
//! This module provides simulated collaborators that can be controlled
//! programmatically without requiring physical hardware.

pub mod display;
pub mod meter;
pub mod rc522;
pub mod relay;

// Re-export commonly used types
pub use display::{MockDisplay, MockDisplayHandle};
pub use meter::MockMeter;
pub use rc522::{MockRc522, MockRc522Handle, MockReaderPort, MockResetLine};
pub use relay::MockRelays;
