//! Reader Link: byte-level register access over the SPI bus.
//!
//! Each call is exactly one two-byte exchange:
//!
//! ```text
//! byte 0: [R/W̄][A5 A4 A3 A2 A1 A0][0]   register address, read flag on top
//! byte 1: data to write | 0x00 dummy while reading
//! ```
//!
//! There are no retries here. A failed transfer is logged and a read
//! returns `0x00`; the protocol engine notices because the expected
//! interrupt or FIFO level never shows up.

use tracing::trace;
use wattkey_hardware::RegisterBus;

use crate::registers::{ADDRESS_MASK, ADDRESS_READ_FLAG, REG_COMMAND};

/// Encode the SPI address byte for `reg`.
///
/// # Examples
///
/// ```
/// use wattkey_rfid::link::address_byte;
///
/// assert_eq!(address_byte(0x37, true), 0xEE);
/// assert_eq!(address_byte(0x01, false), 0x02);
/// ```
pub fn address_byte(reg: u8, read: bool) -> u8 {
    let addr = (reg << 1) & ADDRESS_MASK;
    if read { addr | ADDRESS_READ_FLAG } else { addr }
}

/// Register-level access to one reader session.
#[derive(Debug)]
pub struct ReaderLink<B> {
    bus: B,
}

impl<B: RegisterBus> ReaderLink<B> {
    /// Wrap a claimed bus device.
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Write one register.
    pub fn write_register(&mut self, reg: u8, value: u8) {
        if let Err(e) = self.bus.transfer([address_byte(reg, false), value]) {
            trace!(reg, value, error = %e, "register write failed");
        }
    }

    /// Read one register. A failed transfer reads as `0x00`.
    pub fn read_register(&mut self, reg: u8) -> u8 {
        match self.bus.transfer([address_byte(reg, true), 0x00]) {
            Ok(rx) => rx[1],
            Err(e) => {
                trace!(reg, error = %e, "register read failed");
                0x00
            }
        }
    }

    /// Issue a reader command.
    pub fn command(&mut self, command: u8) {
        self.write_register(REG_COMMAND, command);
    }

    /// Read-modify-write that sets `mask`.
    pub fn set_bits(&mut self, reg: u8, mask: u8) {
        let value = self.read_register(reg);
        self.write_register(reg, value | mask);
    }

    /// Read-modify-write that clears `mask`.
    pub fn clear_bits(&mut self, reg: u8, mask: u8) {
        let value = self.read_register(reg);
        self.write_register(reg, value & !mask);
    }

    /// Give the bus device back.
    pub fn into_inner(self) -> B {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use wattkey_hardware::{HardwareError, Result};

    /// Bus that records frames and answers reads with a fixed byte.
    #[derive(Default)]
    struct RecordingBus {
        frames: Vec<[u8; 2]>,
        answer: u8,
        failing: bool,
    }

    impl RegisterBus for RecordingBus {
        fn transfer(&mut self, frame: [u8; 2]) -> Result<[u8; 2]> {
            self.frames.push(frame);
            if self.failing {
                return Err(HardwareError::bus("unplugged"));
            }
            Ok([0x00, self.answer])
        }
    }

    #[rstest]
    #[case(0x01, false, 0x02)]
    #[case(0x04, true, 0x88)]
    #[case(0x09, false, 0x12)]
    #[case(0x37, true, 0xEE)]
    #[case(0x3F, true, 0xFE)]
    fn test_address_byte(#[case] reg: u8, #[case] read: bool, #[case] expected: u8) {
        assert_eq!(address_byte(reg, read), expected);
        assert_eq!(address_byte(reg, read) & 0x01, 0);
    }

    #[test]
    fn test_write_is_single_exchange() {
        let mut link = ReaderLink::new(RecordingBus::default());
        link.write_register(0x2A, 0x8D);

        let bus = link.into_inner();
        assert_eq!(bus.frames, vec![[0x54, 0x8D]]);
    }

    #[test]
    fn test_read_sends_dummy_byte() {
        let mut link = ReaderLink::new(RecordingBus {
            answer: 0x92,
            ..Default::default()
        });
        assert_eq!(link.read_register(0x37), 0x92);

        let bus = link.into_inner();
        assert_eq!(bus.frames, vec![[0xEE, 0x00]]);
    }

    #[test]
    fn test_failed_read_is_zero() {
        let mut link = ReaderLink::new(RecordingBus {
            answer: 0xAB,
            failing: true,
            ..Default::default()
        });
        assert_eq!(link.read_register(0x04), 0x00);
        link.write_register(0x04, 0x7F);

        // No retries
        assert_eq!(link.into_inner().frames.len(), 2);
    }

    #[test]
    fn test_set_and_clear_bits() {
        let mut link = ReaderLink::new(RecordingBus {
            answer: 0x80,
            ..Default::default()
        });
        link.set_bits(0x14, 0x03);
        link.clear_bits(0x14, 0x80);

        let bus = link.into_inner();
        assert_eq!(
            bus.frames,
            vec![[0xA8, 0x00], [0x28, 0x83], [0xA8, 0x00], [0x28, 0x00]]
        );
    }
}
