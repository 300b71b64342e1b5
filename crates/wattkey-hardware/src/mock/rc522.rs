//! Register-level MFRC522 simulator.
//!
//! The simulator answers the same two-byte bus frames a real reader does,
//! keeps a register file and FIFO, and runs a small ISO 14443A card model
//! whenever a Transceive command is started. It is controlled from tests
//! through [`MockRc522Handle`].
//!
//! Only the parts of the chip the card protocol engine touches are modeled:
//! interrupt flags, error flags, FIFO, bit framing, transmitter control,
//! version, soft and hard reset.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::{
    HardwareError, Result,
    traits::{ReaderPort, RegisterBus, ResetLine},
};

const REG_COMMAND: u8 = 0x01;
const REG_COM_IRQ: u8 = 0x04;
const REG_ERROR: u8 = 0x06;
const REG_FIFO_DATA: u8 = 0x09;
const REG_FIFO_LEVEL: u8 = 0x0A;
const REG_BIT_FRAMING: u8 = 0x0D;
const REG_TX_CONTROL: u8 = 0x14;
const REG_VERSION: u8 = 0x37;

const CMD_IDLE: u8 = 0x00;
const CMD_TRANSCEIVE: u8 = 0x0C;
const CMD_SOFT_RESET: u8 = 0x0F;

const IRQ_RX: u8 = 0x20;
const IRQ_IDLE: u8 = 0x10;
const IRQ_ERR: u8 = 0x02;
const IRQ_TIMER: u8 = 0x01;

const START_SEND: u8 = 0x80;
const FIFO_CAPACITY: usize = 64;
const TX_CONTROL_RESET_VALUE: u8 = 0x80;

/// Version byte reported by a genuine MFRC522 v2.0.
pub const DEFAULT_VERSION: u8 = 0x92;

#[derive(Debug, Clone)]
struct SimCard {
    uid: Vec<u8>,
    halted: bool,
}

#[derive(Debug)]
struct Chip {
    regs: [u8; 64],
    fifo: VecDeque<u8>,
    version: u8,
    card: Option<SimCard>,
    pending_errors: u8,
    corrupt_next_bcc: bool,
    bus_failure: bool,
    reset_low: bool,
    hard_resets: usize,
    writes: Vec<(u8, u8)>,
    open_sessions: usize,
    opened_total: usize,
}

impl Chip {
    fn new() -> Self {
        let mut chip = Self {
            regs: [0; 64],
            fifo: VecDeque::with_capacity(FIFO_CAPACITY),
            version: DEFAULT_VERSION,
            card: None,
            pending_errors: 0,
            corrupt_next_bcc: false,
            bus_failure: false,
            reset_low: false,
            hard_resets: 0,
            writes: Vec::new(),
            open_sessions: 0,
            opened_total: 0,
        };
        chip.power_on_reset();
        chip
    }

    fn power_on_reset(&mut self) {
        self.regs = [0; 64];
        self.regs[REG_TX_CONTROL as usize] = TX_CONTROL_RESET_VALUE;
        self.fifo.clear();
    }

    fn read(&mut self, addr: u8) -> u8 {
        match addr {
            REG_FIFO_DATA => self.fifo.pop_front().unwrap_or(0),
            REG_FIFO_LEVEL => self.fifo.len() as u8,
            REG_VERSION => self.version,
            _ => self.regs[addr as usize],
        }
    }

    fn write(&mut self, addr: u8, value: u8) {
        self.writes.push((addr, value));

        match addr {
            REG_COMMAND => {
                let command = value & 0x0F;
                if command == CMD_SOFT_RESET {
                    self.power_on_reset();
                    self.regs[REG_COMMAND as usize] = CMD_IDLE;
                } else {
                    self.regs[REG_COMMAND as usize] = command;
                }
            }
            REG_COM_IRQ => {
                let mask = value & 0x7F;
                if value & 0x80 != 0 {
                    self.regs[REG_COM_IRQ as usize] |= mask;
                } else {
                    self.regs[REG_COM_IRQ as usize] &= !mask;
                }
            }
            REG_FIFO_LEVEL => {
                if value & 0x80 != 0 {
                    self.fifo.clear();
                }
            }
            REG_FIFO_DATA => {
                if self.fifo.len() < FIFO_CAPACITY {
                    self.fifo.push_back(value);
                }
            }
            REG_BIT_FRAMING => {
                self.regs[REG_BIT_FRAMING as usize] = value;
                if value & START_SEND != 0
                    && self.regs[REG_COMMAND as usize] == CMD_TRANSCEIVE
                {
                    self.transceive();
                }
            }
            REG_VERSION => {}
            _ => self.regs[addr as usize] = value,
        }
    }

    fn transceive(&mut self) {
        let frame: Vec<u8> = self.fifo.drain(..).collect();
        self.regs[REG_ERROR as usize] = 0;

        if self.pending_errors != 0 {
            self.regs[REG_ERROR as usize] = self.pending_errors;
            self.pending_errors = 0;
            self.regs[REG_COM_IRQ as usize] |= IRQ_RX | IRQ_IDLE | IRQ_ERR;
            return;
        }

        let response = match (frame.as_slice(), self.card.as_mut()) {
            // REQA wakes only idle cards, WUPA also wakes halted ones
            ([0x26], Some(card)) if !card.halted => Some(vec![0x04, 0x00]),
            ([0x52], Some(card)) => {
                card.halted = false;
                Some(vec![0x04, 0x00])
            }
            ([0x93, 0x20], Some(card)) if !card.halted => {
                let mut uid: Vec<u8> = card.uid.iter().take(4).copied().collect();
                let mut bcc = uid.iter().fold(0u8, |acc, b| acc ^ b);
                if self.corrupt_next_bcc {
                    self.corrupt_next_bcc = false;
                    bcc ^= 0xFF;
                }
                uid.push(bcc);
                Some(uid)
            }
            ([0x50, 0x00], Some(card)) => {
                card.halted = true;
                None
            }
            _ => None,
        };

        match response {
            Some(bytes) => {
                self.fifo.extend(bytes);
                self.regs[REG_COM_IRQ as usize] |= IRQ_RX | IRQ_IDLE;
            }
            None => {
                self.regs[REG_COM_IRQ as usize] |= IRQ_TIMER;
            }
        }
    }
}

type SharedChip = Arc<Mutex<Chip>>;

fn lock(chip: &SharedChip) -> MutexGuard<'_, Chip> {
    chip.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock reader port that hands out simulated MFRC522 sessions.
///
/// # Examples
///
/// ```
/// use wattkey_hardware::mock::MockReaderPort;
/// use wattkey_hardware::traits::ReaderPort;
///
/// let (port, handle) = MockReaderPort::new();
/// handle.present_card(&[0xEE, 0xE0, 0xE8, 0x00]);
///
/// let session = port.open().unwrap();
/// assert_eq!(handle.open_sessions(), 1);
/// drop(session);
/// assert_eq!(handle.open_sessions(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockReaderPort {
    chip: SharedChip,
}

impl MockReaderPort {
    /// Create a port backed by a fresh simulated chip with no card in the field.
    pub fn new() -> (Self, MockRc522Handle) {
        let chip = Arc::new(Mutex::new(Chip::new()));
        (
            Self { chip: chip.clone() },
            MockRc522Handle { chip },
        )
    }
}

impl ReaderPort for MockReaderPort {
    type Bus = MockRc522;
    type Reset = MockResetLine;

    fn open(&self) -> Result<(MockRc522, MockResetLine)> {
        let mut chip = lock(&self.chip);
        if chip.bus_failure {
            return Err(HardwareError::bus("simulated bus unavailable"));
        }
        chip.open_sessions += 1;
        chip.opened_total += 1;
        drop(chip);

        Ok((
            MockRc522 {
                chip: self.chip.clone(),
            },
            MockResetLine {
                chip: self.chip.clone(),
            },
        ))
    }
}

/// Bus device of one simulated reader session. Dropping it releases the bus.
#[derive(Debug)]
pub struct MockRc522 {
    chip: SharedChip,
}

impl RegisterBus for MockRc522 {
    fn transfer(&mut self, frame: [u8; 2]) -> Result<[u8; 2]> {
        let mut chip = lock(&self.chip);
        if chip.bus_failure {
            return Err(HardwareError::bus("simulated bus failure"));
        }
        if frame[0] & 0x01 != 0 {
            return Err(HardwareError::invalid_data(format!(
                "address byte 0x{:02X} has reserved bit set",
                frame[0]
            )));
        }

        let addr = (frame[0] >> 1) & 0x3F;

        if frame[0] & 0x80 != 0 {
            let value = chip.read(addr);
            trace!(addr, value, "sim read");
            Ok([0x00, value])
        } else {
            trace!(addr, value = frame[1], "sim write");
            chip.write(addr, frame[1]);
            Ok([0x00, 0x00])
        }
    }
}

impl Drop for MockRc522 {
    fn drop(&mut self) {
        let mut chip = lock(&self.chip);
        chip.open_sessions = chip.open_sessions.saturating_sub(1);
    }
}

/// Reset line of one simulated reader session.
#[derive(Debug)]
pub struct MockResetLine {
    chip: SharedChip,
}

impl ResetLine for MockResetLine {
    fn set_high(&mut self) -> Result<()> {
        let mut chip = lock(&self.chip);
        if chip.reset_low {
            chip.reset_low = false;
            chip.hard_resets += 1;
            chip.power_on_reset();
        }
        Ok(())
    }

    fn set_low(&mut self) -> Result<()> {
        lock(&self.chip).reset_low = true;
        Ok(())
    }
}

/// Handle for controlling and inspecting the simulated reader.
#[derive(Debug, Clone)]
pub struct MockRc522Handle {
    chip: SharedChip,
}

impl MockRc522Handle {
    /// Place a card in the field. Replaces any card already there.
    pub fn present_card(&self, uid: &[u8]) {
        lock(&self.chip).card = Some(SimCard {
            uid: uid.to_vec(),
            halted: false,
        });
    }

    /// Take the card out of the field.
    pub fn remove_card(&self) {
        lock(&self.chip).card = None;
    }

    /// Whether the card in the field has received HLTA.
    pub fn is_card_halted(&self) -> bool {
        lock(&self.chip)
            .card
            .as_ref()
            .is_some_and(|card| card.halted)
    }

    /// Value reported by the version register (`0x00`/`0xFF` mimic a missing reader).
    pub fn set_version(&self, version: u8) {
        lock(&self.chip).version = version;
    }

    /// Raise `bits` in the error register on the next transceive.
    pub fn inject_error(&self, bits: u8) {
        lock(&self.chip).pending_errors = bits;
    }

    /// Answer the next anticollision with a wrong check byte.
    pub fn corrupt_next_bcc(&self) {
        lock(&self.chip).corrupt_next_bcc = true;
    }

    /// Make every transfer and open fail.
    pub fn set_bus_failure(&self, failing: bool) {
        lock(&self.chip).bus_failure = failing;
    }

    /// Current register value (without FIFO side effects).
    pub fn register(&self, addr: u8) -> u8 {
        lock(&self.chip).regs[(addr & 0x3F) as usize]
    }

    /// Whether both antenna driver bits are set.
    pub fn antenna_enabled(&self) -> bool {
        self.register(REG_TX_CONTROL) & 0x03 == 0x03
    }

    /// Number of writes that targeted `addr`.
    pub fn writes_to(&self, addr: u8) -> usize {
        lock(&self.chip)
            .writes
            .iter()
            .filter(|(reg, _)| *reg == addr)
            .count()
    }

    /// Completed hardware reset pulses.
    pub fn hard_resets(&self) -> usize {
        lock(&self.chip).hard_resets
    }

    /// Reader sessions currently holding the bus.
    pub fn open_sessions(&self) -> usize {
        lock(&self.chip).open_sessions
    }

    /// Reader sessions ever opened.
    pub fn opened_total(&self) -> usize {
        lock(&self.chip).opened_total
    }
}
