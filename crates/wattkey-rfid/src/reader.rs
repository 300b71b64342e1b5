//! Card Protocol Engine.
//!
//! Drives ISO 14443A exchanges through a [`ReaderLink`]. Every exchange runs
//! the same cycle:
//!
//! ```text
//! Idle ──▶ Armed ──▶ AwaitIrq ──┬──▶ Complete
//!   (FIFO loaded,               ├──▶ Timeout
//!    Transceive + StartSend)    └──▶ Error
//! ```
//!
//! Protocol faults never escape as errors. They come back as `false` or
//! `None` and the caller simply polls again. Only bring-up failures (reader
//! missing, reset line fault) are reported as [`HardwareError`].

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, trace};
use wattkey_core::constants::{
    DEFAULT_IRQ_POLL_MS, DEFAULT_IRQ_TIMEOUT_MS, HALT_SETTLE_MS, RESET_PULSE_MS, RESET_SETTLE_MS,
    SOFT_RESET_SETTLE_MS,
};
use wattkey_hardware::{HardwareError, RegisterBus, ResetLine, Result};

use crate::debounce::Debouncer;
use crate::link::ReaderLink;
use crate::registers::*;
use crate::uid::CardUid;

/// Wait bounds used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTiming {
    /// Longest wait for a transceive to finish.
    pub irq_timeout: Duration,
    /// Interval between interrupt register polls.
    pub irq_poll: Duration,
    /// Hold time of each reset line level.
    pub reset_pulse: Duration,
    /// Settle time after releasing the reset line.
    pub reset_settle: Duration,
    /// Settle time after the soft reset command.
    pub soft_reset_settle: Duration,
    /// Pause after sending HLTA before the reader is idled.
    pub halt_settle: Duration,
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self {
            irq_timeout: Duration::from_millis(DEFAULT_IRQ_TIMEOUT_MS),
            irq_poll: Duration::from_millis(DEFAULT_IRQ_POLL_MS),
            reset_pulse: Duration::from_millis(RESET_PULSE_MS),
            reset_settle: Duration::from_millis(RESET_SETTLE_MS),
            soft_reset_settle: Duration::from_millis(SOFT_RESET_SETTLE_MS),
            halt_settle: Duration::from_millis(HALT_SETTLE_MS),
        }
    }
}

/// How a transceive cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransceiveStatus {
    /// Frame received, no error bits.
    Complete,
    /// Timer interrupt or poll deadline.
    Timeout,
    /// Completed with error register bits set (masked value).
    Error(u8),
}

/// Card protocol engine bound to one reader session.
#[derive(Debug)]
pub struct CardReader<B> {
    link: ReaderLink<B>,
    timing: ProtocolTiming,
    debounce: Debouncer,
}

impl<B: RegisterBus> CardReader<B> {
    /// Bring the reader up and verify it answers.
    ///
    /// Runs the hardware reset pulse, the soft reset, timer and modulation
    /// setup, enables the antenna and finally probes the version register.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::ReaderAbsent`] if the version reads `0x00`
    /// or `0xFF`, or the reset line error if the pulse cannot be driven.
    /// The bus is released in both cases.
    pub async fn init<R: ResetLine>(
        bus: B,
        reset: &mut R,
        timing: ProtocolTiming,
        debounce: Debouncer,
    ) -> Result<Self> {
        let mut reader = Self {
            link: ReaderLink::new(bus),
            timing,
            debounce,
        };

        reset.set_high()?;
        sleep(timing.reset_pulse).await;
        reset.set_low()?;
        sleep(timing.reset_pulse).await;
        reset.set_high()?;
        sleep(timing.reset_settle).await;

        reader.link.command(CMD_SOFT_RESET);
        sleep(timing.soft_reset_settle).await;

        reader.link.write_register(REG_T_MODE, T_MODE_VALUE);
        reader.link.write_register(REG_T_PRESCALER, T_PRESCALER_VALUE);
        reader.link.write_register(REG_T_RELOAD_L, T_RELOAD_L_VALUE);
        reader.link.write_register(REG_T_RELOAD_H, T_RELOAD_H_VALUE);
        reader.link.write_register(REG_TX_ASK, TX_ASK_VALUE);
        reader.link.write_register(REG_MODE, MODE_VALUE);
        reader.antenna_on();

        let version = reader.version();
        if VERSION_ABSENT.contains(&version) {
            return Err(HardwareError::reader_absent(version));
        }

        debug!("reader initialized, version 0x{version:02X}");
        Ok(reader)
    }

    /// Chip version register.
    pub fn version(&mut self) -> u8 {
        self.link.read_register(REG_VERSION)
    }

    /// Enable both antenna drivers. Writes only if a driver is off.
    pub fn antenna_on(&mut self) {
        let value = self.link.read_register(REG_TX_CONTROL);
        if value & ANTENNA_BITS != ANTENNA_BITS {
            self.link.write_register(REG_TX_CONTROL, value | ANTENNA_BITS);
        }
    }

    /// Disable both antenna drivers.
    pub fn antenna_off(&mut self) {
        self.link.clear_bits(REG_TX_CONTROL, ANTENNA_BITS);
    }

    /// Send REQA and report whether a card answered.
    pub async fn detect_card(&mut self) -> bool {
        let status = self.transceive(&[PICC_REQA], FRAMING_SHORT).await;
        status == TransceiveStatus::Complete && self.link.read_register(REG_FIFO_LEVEL) > 0
    }

    /// Run cascade level 1 anticollision and return the UID.
    ///
    /// `None` for a timeout, error bits, a short or long answer, a check
    /// byte mismatch, or a repeat of the last accepted card inside the
    /// debounce window.
    pub async fn read_identifier(&mut self) -> Option<CardUid> {
        let status = self
            .transceive(&[PICC_SEL_CL1, PICC_NVB_ANTICOLLISION], FRAMING_FULL)
            .await;
        if status != TransceiveStatus::Complete {
            debug!(?status, "anticollision failed");
            return None;
        }

        let level = self.link.read_register(REG_FIFO_LEVEL);
        if level != CL1_RESPONSE_LEN {
            debug!(level, "unexpected anticollision answer length");
            return None;
        }

        let mut answer = [0u8; CL1_RESPONSE_LEN as usize];
        for byte in answer.iter_mut() {
            *byte = self.link.read_register(REG_FIFO_DATA);
        }

        let Some(uid) = CardUid::from_cascade_level1(&answer) else {
            debug!(?answer, "check byte mismatch");
            return None;
        };

        if !self.debounce.accept(&uid.card_id(), Instant::now()) {
            trace!(%uid, "repeat read suppressed");
            return None;
        }

        Some(uid)
    }

    /// Detect and read in one step.
    pub async fn poll_card(&mut self) -> Option<CardUid> {
        if !self.detect_card().await {
            return None;
        }
        self.read_identifier().await
    }

    /// Send HLTA. The card does not answer, so nothing is checked.
    pub async fn halt_card(&mut self) {
        self.arm(&[PICC_HLTA, 0x00], FRAMING_FULL);
        sleep(self.timing.halt_settle).await;
        self.link.clear_bits(REG_BIT_FRAMING, START_SEND);
        self.link.command(CMD_IDLE);
    }

    /// Debounce history of this session.
    pub fn debouncer(&self) -> &Debouncer {
        &self.debounce
    }

    /// Switch the antenna off and release the bus.
    ///
    /// Returns the debounce history so the next session can continue it.
    pub fn shutdown(mut self) -> Debouncer {
        self.antenna_off();
        let Self { link, debounce, .. } = self;
        drop(link.into_inner());
        debug!("reader released");
        debounce
    }

    /// One full transceive cycle.
    pub async fn transceive(&mut self, frame: &[u8], framing: u8) -> TransceiveStatus {
        self.arm(frame, framing);
        let status = self.await_irq().await;
        self.link.clear_bits(REG_BIT_FRAMING, START_SEND);
        status
    }

    fn arm(&mut self, frame: &[u8], framing: u8) {
        self.link.write_register(REG_COM_IRQ, IRQ_CLEAR_ALL);
        self.link.command(CMD_IDLE);
        self.link.write_register(REG_FIFO_LEVEL, FIFO_FLUSH);
        for byte in frame {
            self.link.write_register(REG_FIFO_DATA, *byte);
        }
        self.link.write_register(REG_BIT_FRAMING, framing);
        self.link.command(CMD_TRANSCEIVE);
        self.link.set_bits(REG_BIT_FRAMING, START_SEND);
    }

    async fn await_irq(&mut self) -> TransceiveStatus {
        let deadline = Instant::now() + self.timing.irq_timeout;
        loop {
            let irq = self.link.read_register(REG_COM_IRQ);
            if irq & IRQ_RX_IDLE != 0 {
                break;
            }
            if irq & IRQ_TIMER != 0 || Instant::now() >= deadline {
                return TransceiveStatus::Timeout;
            }
            sleep(self.timing.irq_poll).await;
        }

        match self.link.read_register(REG_ERROR) & ERROR_MASK {
            0 => TransceiveStatus::Complete,
            bits => TransceiveStatus::Error(bits),
        }
    }
}
