//! MFRC522 register map, command set and ISO 14443A card commands.
//!
//! Register addresses are the 6-bit values from the datasheet; the link
//! layer shifts them into the SPI address byte.

// ============================================================================
// Reader Commands (CommandReg)
// ============================================================================

pub const CMD_IDLE: u8 = 0x00;
pub const CMD_TRANSCEIVE: u8 = 0x0C;
pub const CMD_SOFT_RESET: u8 = 0x0F;

// ============================================================================
// Registers
// ============================================================================

pub const REG_COMMAND: u8 = 0x01;
pub const REG_COM_IRQ: u8 = 0x04;
pub const REG_ERROR: u8 = 0x06;
pub const REG_FIFO_DATA: u8 = 0x09;
pub const REG_FIFO_LEVEL: u8 = 0x0A;
pub const REG_BIT_FRAMING: u8 = 0x0D;
pub const REG_MODE: u8 = 0x11;
pub const REG_TX_CONTROL: u8 = 0x14;
pub const REG_TX_ASK: u8 = 0x15;
pub const REG_T_MODE: u8 = 0x2A;
pub const REG_T_PRESCALER: u8 = 0x2B;
pub const REG_T_RELOAD_H: u8 = 0x2C;
pub const REG_T_RELOAD_L: u8 = 0x2D;
pub const REG_VERSION: u8 = 0x37;

// ============================================================================
// Bit Masks
// ============================================================================

/// ComIrqReg write value that clears every interrupt request bit.
pub const IRQ_CLEAR_ALL: u8 = 0x7F;

/// RxIRq | IdleIRq: a frame was received and the command finished.
pub const IRQ_RX_IDLE: u8 = 0x30;

/// TimerIRq: the reader's timeout timer expired.
pub const IRQ_TIMER: u8 = 0x01;

/// BufferOvfl | ParityErr | ProtocolErr in ErrorReg.
pub const ERROR_MASK: u8 = 0x13;

/// FlushBuffer bit of FIFOLevelReg.
pub const FIFO_FLUSH: u8 = 0x80;

/// StartSend bit of BitFramingReg.
pub const START_SEND: u8 = 0x80;

/// Tx1RFEn | Tx2RFEn in TxControlReg.
pub const ANTENNA_BITS: u8 = 0x03;

/// Top bit of the SPI address byte selects a read.
pub const ADDRESS_READ_FLAG: u8 = 0x80;

/// Bits 6:1 of the SPI address byte carry the register address.
pub const ADDRESS_MASK: u8 = 0x7E;

// ============================================================================
// Timer and Modulation Setup
// ============================================================================

/// TAuto, prescaler high bits.
pub const T_MODE_VALUE: u8 = 0x8D;
pub const T_PRESCALER_VALUE: u8 = 0x3E;
pub const T_RELOAD_L_VALUE: u8 = 30;
pub const T_RELOAD_H_VALUE: u8 = 0;

/// Force 100% ASK modulation.
pub const TX_ASK_VALUE: u8 = 0x40;

/// CRC preset 0x6363.
pub const MODE_VALUE: u8 = 0x3D;

/// Version byte values that mean nothing answered on the bus.
pub const VERSION_ABSENT: [u8; 2] = [0x00, 0xFF];

// ============================================================================
// ISO 14443A Card Commands
// ============================================================================

pub const PICC_REQA: u8 = 0x26;
pub const PICC_SEL_CL1: u8 = 0x93;
pub const PICC_HLTA: u8 = 0x50;

/// NVB for an anticollision frame with no known UID bits.
pub const PICC_NVB_ANTICOLLISION: u8 = 0x20;

/// REQA is a short frame: 7 valid bits in the last byte.
pub const FRAMING_SHORT: u8 = 0x07;

/// Standard frames end on a byte boundary.
pub const FRAMING_FULL: u8 = 0x00;

/// Cascade level 1 answer: four UID bytes followed by the check byte.
pub const CL1_RESPONSE_LEN: u8 = 5;
