use crate::{
    Result,
    constants::{CARD_ID_SEPARATOR, DEVICE_SLOT_COUNT, UID_LENGTHS},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card identifier in its external form (`EE:E0:E8:00`).
///
/// The identifier is normalized to upper case on construction, so two
/// identifiers that differ only in letter case compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardId(String);

impl CardId {
    /// Parse and normalize a colon-separated hex identifier.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardId` if any group is not exactly two hex
    /// digits, or `Error::InvalidUidLength` if the byte count is not 4, 7 or 10.
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_uppercase();

        let groups: Vec<&str> = normalized.split(CARD_ID_SEPARATOR).collect();
        for group in &groups {
            if group.len() != 2 || !group.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(Error::InvalidCardId(raw.to_string()));
            }
        }

        if !UID_LENGTHS.contains(&groups.len()) {
            return Err(Error::InvalidUidLength(groups.len()));
        }

        Ok(CardId(normalized))
    }

    /// Build the external form from raw UID bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidUidLength` if the byte count is not 4, 7 or 10.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if !UID_LENGTHS.contains(&bytes.len()) {
            return Err(Error::InvalidUidLength(bytes.len()));
        }

        let formatted = bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(&CARD_ID_SEPARATOR.to_string());

        Ok(CardId(formatted))
    }

    /// Raw UID bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0
            .split(CARD_ID_SEPARATOR)
            .filter_map(|group| u8::from_str_radix(group, 16).ok())
            .collect()
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against an unparsed identifier.
    #[must_use]
    pub fn matches(&self, raw: &str) -> bool {
        self.0.eq_ignore_ascii_case(raw.trim())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardId::new(s)
    }
}

impl TryFrom<String> for CardId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        CardId::new(&value)
    }
}

impl From<CardId> for String {
    fn from(id: CardId) -> Self {
        id.0
    }
}

/// One of the two metered, relay-switched outlets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSlot {
    One,
    Two,
}

impl DeviceSlot {
    /// Both slots, in index order.
    pub const ALL: [DeviceSlot; DEVICE_SLOT_COUNT] = [DeviceSlot::One, DeviceSlot::Two];

    /// Zero-based index into per-slot arrays.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            DeviceSlot::One => 0,
            DeviceSlot::Two => 1,
        }
    }

    /// Key used for this slot in the remote store (`dev1`, `dev2`).
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            DeviceSlot::One => "dev1",
            DeviceSlot::Two => "dev2",
        }
    }
}

impl fmt::Display for DeviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Latest measurement snapshot for one device slot.
///
/// `energy` is the accumulated session energy in Wh; the other fields are
/// instantaneous RMS values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    pub current: f64,
    pub voltage: f64,
    pub power: f64,
    pub energy: f64,
}

impl Reading {
    /// A reading that starts a session from previously accumulated energy.
    #[must_use]
    pub fn with_energy(energy: f64) -> Self {
        Self {
            energy,
            ..Self::default()
        }
    }

    /// Zero the instantaneous values, keeping accumulated energy.
    pub fn clear_instant(&mut self) {
        self.current = 0.0;
        self.voltage = 0.0;
        self.power = 0.0;
    }

    /// Fold a fresh sample into this reading.
    ///
    /// Negative energy deltas are ignored so the counter never decreases.
    pub fn apply(&mut self, sample: &Sample) {
        self.current = sample.current;
        self.voltage = sample.voltage;
        self.power = sample.power;
        if sample.energy_delta.is_finite() && sample.energy_delta > 0.0 {
            self.energy += sample.energy_delta;
        }
    }
}

/// One measurement pass from the metering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sample {
    pub current: f64,
    pub voltage: f64,
    pub power: f64,
    pub energy_delta: f64,
}
