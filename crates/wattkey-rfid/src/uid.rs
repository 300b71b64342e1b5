//! Card UID as read from the field.

use std::fmt;

use wattkey_core::{CardId, constants::UID_LENGTHS};

/// Longest UID (triple cascade).
pub const MAX_UID_LEN: usize = 10;

/// UID bytes of one card, plus the select acknowledge when one was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardUid {
    bytes: [u8; MAX_UID_LEN],
    len: u8,
    sak: Option<u8>,
}

impl CardUid {
    /// Build a UID from raw bytes.
    ///
    /// Returns `None` unless the length is 4, 7 or 10.
    pub fn new(uid: &[u8], sak: Option<u8>) -> Option<Self> {
        if !UID_LENGTHS.contains(&uid.len()) {
            return None;
        }
        let mut bytes = [0u8; MAX_UID_LEN];
        bytes[..uid.len()].copy_from_slice(uid);
        Some(Self {
            bytes,
            len: uid.len() as u8,
            sak,
        })
    }

    /// Decode a cascade level 1 anticollision answer (4 UID bytes + BCC).
    ///
    /// Returns `None` when the check byte does not match.
    ///
    /// # Examples
    ///
    /// ```
    /// use wattkey_rfid::CardUid;
    ///
    /// let uid = CardUid::from_cascade_level1(&[0xEE, 0xE0, 0xE8, 0x00, 0xE6]).unwrap();
    /// assert_eq!(uid.to_string(), "EE:E0:E8:00");
    ///
    /// assert!(CardUid::from_cascade_level1(&[0xEE, 0xE0, 0xE8, 0x00, 0x00]).is_none());
    /// ```
    pub fn from_cascade_level1(answer: &[u8; 5]) -> Option<Self> {
        let (uid, bcc) = answer.split_at(4);
        let expected = uid.iter().fold(0u8, |acc, b| acc ^ b);
        if expected != bcc[0] {
            return None;
        }
        Self::new(uid, None)
    }

    /// UID bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Select acknowledge, if the card was selected.
    pub fn sak(&self) -> Option<u8> {
        self.sak
    }

    /// External identifier form.
    pub fn card_id(&self) -> CardId {
        // Length is validated on construction
        match CardId::from_bytes(self.as_bytes()) {
            Ok(id) => id,
            Err(_) => unreachable!("CardUid holds 4, 7 or 10 bytes"),
        }
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_lengths() {
        assert!(CardUid::new(&[1, 2, 3, 4], None).is_some());
        assert!(CardUid::new(&[1, 2, 3, 4, 5, 6, 7], Some(0x08)).is_some());
        assert!(CardUid::new(&[0; 10], None).is_some());
        assert!(CardUid::new(&[1, 2, 3], None).is_none());
        assert!(CardUid::new(&[0; 11], None).is_none());
    }

    #[test]
    fn test_display_matches_card_id() {
        let uid = CardUid::new(&[0x0A, 0x4E, 0x17, 0x05], Some(0x08)).unwrap();
        assert_eq!(uid.to_string(), "0A:4E:17:05");
        assert_eq!(uid.card_id().as_str(), "0A:4E:17:05");
        assert_eq!(uid.sak(), Some(0x08));
    }

    #[test]
    fn test_cascade_level1_bcc() {
        let answer = [0x0A, 0x4E, 0x17, 0x05, 0x0A ^ 0x4E ^ 0x17 ^ 0x05];
        let uid = CardUid::from_cascade_level1(&answer).unwrap();
        assert_eq!(uid.as_bytes(), &[0x0A, 0x4E, 0x17, 0x05]);
        assert_eq!(uid.sak(), None);
    }
}
