//! Common types shared across hardware collaborators.

use serde::{Deserialize, Serialize};
use wattkey_core::{DeviceSlot, Reading};

/// Screens the status display knows how to draw.
///
/// Rendering (fonts, layout, framebuffer) belongs to the display
/// implementation; callers only pick which screen is current.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Screen {
    /// Remote store unreachable; ask the operator to check connectivity.
    ConnectNetwork,

    /// Idle, waiting for a login request.
    LoginPrompt,

    /// A valid card was accepted.
    Ok,

    /// Live measurements for both device slots.
    Layout([Reading; 2]),
}

impl Screen {
    /// Build the measurement layout from per-slot readings.
    pub fn layout(dev1: Reading, dev2: Reading) -> Self {
        Self::Layout([dev1, dev2])
    }

    /// Reading shown for a slot, if this is the measurement layout.
    pub fn reading(&self, slot: DeviceSlot) -> Option<&Reading> {
        match self {
            Self::Layout(readings) => readings.get(slot.index()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_reading_lookup() {
        let screen = Screen::layout(Reading::with_energy(1.0), Reading::with_energy(2.0));
        assert_eq!(screen.reading(DeviceSlot::Two).unwrap().energy, 2.0);
        assert_eq!(Screen::Ok.reading(DeviceSlot::One), None);
    }

    #[test]
    fn test_screen_serialization() {
        let screen = Screen::LoginPrompt;
        let json = serde_json::to_string(&screen).unwrap();
        let deserialized: Screen = serde_json::from_str(&json).unwrap();
        assert_eq!(screen, deserialized);
    }
}
