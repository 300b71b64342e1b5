//! Repeat-read suppression.
//!
//! A card resting on the reader answers every poll. Without a filter one
//! tap would be seen as a burst of identical reads.

use std::time::Duration;

use tokio::time::Instant;
use wattkey_core::CardId;

/// Suppresses a read of the same identifier inside `window` of the last
/// accepted read.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tokio::time::Instant;
/// use wattkey_core::CardId;
/// use wattkey_rfid::Debouncer;
///
/// let mut debounce = Debouncer::new(Duration::from_secs(2));
/// let id = CardId::new("EE:E0:E8:00").unwrap();
/// let now = Instant::now();
///
/// assert!(debounce.accept(&id, now));
/// assert!(!debounce.accept(&id, now + Duration::from_millis(500)));
/// assert!(debounce.accept(&id, now + Duration::from_secs(3)));
/// ```
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<(CardId, Instant)>,
}

impl Debouncer {
    /// Filter with the given window and no history.
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Decide whether a read of `id` at `now` is a new event.
    ///
    /// Only accepted reads are remembered, so a card held on the reader is
    /// accepted again once the window has passed since its last acceptance.
    pub fn accept(&mut self, id: &CardId, now: Instant) -> bool {
        if let Some((last_id, seen_at)) = &self.last
            && last_id == id
            && now.saturating_duration_since(*seen_at) < self.window
        {
            return false;
        }
        self.last = Some((id.clone(), now));
        true
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> CardId {
        CardId::new(raw).unwrap()
    }

    #[test]
    fn test_same_card_inside_window_suppressed() {
        let mut debounce = Debouncer::new(Duration::from_millis(2000));
        let t0 = Instant::now();

        assert!(debounce.accept(&id("EE:E0:E8:00"), t0));
        assert!(!debounce.accept(&id("ee:e0:e8:00"), t0 + Duration::from_millis(1999)));
    }

    #[test]
    fn test_same_card_after_window_accepted() {
        let mut debounce = Debouncer::new(Duration::from_millis(2000));
        let t0 = Instant::now();

        assert!(debounce.accept(&id("EE:E0:E8:00"), t0));
        assert!(debounce.accept(&id("EE:E0:E8:00"), t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn test_suppressed_read_does_not_extend_window() {
        let mut debounce = Debouncer::new(Duration::from_millis(2000));
        let t0 = Instant::now();

        assert!(debounce.accept(&id("EE:E0:E8:00"), t0));
        assert!(!debounce.accept(&id("EE:E0:E8:00"), t0 + Duration::from_millis(1500)));
        assert!(debounce.accept(&id("EE:E0:E8:00"), t0 + Duration::from_millis(2100)));
    }

    #[test]
    fn test_different_card_accepted_immediately() {
        let mut debounce = Debouncer::new(Duration::from_millis(2000));
        let t0 = Instant::now();

        assert!(debounce.accept(&id("EE:E0:E8:00"), t0));
        assert!(debounce.accept(&id("0A:4E:17:05"), t0 + Duration::from_millis(10)));
    }
}
