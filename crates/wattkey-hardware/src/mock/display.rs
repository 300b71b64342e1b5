//! Mock status display that records every screen it is asked to draw.

use tokio::sync::mpsc;

use crate::{traits::StatusDisplay, types::Screen};

/// Mock display for testing and development.
///
/// # Examples
///
/// ```
/// use wattkey_hardware::mock::MockDisplay;
/// use wattkey_hardware::traits::StatusDisplay;
/// use wattkey_hardware::types::Screen;
///
/// let (display, mut handle) = MockDisplay::new();
/// display.show(&Screen::LoginPrompt);
/// display.show(&Screen::Ok);
///
/// assert_eq!(handle.drain(), vec![Screen::LoginPrompt, Screen::Ok]);
/// ```
#[derive(Debug)]
pub struct MockDisplay {
    screen_tx: mpsc::UnboundedSender<Screen>,
}

impl MockDisplay {
    /// Create a display and the handle that observes it.
    pub fn new() -> (Self, MockDisplayHandle) {
        let (screen_tx, screen_rx) = mpsc::unbounded_channel();
        (
            Self { screen_tx },
            MockDisplayHandle {
                screen_rx,
                history: Vec::new(),
            },
        )
    }
}

impl StatusDisplay for MockDisplay {
    fn show(&self, screen: &Screen) {
        // Handle may be gone when the display is used without observation
        let _ = self.screen_tx.send(screen.clone());
    }
}

/// Observer side of [`MockDisplay`].
#[derive(Debug)]
pub struct MockDisplayHandle {
    screen_rx: mpsc::UnboundedReceiver<Screen>,
    history: Vec<Screen>,
}

impl MockDisplayHandle {
    /// Return screens drawn since the last drain, oldest first.
    pub fn drain(&mut self) -> Vec<Screen> {
        let mut drained = Vec::new();
        while let Ok(screen) = self.screen_rx.try_recv() {
            drained.push(screen);
        }
        self.history.extend(drained.iter().cloned());
        drained
    }

    /// Every screen drawn so far, oldest first.
    pub fn history(&mut self) -> &[Screen] {
        self.drain();
        &self.history
    }

    /// Most recently drawn screen.
    pub fn current(&mut self) -> Option<Screen> {
        self.drain();
        self.history.last().cloned()
    }
}
