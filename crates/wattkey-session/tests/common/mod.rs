//! Shared rig for coordinator integration tests.
//!
//! Builds a coordinator over the simulated MFRC522, an in-memory store,
//! a recording display, mock relays and a fixed-load meter, and offers a
//! few helpers to drive the remote flags the way the cloud side would.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use wattkey_core::Sample;
use wattkey_hardware::mock::{
    MockDisplay, MockDisplayHandle, MockMeter, MockRc522Handle, MockReaderPort, MockRelays,
};
use wattkey_session::{
    AllowList, Coordinator, CoordinatorHandle, MemoryStore, Peripherals, RemoteStore,
    SessionState, TimingConfig,
};

pub const CARD_A: [u8; 4] = [0xEE, 0xE0, 0xE8, 0x00];
pub const CARD_B: [u8; 4] = [0x0A, 0x4E, 0x17, 0x05];
pub const CARD_UNKNOWN: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Constant load drawn on each slot.
pub const LOAD: Sample = Sample {
    current: 1.2,
    voltage: 230.0,
    power: 276.0,
    energy_delta: 0.01,
};

/// Long enough for a poll, a scan bring-up and the OK hold.
pub const LOGIN_SETTLE: Duration = Duration::from_secs(4);

/// Long enough for a poll and one control tick.
pub const POLL_SETTLE: Duration = Duration::from_millis(1200);

pub struct Rig {
    pub handle: CoordinatorHandle<MemoryStore>,
    pub card: MockRc522Handle,
    pub screens: MockDisplayHandle,
    pub relays: Arc<MockRelays>,
    pub meter: Arc<MockMeter>,
}

pub fn start(store: MemoryStore) -> Rig {
    let (reader, card) = MockReaderPort::new();
    let (display, screens) = MockDisplay::new();
    let relays = Arc::new(MockRelays::new());
    let meter = Arc::new(MockMeter::new([LOAD, LOAD]));

    let peripherals = Peripherals {
        reader,
        meter: meter.clone(),
        relays: relays.clone(),
        display: Arc::new(display),
    };

    let handle = Coordinator::new(
        TimingConfig::default(),
        AllowList::default(),
        store,
        peripherals,
    )
    .start();

    Rig {
        handle,
        card,
        screens,
        relays,
        meter,
    }
}

pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}

impl Rig {
    pub async fn set_flag(&self, path: &str, value: bool) {
        self.handle
            .store()
            .lock()
            .await
            .set_flag(path, value)
            .await
            .expect("memory store write");
    }

    pub async fn value(&self, path: &str) -> Option<Value> {
        self.handle.store().lock().await.value(path).cloned()
    }

    pub async fn float(&self, path: &str) -> f64 {
        self.value(path)
            .await
            .and_then(|v| v.as_f64())
            .unwrap_or_else(|| panic!("no number at {path}"))
    }

    pub async fn state(&self) -> SessionState {
        self.handle.session().snapshot().await
    }

    /// Raise `login`, present `uid` and wait for the scan to finish.
    pub async fn login_with(&self, uid: &[u8]) {
        self.card.present_card(uid);
        self.set_flag("login", true).await;
        settle(LOGIN_SETTLE).await;
    }

    /// Raise `logout` and wait for it to be handled.
    pub async fn logout(&self) {
        self.set_flag("logout", true).await;
        settle(POLL_SETTLE).await;
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await;
    }
}
