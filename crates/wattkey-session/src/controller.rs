//! Session Lifecycle Controller.
//!
//! Owns the transitions of the session record:
//!
//! ```text
//!              login request            valid card
//! LoggedOut ───────────────▶ Scanning ─────────────▶ LoggedIn
//!     ▲                          │                       │
//!     │   reader absent          │                       │ logout request
//!     └──────────────────────────┘                       │
//!     └──────────────────────────────────────────────────┘
//! ```
//!
//! A scan opens a fresh reader session, polls until an allowed card shows
//! up, then releases the reader before the session starts. Unknown cards
//! are halted and ignored. Remote store failures never abort a
//! transition: restores fall back to zero and writes are logged and
//! dropped.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use wattkey_core::{CardId, DeviceSlot, Reading};
use wattkey_hardware::{ReaderPort, RelayDriver, Screen, StatusDisplay};
use wattkey_rfid::{CardReader, Debouncer};

use crate::allow_list::AllowList;
use crate::config::TimingConfig;
use crate::state::{SessionSummary, SharedSession};
use crate::store::{RemoteStore, StoreHandle, paths};

/// How a scan unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// An allowed card was read and the session started.
    Authenticated(CardId),
    /// The reader could not be opened or did not answer.
    ReaderUnavailable,
}

/// Answer to a login request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAdmission {
    /// Start a scan.
    Start,
    /// A session is active; the request was discarded.
    AlreadyLoggedIn,
    /// A scan is already running; the request was discarded.
    ScanInProgress,
}

/// Collaborators the controller drives directly.
pub struct ControllerParts<S> {
    pub session: SharedSession,
    pub store: StoreHandle<S>,
    pub display: Arc<dyn StatusDisplay>,
    pub relays: Arc<dyn RelayDriver>,
    pub allow_list: Arc<AllowList>,
}

/// Session lifecycle controller.
pub struct SessionController<S> {
    session: SharedSession,
    store: StoreHandle<S>,
    display: Arc<dyn StatusDisplay>,
    relays: Arc<dyn RelayDriver>,
    allow_list: Arc<AllowList>,
    timing: TimingConfig,
    debounce: Mutex<Debouncer>,
}

impl<S: RemoteStore> SessionController<S> {
    pub fn new(parts: ControllerParts<S>, timing: TimingConfig) -> Self {
        Self {
            session: parts.session,
            store: parts.store,
            display: parts.display,
            relays: parts.relays,
            allow_list: parts.allow_list,
            debounce: Mutex::new(Debouncer::new(timing.debounce())),
            timing,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn store(&self) -> &StoreHandle<S> {
        &self.store
    }

    pub fn display(&self) -> &Arc<dyn StatusDisplay> {
        &self.display
    }

    pub fn relays(&self) -> &Arc<dyn RelayDriver> {
        &self.relays
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Decide what to do with a pending login request and consume it.
    ///
    /// While logged in the request is stale and is cleared remotely as
    /// well. While a scan runs only the local flag is consumed; the scan
    /// clears the remote flag when it finishes.
    pub async fn on_login_request(&self, scan_alive: bool) -> LoginAdmission {
        let logged_in = {
            let mut state = self.session.write().await;
            state.take_login_request();
            state.is_logged_in()
        };

        if logged_in {
            info!("Login request ignored, a session is already active");
            self.store.publish_flag(paths::LOGIN, false).await;
            LoginAdmission::AlreadyLoggedIn
        } else if scan_alive {
            debug!("login request ignored, card scan already running");
            LoginAdmission::ScanInProgress
        } else {
            LoginAdmission::Start
        }
    }

    /// Scan phase: poll the reader until an allowed card is presented, then
    /// authenticate it.
    ///
    /// Runs until it succeeds, the reader is unavailable, or the task is
    /// aborted. Dropping the future releases the reader.
    pub async fn run_scan<P: ReaderPort>(&self, port: &P) -> ScanOutcome {
        info!("Card scan started");

        let (bus, mut reset) = match port.open() {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to open card reader: {}", e);
                self.abort_login().await;
                return ScanOutcome::ReaderUnavailable;
            }
        };

        let debounce = self.debounce.lock().await.clone();
        let mut reader =
            match CardReader::init(bus, &mut reset, self.timing.protocol(), debounce).await {
                Ok(reader) => reader,
                Err(e) => {
                    error!("Card reader initialization failed: {}", e);
                    self.abort_login().await;
                    return ScanOutcome::ReaderUnavailable;
                }
            };

        let identity = loop {
            if let Some(uid) = reader.poll_card().await {
                *self.debounce.lock().await = reader.debouncer().clone();
                let identity = uid.card_id();

                if self.allow_list.contains(identity.as_str()) {
                    info!(card = %identity, "Card accepted");
                    self.display.show(&Screen::Ok);
                    sleep(self.timing.ok_hold()).await;
                    reader.halt_card().await;
                    break identity;
                }

                info!(card = %identity, "Unknown card");
                reader.halt_card().await;
            }
            sleep(self.timing.scan_poll()).await;
        };

        *self.debounce.lock().await = reader.shutdown();
        drop(reset);

        self.authenticate(identity.clone()).await;
        ScanOutcome::Authenticated(identity)
    }

    /// Start a session for an accepted card.
    ///
    /// Restores the card's counters (zero if unavailable), mirrors them and
    /// the relay status to the store, then marks the session active and
    /// clears the login request.
    pub async fn authenticate(&self, identity: CardId) {
        let energy = self.store.restore_user_energy(&identity).await;

        for slot in DeviceSlot::ALL {
            self.store
                .publish_float(&paths::live_energy(slot), energy[slot.index()])
                .await;
        }
        for slot in DeviceSlot::ALL {
            self.store.publish_flag(&paths::relay_status(slot), true).await;
        }

        self.session.write().await.begin_session(identity.clone(), energy);
        self.store.publish_flag(paths::LOGIN, false).await;

        info!(
            card = %identity,
            e1 = energy[0],
            e2 = energy[1],
            "Session started"
        );
    }

    /// End the active session.
    ///
    /// The record is captured and reset in one step, then the counters are
    /// persisted, live values zeroed remotely, relays switched off and the
    /// login prompt shown. Returns what was captured, if a session was
    /// active.
    pub async fn logout(&self) -> Option<SessionSummary> {
        let summary = self.session.write().await.end_session();

        match &summary {
            Some(summary) => {
                info!(
                    card = %summary.identity,
                    e1 = summary.energy[0],
                    e2 = summary.energy[1],
                    "Saving session energy"
                );
                self.store
                    .persist_user_energy(&summary.identity, summary.energy)
                    .await;
            }
            None => debug!("logout without an active session"),
        }

        for slot in DeviceSlot::ALL {
            self.store.publish_float(&paths::live_energy(slot), 0.0).await;
        }
        self.store.publish_telemetry(&[Reading::default(); 2]).await;

        for slot in DeviceSlot::ALL {
            if let Err(e) = self.relays.set(slot, false) {
                warn!("Failed to switch off {} relay: {}", slot, e);
            }
            self.store.publish_flag(&paths::relay_status(slot), false).await;
        }

        self.display.show(&Screen::LoginPrompt);
        self.store.publish_flag(paths::LOGOUT, false).await;

        info!("Session ended");
        summary
    }

    /// Give up on a login: clear the request remotely, then locally.
    async fn abort_login(&self) {
        self.store.publish_flag(paths::LOGIN, false).await;
        self.session.write().await.take_login_request();
        warn!("Login aborted, card reader unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RemoteCommands;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;
    use wattkey_core::Sample;
    use wattkey_hardware::mock::{
        MockDisplay, MockDisplayHandle, MockRc522Handle, MockReaderPort, MockRelays,
    };

    const ALLOWED: [u8; 4] = [0xEE, 0xE0, 0xE8, 0x00];
    const UNKNOWN: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

    struct Fixture {
        controller: Arc<SessionController<MemoryStore>>,
        port: MockReaderPort,
        reader: MockRc522Handle,
        display: MockDisplayHandle,
        relays: Arc<MockRelays>,
    }

    fn fixture(store: MemoryStore) -> Fixture {
        let (port, reader) = MockReaderPort::new();
        let (display, display_handle) = MockDisplay::new();
        let relays = Arc::new(MockRelays::new());

        let parts = ControllerParts {
            session: SharedSession::new(),
            store: StoreHandle::new(store),
            display: Arc::new(display),
            relays: relays.clone(),
            allow_list: Arc::new(AllowList::default()),
        };

        Fixture {
            controller: Arc::new(SessionController::new(parts, TimingConfig::default())),
            port,
            reader,
            display: display_handle,
            relays,
        }
    }

    async fn request_login(controller: &SessionController<MemoryStore>) {
        controller.store().lock().await.set_flag(paths::LOGIN, true).await.unwrap();
        controller.session().write().await.apply_remote(&RemoteCommands {
            login: Some(true),
            online: true,
            ..Default::default()
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_authenticates_allowed_card() {
        let mut fx = fixture(MemoryStore::with_document(json!({
            "User": {"EE:E0:E8:00": {"E1": 1.5, "E2": 0.5}}
        })));
        request_login(&fx.controller).await;
        fx.reader.present_card(&ALLOWED);

        let outcome = fx.controller.run_scan(&fx.port).await;
        assert_eq!(
            outcome,
            ScanOutcome::Authenticated(CardId::new("EE:E0:E8:00").unwrap())
        );

        let state = fx.controller.session().snapshot().await;
        assert!(state.is_logged_in());
        assert_eq!(state.energy(), [1.5, 0.5]);
        assert_eq!(state.relay_states(), [true, true]);
        assert!(!state.login_requested());

        let store = fx.controller.store().lock().await;
        assert_eq!(store.value("login"), Some(&json!(false)));
        assert_eq!(store.value("dev1/E"), Some(&json!(1.5)));
        assert_eq!(store.value("dev2/Status"), Some(&json!(true)));

        assert_eq!(fx.display.current(), Some(Screen::Ok));
        assert!(fx.reader.is_card_halted());
        assert!(!fx.reader.antenna_enabled());
        assert_eq!(fx.reader.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_skips_unknown_card() {
        let fx = fixture(MemoryStore::new());
        request_login(&fx.controller).await;
        fx.reader.present_card(&UNKNOWN);

        let controller = fx.controller.clone();
        let port = fx.port.clone();
        let scan = tokio::spawn(async move { controller.run_scan(&port).await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fx.reader.is_card_halted());
        assert!(!fx.controller.session().snapshot().await.is_logged_in());

        fx.reader.present_card(&ALLOWED);
        let outcome = scan.await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Authenticated(_)));
    }

    #[rstest::rstest]
    #[case(0xFF)]
    #[case(0x00)]
    #[tokio::test(start_paused = true)]
    async fn test_scan_aborts_when_reader_absent(#[case] version: u8) {
        let fx = fixture(MemoryStore::new());
        request_login(&fx.controller).await;
        fx.reader.set_version(version);

        let outcome = fx.controller.run_scan(&fx.port).await;
        assert_eq!(outcome, ScanOutcome::ReaderUnavailable);

        let state = fx.controller.session().snapshot().await;
        assert!(!state.is_logged_in());
        assert!(!state.login_requested());
        assert_eq!(
            fx.controller.store().lock().await.value("login"),
            Some(&json!(false))
        );
        assert_eq!(fx.reader.open_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_aborts_when_bus_unavailable() {
        let fx = fixture(MemoryStore::new());
        fx.reader.set_bus_failure(true);

        assert_eq!(
            fx.controller.run_scan(&fx.port).await,
            ScanOutcome::ReaderUnavailable
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_failure_starts_at_zero() {
        let fx = fixture(MemoryStore::with_document(json!({
            "User": {"EE:E0:E8:00": {"E1": 4.0}}
        })));

        fx.controller
            .authenticate(CardId::new("EE:E0:E8:00").unwrap())
            .await;

        assert_eq!(fx.controller.session().snapshot().await.energy(), [0.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_resets_and_persists() {
        let mut fx = fixture(MemoryStore::new());
        fx.controller
            .authenticate(CardId::new("0A:4E:17:05").unwrap())
            .await;
        {
            let mut state = fx.controller.session().write().await;
            let load = Sample {
                current: 2.0,
                voltage: 230.0,
                power: 460.0,
                energy_delta: 12.5,
            };
            state.record_sample(DeviceSlot::One, &load);
            state.record_sample(DeviceSlot::Two, &load);
        }
        fx.relays.set(DeviceSlot::One, true).unwrap();

        let summary = fx.controller.logout().await.unwrap();
        assert_eq!(summary.energy, [12.5, 12.5]);

        let state = fx.controller.session().snapshot().await;
        assert!(!state.is_logged_in());
        assert!(state.current_identity().is_none());
        assert_eq!(state.energy(), [0.0, 0.0]);
        assert_eq!(state.relay_states(), [false, false]);
        assert!(!fx.relays.is_on(DeviceSlot::One));

        let store = fx.controller.store().lock().await;
        assert_eq!(store.value("User/0A:4E:17:05/E1"), Some(&json!(12.5)));
        assert_eq!(store.value("User/0A:4E:17:05/E"), Some(&json!(25.0)));
        assert_eq!(store.value("dev1/E"), Some(&json!(0.0)));
        assert_eq!(store.value("dev1/P"), Some(&json!(0.0)));
        assert_eq!(store.value("dev2/Status"), Some(&json!(false)));
        assert_eq!(store.value("logout"), Some(&json!(false)));
        drop(store);

        assert_eq!(fx.display.current(), Some(Screen::LoginPrompt));
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_with_store_offline() {
        let fx = fixture(MemoryStore::new());
        fx.controller
            .authenticate(CardId::new("0A:4E:17:05").unwrap())
            .await;
        fx.controller.store().lock().await.set_online(false);

        assert!(fx.controller.logout().await.is_some());
        let state = fx.controller.session().snapshot().await;
        assert!(!state.is_logged_in());
        assert!(state.current_identity().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_request_while_logged_in() {
        let fx = fixture(MemoryStore::new());
        fx.controller
            .authenticate(CardId::new("0A:4E:17:05").unwrap())
            .await;
        fx.controller
            .store()
            .lock()
            .await
            .set_flag(paths::LOGIN, true)
            .await
            .unwrap();

        let before = fx.controller.session().snapshot().await;
        let admission = fx.controller.on_login_request(false).await;
        let after = fx.controller.session().snapshot().await;

        assert_eq!(admission, LoginAdmission::AlreadyLoggedIn);
        assert_eq!(before, after);
        assert_eq!(
            fx.controller.store().lock().await.value("login"),
            Some(&json!(false))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_request_while_scanning() {
        let fx = fixture(MemoryStore::new());
        request_login(&fx.controller).await;

        let admission = fx.controller.on_login_request(true).await;
        assert_eq!(admission, LoginAdmission::ScanInProgress);
        assert!(!fx.controller.session().snapshot().await.login_requested());
        // The running scan still owns the remote flag
        assert_eq!(
            fx.controller.store().lock().await.value("login"),
            Some(&json!(true))
        );

        request_login(&fx.controller).await;
        assert_eq!(
            fx.controller.on_login_request(false).await,
            LoginAdmission::Start
        );
    }
}
