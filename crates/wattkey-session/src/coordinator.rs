//! Task Coordinator.
//!
//! Runs the controller's collaborators as independent tokio tasks that
//! share only the session record, the locked store and one wake signal:
//!
//! ```text
//!                 ┌──────────────┐  spawn   ┌───────────┐
//!                 │ Control loop │─────────▶│ Scan unit │ (at most one)
//!                 └──────┬───────┘          └─────┬─────┘
//!        notify          │ read/write             │ authenticate
//!   ┌────────────────────┤                        ▼
//!   ▼                    ▼                 ┌──────────────┐
//! ┌───────────┐    ┌──────────────┐        │ StoreHandle  │
//! │ Telemetry │───▶│ SharedSession│◀───────│ (one lock)   │
//! │ pusher    │    └──────────────┘        └──────────────┘
//! └───────────┘           ▲                        ▲
//!                         └───── Command poller ───┘
//! ```
//!
//! The control loop, pusher and poller live in a [`JoinSet`] owned by the
//! [`CoordinatorHandle`]. The scan unit is owned by the control loop's
//! scan slot, so aborting the loop also aborts any scan in flight and
//! releases the reader.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};
use wattkey_core::DeviceSlot;
use wattkey_hardware::{PowerMeter, ReaderPort, RelayDriver, Screen, StatusDisplay};

use crate::allow_list::AllowList;
use crate::config::TimingConfig;
use crate::controller::{ControllerParts, LoginAdmission, ScanOutcome, SessionController};
use crate::state::{RemoteCommands, SharedSession};
use crate::store::{
    RemoteStore, StoreError, StoreHandle, log_failure, paths, push_telemetry, store_user_energy,
};

/// Board peripherals handed to the coordinator.
pub struct Peripherals<P, M> {
    pub reader: P,
    pub meter: Arc<M>,
    pub relays: Arc<dyn RelayDriver>,
    pub display: Arc<dyn StatusDisplay>,
}

/// Wires the controller to its tasks.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use wattkey_hardware::mock::{MockDisplay, MockMeter, MockReaderPort, MockRelays};
/// use wattkey_session::{AllowList, Coordinator, MemoryStore, Peripherals, TimingConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let (reader, _card) = MockReaderPort::new();
///     let (display, _screens) = MockDisplay::new();
///     let peripherals = Peripherals {
///         reader,
///         meter: Arc::new(MockMeter::default()),
///         relays: Arc::new(MockRelays::new()),
///         display: Arc::new(display),
///     };
///
///     let coordinator = Coordinator::new(
///         TimingConfig::default(),
///         AllowList::default(),
///         MemoryStore::new(),
///         peripherals,
///     );
///     let handle = coordinator.start();
///
///     // ... raise `login` in the store and present a card ...
///
///     handle.shutdown().await;
/// }
/// ```
pub struct Coordinator<S, P, M> {
    controller: Arc<SessionController<S>>,
    port: Arc<P>,
    meter: Arc<M>,
}

impl<S, P, M> Coordinator<S, P, M>
where
    S: RemoteStore,
    P: ReaderPort,
    M: PowerMeter,
{
    pub fn new(
        timing: TimingConfig,
        allow_list: AllowList,
        store: S,
        peripherals: Peripherals<P, M>,
    ) -> Self {
        let parts = ControllerParts {
            session: SharedSession::new(),
            store: StoreHandle::new(store),
            display: peripherals.display,
            relays: peripherals.relays,
            allow_list: Arc::new(allow_list),
        };

        Self {
            controller: Arc::new(SessionController::new(parts, timing)),
            port: Arc::new(peripherals.reader),
            meter: peripherals.meter,
        }
    }

    pub fn session(&self) -> SharedSession {
        self.controller.session().clone()
    }

    pub fn store(&self) -> StoreHandle<S> {
        self.controller.store().clone()
    }

    pub fn controller(&self) -> Arc<SessionController<S>> {
        Arc::clone(&self.controller)
    }

    /// Spawn the control loop, telemetry pusher and command poller.
    pub fn start(self) -> CoordinatorHandle<S> {
        let notify = Arc::new(Notify::new());
        let session = self.session();
        let store = self.store();
        let timing = *self.controller.timing();

        let mut tasks = JoinSet::new();

        tasks.spawn(
            ControlLoop {
                controller: Arc::clone(&self.controller),
                port: self.port,
                meter: self.meter,
                notify: Arc::clone(&notify),
            }
            .run(),
        );

        tasks.spawn(
            TelemetryPusher {
                session: session.clone(),
                store: store.clone(),
                notify,
                timing,
            }
            .run(),
        );

        tasks.spawn(
            CommandPoller {
                session: session.clone(),
                store: store.clone(),
                timing,
            }
            .run(),
        );

        info!("Coordinator started with {} tasks", tasks.len());
        CoordinatorHandle {
            tasks,
            session,
            store,
        }
    }
}

/// Running coordinator.
pub struct CoordinatorHandle<S> {
    tasks: JoinSet<()>,
    session: SharedSession,
    store: StoreHandle<S>,
}

impl<S: RemoteStore> CoordinatorHandle<S> {
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn store(&self) -> &StoreHandle<S> {
        &self.store
    }

    /// Abort every task, including a scan in progress, and wait for them.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();

        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!("Coordinator task failed: {}", e),
            }
        }

        info!("Coordinator stopped");
    }
}

// ----------------------------------------------------------------------------
// Scan slot
// ----------------------------------------------------------------------------

/// Liveness guard for the scan unit. Dropping the slot aborts the scan.
#[derive(Debug, Default)]
struct ScanSlot {
    handle: Option<JoinHandle<ScanOutcome>>,
}

impl ScanSlot {
    fn is_alive(&mut self) -> bool {
        if self.handle.as_ref().is_some_and(JoinHandle::is_finished) {
            self.handle = None;
        }
        self.handle.is_some()
    }

    fn start(&mut self, handle: JoinHandle<ScanOutcome>) {
        self.handle = Some(handle);
    }
}

impl Drop for ScanSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// ----------------------------------------------------------------------------
// Control loop
// ----------------------------------------------------------------------------

const RELAYS_OFF: [bool; 2] = [false; 2];

struct ControlLoop<S, P, M> {
    controller: Arc<SessionController<S>>,
    port: Arc<P>,
    meter: Arc<M>,
    notify: Arc<Notify>,
}

impl<S, P, M> ControlLoop<S, P, M>
where
    S: RemoteStore,
    P: ReaderPort,
    M: PowerMeter,
{
    async fn run(self) {
        let timing = *self.controller.timing();
        let mut ticker = interval(timing.control_tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut scan = ScanSlot::default();
        let mut idle_screen: Option<Screen> = None;
        let mut applied_relays: Option<[bool; 2]> = None;

        loop {
            ticker.tick().await;
            let state = self.controller.session().snapshot().await;

            if !state.is_logged_in() {
                // Retried every tick until both outputs are confirmed off
                if applied_relays != Some(RELAYS_OFF) {
                    applied_relays = self.drive_relays(RELAYS_OFF).then_some(RELAYS_OFF);
                }

                if state.login_requested() {
                    let admission = self.controller.on_login_request(scan.is_alive()).await;
                    if admission == LoginAdmission::Start {
                        scan.start(self.spawn_scan());
                    }
                } else if !scan.is_alive() {
                    let screen = if state.remote_online() {
                        Screen::LoginPrompt
                    } else {
                        Screen::ConnectNetwork
                    };
                    if idle_screen.as_ref() != Some(&screen) {
                        self.controller.display().show(&screen);
                        idle_screen = Some(screen);
                    }
                }
                continue;
            }

            idle_screen = None;

            let relays = state.relay_states();
            if applied_relays != Some(relays) {
                applied_relays = self.drive_relays(relays).then_some(relays);
            }

            let now = Instant::now();
            if state.measurement_due(now, timing.measure_interval()) {
                self.measure(relays, now).await;
            }

            if state.logout_requested() {
                self.controller.logout().await;
                idle_screen = Some(Screen::LoginPrompt);
            }
        }
    }

    fn spawn_scan(&self) -> JoinHandle<ScanOutcome> {
        let controller = Arc::clone(&self.controller);
        let port = Arc::clone(&self.port);
        tokio::spawn(async move { controller.run_scan(&*port).await })
    }

    /// Drive both outputs; `true` only if every output took its level.
    fn drive_relays(&self, relays: [bool; 2]) -> bool {
        let mut driven = true;
        for slot in DeviceSlot::ALL {
            let on = relays[slot.index()];
            match self.controller.relays().set(slot, on) {
                Ok(()) => debug!(%slot, on, "relay driven"),
                Err(e) => {
                    warn!("Failed to drive {} relay: {}", slot, e);
                    driven = false;
                }
            }
        }
        driven
    }

    /// Sample enabled slots, fold the results in, redraw and wake the pusher.
    async fn measure(&self, relays: [bool; 2], now: Instant) {
        let mut samples = [None, None];
        for slot in DeviceSlot::ALL {
            if !relays[slot.index()] {
                continue;
            }
            match self.meter.sample(slot).await {
                Ok(sample) => samples[slot.index()] = Some(sample),
                Err(e) => warn!("Measurement for {} failed: {}", slot, e),
            }
        }

        let readings = {
            let mut state = self.controller.session().write().await;
            state.mark_measured(now);
            for slot in DeviceSlot::ALL {
                match &samples[slot.index()] {
                    Some(sample) => {
                        state.record_sample(slot, sample);
                    }
                    // Disabled, or the meter failed: no live values to show
                    None => state.clear_instant(slot),
                }
            }
            state.readings()
        };

        self.controller
            .display()
            .show(&Screen::layout(readings[0], readings[1]));
        self.notify.notify_one();
    }
}

// ----------------------------------------------------------------------------
// Telemetry pusher
// ----------------------------------------------------------------------------

struct TelemetryPusher<S> {
    session: SharedSession,
    store: StoreHandle<S>,
    notify: Arc<Notify>,
    timing: TimingConfig,
}

impl<S: RemoteStore> TelemetryPusher<S> {
    async fn run(self) {
        let mut last_persist: Option<Instant> = None;

        loop {
            self.notify.notified().await;

            // Snapshot under the store lock so a logout that lands meanwhile
            // writes after this push, never before it.
            let mut store = self.store.lock().await;
            let state = self.session.snapshot().await;
            if !state.is_logged_in() {
                continue;
            }

            log_failure("telemetry", push_telemetry(&mut *store, &state.readings()).await);

            let now = Instant::now();
            let due = last_persist.is_none_or(|at| {
                now.saturating_duration_since(at) >= self.timing.energy_persist()
            });
            if due && let Some(identity) = state.current_identity() {
                let result = store_user_energy(&mut *store, identity, state.energy()).await;
                log_failure(&paths::user(identity), result);
                last_persist = Some(now);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Command poller
// ----------------------------------------------------------------------------

struct CommandPoller<S> {
    session: SharedSession,
    store: StoreHandle<S>,
    timing: TimingConfig,
}

impl<S: RemoteStore> CommandPoller<S> {
    async fn run(self) {
        let mut ticker = interval(self.timing.command_poll());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut was_online: Option<bool> = None;

        loop {
            ticker.tick().await;

            // Read and apply under one store lock so controller writes
            // cannot interleave with a half-applied poll.
            let mut store = self.store.lock().await;
            let commands = read_commands(&mut *store).await;
            let refused = self.session.write().await.apply_remote(&commands);

            if refused.stale_login {
                info!("Login request ignored, a session is already active");
                log_failure(paths::LOGIN, store.set_flag(paths::LOGIN, false).await);
            }
            if refused.stale_logout {
                debug!("stale logout request discarded");
                log_failure(paths::LOGOUT, store.set_flag(paths::LOGOUT, false).await);
            }
            drop(store);

            if was_online != Some(commands.online) {
                if commands.online {
                    info!("Remote store reachable");
                } else {
                    warn!("Remote store unreachable");
                }
                was_online = Some(commands.online);
            }
        }
    }
}

/// Read the request flags and relay status in one pass.
async fn read_commands<S: RemoteStore>(store: &mut S) -> RemoteCommands {
    let mut online = true;
    let login = read_flag(store, paths::LOGIN, &mut online).await;
    let logout = read_flag(store, paths::LOGOUT, &mut online).await;
    let dev1 = read_flag(store, &paths::relay_status(DeviceSlot::One), &mut online).await;
    let dev2 = read_flag(store, &paths::relay_status(DeviceSlot::Two), &mut online).await;

    RemoteCommands {
        login,
        logout,
        relay_status: [dev1, dev2],
        online,
    }
}

async fn read_flag<S: RemoteStore>(store: &mut S, path: &str, online: &mut bool) -> Option<bool> {
    match store.get_flag(path).await {
        Ok(value) => Some(value),
        Err(StoreError::Unreachable(_)) => {
            *online = false;
            None
        }
        Err(e) => {
            debug!(path, error = %e, "ignoring unreadable flag");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_commands() {
        let mut store = MemoryStore::with_document(json!({
            "login": true,
            "dev1": {"Status": false},
            "dev2": {"Status": "broken"}
        }));

        let commands = read_commands(&mut store).await;
        assert_eq!(commands.login, Some(true));
        assert_eq!(commands.logout, Some(false));
        assert_eq!(commands.relay_status, [Some(false), None]);
        assert!(commands.online);
    }

    #[tokio::test]
    async fn test_read_commands_offline() {
        let mut store = MemoryStore::new();
        store.set_online(false);

        let commands = read_commands(&mut store).await;
        assert_eq!(commands, RemoteCommands::default());
    }

    #[tokio::test]
    async fn test_scan_slot_aborts_on_drop() {
        let mut slot = ScanSlot::default();
        assert!(!slot.is_alive());

        let handle = tokio::spawn(async {
            std::future::pending::<()>().await;
            ScanOutcome::ReaderUnavailable
        });
        let abort = handle.abort_handle();
        slot.start(handle);
        assert!(slot.is_alive());

        drop(slot);
        for _ in 0..10 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }

    #[tokio::test]
    async fn test_scan_slot_frees_after_finish() {
        let mut slot = ScanSlot::default();
        slot.start(tokio::spawn(async { ScanOutcome::ReaderUnavailable }));

        while slot.is_alive() {
            tokio::task::yield_now().await;
        }
        assert!(slot.handle.is_none());
    }
}
