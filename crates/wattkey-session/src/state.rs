//! Session State: the one record every task shares.
//!
//! The record lives behind a [`SharedSession`] handle (an
//! `Arc<RwLock<SessionState>>`) handed to each task when it is spawned.
//! Critical sections are short and never span an await on anything else.
//!
//! Writes that move the session between logged out and logged in are
//! crate-private and only the lifecycle controller calls them, so:
//!
//! - `current_identity` is set exactly when `logged_in` is true
//! - relays are only enabled while logged in
//! - energy counters never decrease during a session

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::Instant;
use wattkey_core::{CardId, DeviceSlot, Reading, Sample};

/// Snapshot of the session record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    logged_in: bool,
    login_requested: bool,
    logout_requested: bool,
    current_identity: Option<CardId>,
    readings: [Reading; 2],
    relay_enabled: [bool; 2],
    last_measurement: Option<Instant>,
    remote_online: bool,
}

/// Identity and counters captured when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub identity: CardId,
    pub energy: [f64; 2],
}

impl SessionSummary {
    pub fn total_energy(&self) -> f64 {
        self.energy.iter().sum()
    }
}

/// Values read from the remote store in one poll. `None` means the read
/// failed and the local value is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteCommands {
    pub login: Option<bool>,
    pub logout: Option<bool>,
    pub relay_status: [Option<bool>; 2],
    pub online: bool,
}

/// Requests that [`SessionState::apply_remote`] refused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteApply {
    /// Login raised while a session is active.
    pub stale_login: bool,
    /// Logout raised while no session is active.
    pub stale_logout: bool,
}

impl SessionState {
    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn login_requested(&self) -> bool {
        self.login_requested
    }

    pub fn logout_requested(&self) -> bool {
        self.logout_requested
    }

    pub fn current_identity(&self) -> Option<&CardId> {
        self.current_identity.as_ref()
    }

    pub fn reading(&self, slot: DeviceSlot) -> &Reading {
        &self.readings[slot.index()]
    }

    pub fn readings(&self) -> [Reading; 2] {
        self.readings
    }

    /// Accumulated energy per slot.
    pub fn energy(&self) -> [f64; 2] {
        [self.readings[0].energy, self.readings[1].energy]
    }

    pub fn relay_enabled(&self, slot: DeviceSlot) -> bool {
        self.relay_enabled[slot.index()]
    }

    pub fn relay_states(&self) -> [bool; 2] {
        self.relay_enabled
    }

    pub fn last_measurement(&self) -> Option<Instant> {
        self.last_measurement
    }

    /// Whether the last command poll reached the remote store.
    pub fn remote_online(&self) -> bool {
        self.remote_online
    }

    /// Whether a measurement pass is due at `now`.
    pub fn measurement_due(&self, now: Instant, interval: Duration) -> bool {
        self.last_measurement
            .is_none_or(|last| now.saturating_duration_since(last) >= interval)
    }

    // ------------------------------------------------------------------------
    // Lifecycle transitions (controller only)
    // ------------------------------------------------------------------------

    /// Start a session for `identity` with restored counters.
    pub(crate) fn begin_session(&mut self, identity: CardId, energy: [f64; 2]) {
        self.current_identity = Some(identity);
        self.readings = [Reading::with_energy(energy[0]), Reading::with_energy(energy[1])];
        self.relay_enabled = [true; 2];
        self.last_measurement = None;
        self.login_requested = false;
        self.logged_in = true;
    }

    /// Capture and reset the session in one step.
    ///
    /// The record is always left logged out with zeroed readings, relays
    /// disabled and no pending logout. Returns the captured identity and
    /// counters if a session was active.
    pub(crate) fn end_session(&mut self) -> Option<SessionSummary> {
        let summary = self.current_identity.take().map(|identity| SessionSummary {
            identity,
            energy: self.energy(),
        });

        self.readings = [Reading::default(); 2];
        self.relay_enabled = [false; 2];
        self.last_measurement = None;
        self.logout_requested = false;
        self.logged_in = false;

        summary
    }

    // ------------------------------------------------------------------------
    // Request flags
    // ------------------------------------------------------------------------

    /// Fold one command poll into the record.
    ///
    /// A login request is refused while logged in and a logout request
    /// while logged out; both are reported back so the caller can clear
    /// them remotely. Relay status is only taken while logged in.
    pub(crate) fn apply_remote(&mut self, commands: &RemoteCommands) -> RemoteApply {
        let mut refused = RemoteApply::default();
        self.remote_online = commands.online;

        if let Some(login) = commands.login {
            if login && self.logged_in {
                refused.stale_login = true;
            } else {
                self.login_requested = login;
            }
        }

        if let Some(logout) = commands.logout {
            if logout && !self.logged_in {
                refused.stale_logout = true;
                self.logout_requested = false;
            } else {
                self.logout_requested = logout;
            }
        }

        if self.logged_in {
            for (enabled, status) in self.relay_enabled.iter_mut().zip(commands.relay_status) {
                if let Some(on) = status {
                    *enabled = on;
                }
            }
        }

        refused
    }

    /// Consume a pending login request.
    pub(crate) fn take_login_request(&mut self) -> bool {
        std::mem::take(&mut self.login_requested)
    }

    /// Consume a pending logout request.
    pub(crate) fn take_logout_request(&mut self) -> bool {
        std::mem::take(&mut self.logout_requested)
    }

    // ------------------------------------------------------------------------
    // Measurements
    // ------------------------------------------------------------------------

    /// Fold a meter sample into a slot. Ignored while logged out.
    pub(crate) fn record_sample(&mut self, slot: DeviceSlot, sample: &Sample) -> bool {
        if !self.logged_in {
            return false;
        }
        self.readings[slot.index()].apply(sample);
        true
    }

    /// Zero a slot's instantaneous values, keeping its energy.
    pub(crate) fn clear_instant(&mut self, slot: DeviceSlot) {
        self.readings[slot.index()].clear_instant();
    }

    pub(crate) fn mark_measured(&mut self, now: Instant) {
        self.last_measurement = Some(now);
    }
}

/// Shared handle to the session record.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<SessionState>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current record.
    pub async fn snapshot(&self) -> SessionState {
        self.inner.read().await.clone()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(raw: &str) -> CardId {
        CardId::new(raw).unwrap()
    }

    fn logged_in(energy: [f64; 2]) -> SessionState {
        let mut state = SessionState::default();
        state.begin_session(card("0A:4E:17:05"), energy);
        state
    }

    fn sample(energy_delta: f64) -> Sample {
        Sample {
            current: 1.2,
            voltage: 230.0,
            power: 276.0,
            energy_delta,
        }
    }

    #[test]
    fn test_begin_session() {
        let state = logged_in([1.5, 2.5]);

        assert!(state.is_logged_in());
        assert_eq!(state.current_identity().unwrap().as_str(), "0A:4E:17:05");
        assert_eq!(state.energy(), [1.5, 2.5]);
        assert_eq!(state.relay_states(), [true, true]);
        assert!(!state.login_requested());
    }

    #[test]
    fn test_end_session_resets_everything() {
        let mut state = logged_in([10.0, 20.0]);
        state.record_sample(DeviceSlot::One, &sample(0.5));

        let summary = state.end_session().unwrap();
        assert_eq!(summary.identity.as_str(), "0A:4E:17:05");
        assert_eq!(summary.energy, [10.5, 20.0]);
        assert_eq!(summary.total_energy(), 30.5);

        assert!(!state.is_logged_in());
        assert!(state.current_identity().is_none());
        assert_eq!(state.readings(), [Reading::default(); 2]);
        assert_eq!(state.relay_states(), [false, false]);
        assert!(!state.logout_requested());
    }

    #[test]
    fn test_end_session_while_logged_out() {
        let mut state = SessionState::default();
        assert!(state.end_session().is_none());
        assert!(!state.is_logged_in());
    }

    #[test]
    fn test_login_refused_while_logged_in() {
        let mut state = logged_in([0.0, 0.0]);
        let refused = state.apply_remote(&RemoteCommands {
            login: Some(true),
            online: true,
            ..Default::default()
        });

        assert!(refused.stale_login);
        assert!(!state.login_requested());
        assert_eq!(state.current_identity().unwrap().as_str(), "0A:4E:17:05");
    }

    #[test]
    fn test_logout_refused_while_logged_out() {
        let mut state = SessionState::default();
        let refused = state.apply_remote(&RemoteCommands {
            logout: Some(true),
            online: true,
            ..Default::default()
        });

        assert!(refused.stale_logout);
        assert!(!state.logout_requested());
    }

    #[test]
    fn test_failed_reads_keep_local_values() {
        let mut state = SessionState::default();
        state.apply_remote(&RemoteCommands {
            login: Some(true),
            online: true,
            ..Default::default()
        });
        state.apply_remote(&RemoteCommands::default());

        assert!(state.login_requested());
        assert!(!state.remote_online());
    }

    #[test]
    fn test_relay_status_only_while_logged_in() {
        let status = RemoteCommands {
            relay_status: [Some(true), Some(false)],
            online: true,
            ..Default::default()
        };

        let mut state = SessionState::default();
        state.apply_remote(&status);
        assert_eq!(state.relay_states(), [false, false]);

        let mut state = logged_in([0.0, 0.0]);
        state.apply_remote(&status);
        assert_eq!(state.relay_states(), [true, false]);
    }

    #[test]
    fn test_energy_is_monotonic() {
        let mut state = logged_in([5.0, 0.0]);
        state.record_sample(DeviceSlot::One, &sample(0.25));
        state.record_sample(DeviceSlot::One, &sample(-3.0));
        state.record_sample(DeviceSlot::One, &sample(f64::NAN));

        assert_eq!(state.reading(DeviceSlot::One).energy, 5.25);
        assert_eq!(state.reading(DeviceSlot::One).power, 276.0);
    }

    #[test]
    fn test_sample_ignored_while_logged_out() {
        let mut state = SessionState::default();
        assert!(!state.record_sample(DeviceSlot::Two, &sample(1.0)));
        assert_eq!(state.reading(DeviceSlot::Two).energy, 0.0);
    }

    #[test]
    fn test_clear_instant_keeps_energy() {
        let mut state = logged_in([3.0, 0.0]);
        state.record_sample(DeviceSlot::One, &sample(0.0));
        state.clear_instant(DeviceSlot::One);

        let reading = state.reading(DeviceSlot::One);
        assert_eq!(reading.power, 0.0);
        assert_eq!(reading.energy, 3.0);
    }

    #[test]
    fn test_take_requests() {
        let mut state = SessionState::default();
        state.apply_remote(&RemoteCommands {
            login: Some(true),
            ..Default::default()
        });

        assert!(state.take_login_request());
        assert!(!state.take_login_request());
        assert!(!state.take_logout_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_measurement_due() {
        let mut state = logged_in([0.0, 0.0]);
        let interval = Duration::from_millis(1500);
        let t0 = Instant::now();

        assert!(state.measurement_due(t0, interval));
        state.mark_measured(t0);
        assert!(!state.measurement_due(t0 + Duration::from_millis(1499), interval));
        assert!(state.measurement_due(t0 + interval, interval));
    }

    #[tokio::test]
    async fn test_shared_snapshot() {
        let session = SharedSession::new();
        session.write().await.begin_session(card("EE:E0:E8:00"), [0.0, 1.0]);

        let snapshot = session.snapshot().await;
        assert!(snapshot.is_logged_in());
        assert_eq!(session.read().await.energy(), [0.0, 1.0]);
    }
}
