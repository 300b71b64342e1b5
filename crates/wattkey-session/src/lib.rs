//! Card-gated energy sessions.
//!
//! This crate holds the session core: the shared [`SessionState`] record,
//! the [`SessionController`] that moves it between logged out and logged
//! in, and the [`Coordinator`] that runs the control loop, telemetry
//! pusher and command poller around it.
//!
//! # Flow
//!
//! 1. The command poller sees `login = true` in the remote store.
//! 2. The control loop asks the controller to admit the request and spawns
//!    a scan unit.
//! 3. The scan unit brings the reader up, waits for an allowed card, shows
//!    OK, releases the reader and starts the session.
//! 4. While logged in the control loop drives relays, samples the meters
//!    and wakes the telemetry pusher.
//! 5. `logout = true` ends the session; counters are saved per card.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wattkey_hardware::mock::{MockDisplay, MockMeter, MockReaderPort, MockRelays};
//! use wattkey_session::{Coordinator, MemoryStore, Peripherals, WattkeyConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WattkeyConfig::from_toml_str("[timing]\nok_hold_ms = 500\n")?;
//! let (reader, _card) = MockReaderPort::new();
//! let (display, _screens) = MockDisplay::new();
//!
//! let handle = Coordinator::new(
//!     config.timing,
//!     config.allow_list()?,
//!     MemoryStore::new(),
//!     Peripherals {
//!         reader,
//!         meter: Arc::new(MockMeter::default()),
//!         relays: Arc::new(MockRelays::new()),
//!         display: Arc::new(display),
//!     },
//! )
//! .start();
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod allow_list;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod state;
pub mod store;

pub use allow_list::AllowList;
pub use config::{ConfigError, TimingConfig, WattkeyConfig};
pub use controller::{ControllerParts, LoginAdmission, ScanOutcome, SessionController};
pub use coordinator::{Coordinator, CoordinatorHandle, Peripherals};
pub use state::{RemoteApply, RemoteCommands, SessionState, SessionSummary, SharedSession};
pub use store::{MemoryStore, RemoteStore, StoreError, StoreHandle, StoreResult};
