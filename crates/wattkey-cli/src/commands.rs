//! Subcommand implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use wattkey_core::{CardId, Sample};
use wattkey_hardware::mock::{MockDisplay, MockMeter, MockReaderPort, MockRelays};
use wattkey_session::store::paths;
use wattkey_session::{
    Coordinator, MemoryStore, Peripherals, RemoteStore, SharedSession, WattkeyConfig,
};

/// Loads drawn by the two simulated devices: a lamp and a heater.
const SIMULATED_LOAD: [Sample; 2] = [
    Sample {
        current: 0.45,
        voltage: 229.5,
        power: 103.3,
        energy_delta: 0.043,
    },
    Sample {
        current: 1.8,
        voltage: 229.5,
        power: 413.1,
        energy_delta: 0.172,
    },
];

/// Extra time allowed for a state change beyond the configured waits.
const SETTLE_MARGIN: Duration = Duration::from_secs(5);

/// Run one full session cycle and print the resulting store document.
pub async fn simulate(config: WattkeyConfig, card: &str, seconds: u64) -> Result<()> {
    let card = CardId::new(card).with_context(|| format!("invalid card `{card}`"))?;
    let allow_list = config.allow_list()?;
    if !allow_list.contains(card.as_str()) {
        warn!("Card {} is not on the allow-list; login will not complete", card);
    }

    let (reader, field) = MockReaderPort::new();
    let (display, mut screens) = MockDisplay::new();
    let peripherals = Peripherals {
        reader,
        meter: Arc::new(MockMeter::new(SIMULATED_LOAD)),
        relays: Arc::new(MockRelays::new()),
        display: Arc::new(display),
    };

    let timing = config.timing;
    let handle = Coordinator::new(timing, allow_list, MemoryStore::new(), peripherals).start();
    let store = handle.store().clone();
    let session = handle.session().clone();

    info!("Requesting login");
    store.lock().await.set_flag(paths::LOGIN, true).await?;
    field.present_card(&card.to_bytes());

    let login_wait = timing.ok_hold() + timing.command_poll() + SETTLE_MARGIN;
    if wait_for(&session, true, login_wait).await {
        info!("Metering for {}s", seconds);
        sleep(Duration::from_secs(seconds)).await;

        info!("Requesting logout");
        store.lock().await.set_flag(paths::LOGOUT, true).await?;
        if !wait_for(&session, false, timing.command_poll() + SETTLE_MARGIN).await {
            warn!("Logout did not complete");
        }
    } else {
        warn!("Card {} was not accepted", card);
    }

    for screen in screens.drain() {
        debug!(?screen, "display");
    }

    handle.shutdown().await;

    let document = store.lock().await.document().clone();
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

/// Report whether `uid` is allowed.
pub fn check_card(config: &WattkeyConfig, uid: &str) -> Result<()> {
    let card = CardId::new(uid).with_context(|| format!("invalid card `{uid}`"))?;

    if config.allow_list()?.contains(card.as_str()) {
        println!("{card}: allowed");
    } else {
        println!("{card}: not allowed");
    }
    Ok(())
}

/// Poll the session until `logged_in` matches or `limit` passes.
async fn wait_for(session: &SharedSession, logged_in: bool, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if session.read().await.is_logged_in() == logged_in {
            return true;
        }
        sleep(Duration::from_millis(100)).await;
    }
    false
}
