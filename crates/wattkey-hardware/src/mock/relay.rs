//! Mock relay bank.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use wattkey_core::DeviceSlot;

use crate::{HardwareError, Result, traits::RelayDriver};

/// Two relay outputs backed by atomics.
///
/// # Examples
///
/// ```
/// use wattkey_core::DeviceSlot;
/// use wattkey_hardware::mock::MockRelays;
/// use wattkey_hardware::traits::RelayDriver;
///
/// let relays = MockRelays::new();
/// relays.set(DeviceSlot::One, true).unwrap();
/// assert!(relays.is_on(DeviceSlot::One));
/// assert!(!relays.is_on(DeviceSlot::Two));
/// ```
#[derive(Debug, Default)]
pub struct MockRelays {
    outputs: [AtomicBool; 2],
    switches: AtomicUsize,
    jammed: AtomicBool,
}

impl MockRelays {
    /// Both outputs off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current output level of `slot`.
    pub fn is_on(&self, slot: DeviceSlot) -> bool {
        self.outputs[slot.index()].load(Ordering::SeqCst)
    }

    /// Number of `set` calls that changed an output.
    pub fn switch_count(&self) -> usize {
        self.switches.load(Ordering::SeqCst)
    }

    /// Make every `set` fail.
    pub fn set_jammed(&self, jammed: bool) {
        self.jammed.store(jammed, Ordering::SeqCst);
    }
}

impl RelayDriver for MockRelays {
    fn set(&self, slot: DeviceSlot, on: bool) -> Result<()> {
        if self.jammed.load(Ordering::SeqCst) {
            return Err(HardwareError::actuation(format!("{slot} relay jammed")));
        }
        let previous = self.outputs[slot.index()].swap(on, Ordering::SeqCst);
        if previous != on {
            self.switches.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
