//! Mock power meter returning fixed samples.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use wattkey_core::{DeviceSlot, Sample};

use crate::{HardwareError, Result, traits::PowerMeter};

/// Power meter that returns the same sample for a slot on every pass.
///
/// # Examples
///
/// ```
/// use wattkey_core::{DeviceSlot, Sample};
/// use wattkey_hardware::mock::MockMeter;
/// use wattkey_hardware::traits::PowerMeter;
///
/// #[tokio::main]
/// async fn main() -> wattkey_hardware::Result<()> {
///     let load = Sample { current: 0.5, voltage: 220.0, power: 110.0, energy_delta: 0.05 };
///     let meter = MockMeter::new([load, Sample::default()]);
///
///     assert_eq!(meter.sample(DeviceSlot::One).await?.power, 110.0);
///     assert_eq!(meter.samples_taken(DeviceSlot::One), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockMeter {
    samples: [Sample; 2],
    taken: [AtomicUsize; 2],
    failing: AtomicBool,
}

impl MockMeter {
    /// Meter answering `samples[slot.index()]` for each slot.
    pub fn new(samples: [Sample; 2]) -> Self {
        Self {
            samples,
            taken: Default::default(),
            failing: AtomicBool::new(false),
        }
    }

    /// Number of passes taken for `slot`.
    pub fn samples_taken(&self, slot: DeviceSlot) -> usize {
        self.taken[slot.index()].load(Ordering::SeqCst)
    }

    /// Make every pass fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for MockMeter {
    fn default() -> Self {
        Self::new([Sample::default(); 2])
    }
}

impl PowerMeter for MockMeter {
    async fn sample(&self, slot: DeviceSlot) -> Result<Sample> {
        self.taken[slot.index()].fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(HardwareError::measurement(format!("{slot} sensors not responding")));
        }
        Ok(self.samples[slot.index()])
    }
}
