//! Free-running hardware cycle counters.
//!
//! The monitor only ever needs one cheap, instantaneous read of a narrow
//! counter that wraps back to zero after [`Cycles::MAX`]. Anything that can
//! produce such a value implements [`CycleCounter`]: the [`SystemCycleCounter`]
//! derived from the host's monotonic clock, or a plain closure.
//!
//! ```
//! use std::cell::Cell;
//! use composite_framesync::CycleCounter;
//!
//! let ticks = Cell::new(0u32);
//! let counter = || {
//!     ticks.set(ticks.get().wrapping_add(100));
//!     ticks.get()
//! };
//! assert_eq!(counter.cycles(), 100);
//! assert_eq!(counter.cycles(), 200);
//! ```

use once_cell::sync::Lazy;

use std::time::Instant;

/// Width of the hardware cycle counter.
pub type Cycles = u32;

/// Clock rate of the reference target (240 MHz), at which a 32-bit counter
/// wraps roughly every 17.9 seconds.
pub const DEFAULT_CLOCK_HZ: u64 = 240_000_000;

/// A free-running, wrapping cycle counter.
pub trait CycleCounter {
    /// Sample the counter.
    fn cycles(&self) -> Cycles;
}

impl<F> CycleCounter for F
where
    F: Fn() -> Cycles,
{
    fn cycles(&self) -> Cycles {
        self()
    }
}

static ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Cycle counter synthesized from the process-wide monotonic clock.
///
/// All instances share one origin, so two counters at the same clock rate
/// read the same value. The count is truncated to [`Cycles`], so it wraps
/// exactly like the hardware register it stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemCycleCounter {
    clock_hz: u64,
}

impl SystemCycleCounter {
    /// Counter ticking at `clock_hz` cycles per second.
    pub fn new(clock_hz: u64) -> Self {
        Lazy::force(&ORIGIN);
        Self { clock_hz }
    }

    pub fn clock_hz(&self) -> u64 {
        self.clock_hz
    }

    /// Seconds between two wraps of the counter at this clock rate.
    pub fn wrap_period_secs(&self) -> f64 {
        (u64::from(Cycles::MAX) + 1) as f64 / self.clock_hz as f64
    }
}

impl Default for SystemCycleCounter {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_HZ)
    }
}

impl CycleCounter for SystemCycleCounter {
    fn cycles(&self) -> Cycles {
        let nanos = ORIGIN.elapsed().as_nanos();
        let ticks = nanos * u128::from(self.clock_hz) / 1_000_000_000;
        // Truncation is the wrap.
        ticks as Cycles
    }
}
