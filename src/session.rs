//! Measurement session state and wait fraction arithmetic.
//!
//! A [`Session`] accumulates the cycles spent blocked in swap waits between
//! two session boundaries. All arithmetic is on [`Cycles`] (32 bits), so a
//! session can never span a counter wrap; the monitor closes it first.
//!
//! The wait fraction is expressed in basis points: 10000 means every cycle of
//! the session was spent waiting.

use std::fmt;

use crate::{counter::Cycles, error::SessionFault};

/// Full scale of the wait fraction (100.00%).
pub const FULL_SCALE: u32 = 10_000;

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The caller asked for the performance number or a new session.
    Query,
    /// The counter was found below the previous wait's end sample.
    CounterWrapped,
    /// The counter wrapped while blocked in a wait; that wait is not counted.
    WrappedDuringWait,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::Query => "query",
            CloseReason::CounterWrapped => "counter wrapped",
            CloseReason::WrappedDuringWait => "counter wrapped during wait",
        };
        f.write_str(s)
    }
}

/// Timing state of one measurement session.
///
/// A session is open exactly when `wait_tally` is non-zero. Until then the
/// next wait is adopted as its baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub(crate) start_time: Cycles,
    pub(crate) end_time: Cycles,
    pub(crate) wait_tally: Cycles,
    pub(crate) frame_start: u32,
    pub(crate) swap_start: u32,
}

impl Session {
    pub const fn new() -> Self {
        Self {
            start_time: 0,
            end_time: 0,
            wait_tally: 0,
            frame_start: 0,
            swap_start: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.wait_tally != 0
    }

    pub fn start_time(&self) -> Cycles {
        self.start_time
    }

    pub fn end_time(&self) -> Cycles {
        self.end_time
    }

    pub fn wait_tally(&self) -> Cycles {
        self.wait_tally
    }

    pub fn frame_start(&self) -> u32 {
        self.frame_start
    }

    pub fn swap_start(&self) -> u32 {
        self.swap_start
    }

    /// Fraction of the session spent waiting, in basis points.
    ///
    /// The elapsed time is divided down to units of 1/10000 first, so the
    /// quotient never needs more than 32 bits. Sessions of 10000 cycles or
    /// less are too short to measure and report full scale.
    ///
    /// The truncated divisor can push the raw quotient past full scale (a
    /// 19999-cycle session that waited 15000 cycles gives 15000). Such results
    /// are clamped to [`FULL_SCALE`] instead of being returned raw.
    pub fn wait_fraction(&self) -> u32 {
        match self.end_time.checked_sub(self.start_time) {
            Some(elapsed) if elapsed > FULL_SCALE => {
                (self.wait_tally / (elapsed / FULL_SCALE)).min(FULL_SCALE)
            }
            _ => FULL_SCALE,
        }
    }

    /// Adopt `start` as the session baseline along with the producer's
    /// current frame and swap counters.
    pub(crate) fn begin(&mut self, start: Cycles, frames: u32, swaps: u32) {
        self.start_time = start;
        self.frame_start = frames;
        self.swap_start = swaps;
    }

    /// Credit one completed wait.
    pub(crate) fn record_wait(&mut self, wait_start: Cycles, wait_end: Cycles) {
        debug_assert!(wait_end >= wait_start);
        self.wait_tally = self.wait_tally.saturating_add(wait_end - wait_start);
        self.end_time = wait_end;
    }

    /// End the session at `end` without crediting any wait time.
    pub(crate) fn end_at(&mut self, end: Cycles) {
        self.end_time = end;
    }

    /// Summarize the session against the producer's current counters.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionFault`] if the timestamps are inconsistent. The
    /// monitor's overflow guards make both cases unreachable in practice.
    pub fn report(
        &self,
        frames_now: u32,
        swaps_now: u32,
        reason: CloseReason,
    ) -> Result<PerformanceReport, SessionFault> {
        if self.end_time < self.start_time {
            return Err(SessionFault::EndBeforeStart {
                start: self.start_time,
                end: self.end_time,
            });
        }
        let elapsed = self.end_time - self.start_time;
        if elapsed < self.wait_tally {
            return Err(SessionFault::TallyExceedsElapsed {
                elapsed,
                tally: self.wait_tally,
            });
        }

        Ok(PerformanceReport {
            fraction: self.wait_fraction(),
            elapsed,
            wait_tally: self.wait_tally,
            frames: frames_now.wrapping_sub(self.frame_start),
            swaps: swaps_now.wrapping_sub(self.swap_start),
            reason,
        })
    }

    /// Zero the timing fields, closing the session.
    ///
    /// The frame and swap baselines are left alone; the next session
    /// overwrites them when it begins.
    pub(crate) fn reset(&mut self) {
        self.start_time = 0;
        self.end_time = 0;
        self.wait_tally = 0;
    }
}

/// Statistics of a closed session.
///
/// `Display` renders the diagnostic line, e.g.
/// `waited 42.07%, missed 3 of 120 frames`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceReport {
    /// Wait fraction in basis points.
    pub fraction: u32,
    /// Cycles between session start and its last wait.
    pub elapsed: Cycles,
    /// Cycles spent waiting.
    pub wait_tally: Cycles,
    /// Frames scanned out during the session.
    pub frames: u32,
    /// Buffer swaps during the session.
    pub swaps: u32,
    pub reason: CloseReason,
}

impl PerformanceReport {
    /// Frames that went out without a fresh buffer behind them.
    pub fn missed(&self) -> u32 {
        self.frames.wrapping_sub(self.swaps)
    }

    pub fn whole_percent(&self) -> u32 {
        self.fraction / 100
    }

    pub fn decimal_percent(&self) -> u32 {
        self.fraction % 100
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "waited {}.{:02}%, missed {} of {} frames",
            self.whole_percent(),
            self.decimal_percent(),
            self.missed(),
            self.frames
        )
    }
}
