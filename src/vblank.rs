//! Vertical blank signal shared between a producer and its scan-out thread.
//!
//! The scan-out thread calls [`VBlankSignal::tick`] once per frame. A swap
//! requested by the drawing thread is carried out on the next tick, and the
//! requester blocks until it has happened. Counters and the front buffer
//! index live under one mutex; pixel data never crosses it.

use std::{
    sync::{Condvar, Mutex, MutexGuard},
    time::Instant,
};

#[derive(Debug, Default)]
struct ScanoutState {
    frames: u32,
    swaps: u32,
    front: usize,
    swap_pending: bool,
    running: bool,
}

/// Mutex + condvar pair tracking scan-out progress.
///
/// Mutex poisoning is recovered from rather than propagated: a panicked
/// scan-out thread must not take the drawing thread down with it.
#[derive(Debug, Default)]
pub(crate) struct VBlankSignal {
    state: Mutex<ScanoutState>,
    cv: Condvar,
}

impl VBlankSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScanoutState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark scan-out as running. Counters restart from zero.
    pub(crate) fn start(&self) {
        let mut state = self.lock();
        *state = ScanoutState {
            running: true,
            ..ScanoutState::default()
        };
    }

    /// Stop scan-out and release every waiter.
    pub(crate) fn stop(&self) {
        let mut state = self.lock();
        state.running = false;
        state.swap_pending = false;
        self.cv.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.lock().running
    }

    /// One vertical blank: count the frame and perform a pending swap.
    pub(crate) fn tick(&self, exchange_buffers: bool) {
        let mut state = self.lock();
        state.frames = state.frames.wrapping_add(1);
        if state.swap_pending {
            if exchange_buffers {
                state.front ^= 1;
            }
            state.swaps = state.swaps.wrapping_add(1);
            state.swap_pending = false;
        }
        self.cv.notify_all();
    }

    /// Request a swap and block until the scan-out thread has performed it.
    ///
    /// Returns `false` without waiting if scan-out is not running.
    pub(crate) fn request_swap_and_wait(&self) -> bool {
        let mut state = self.lock();
        if !state.running {
            return false;
        }
        state.swap_pending = true;
        while state.swap_pending && state.running {
            state = match self.cv.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        state.running
    }

    /// Sleep until `deadline`, returning early with `false` if stopped.
    pub(crate) fn sleep_until(&self, deadline: Instant) -> bool {
        let mut state = self.lock();
        while state.running {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            state = match self.cv.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        false
    }

    pub(crate) fn frames(&self) -> u32 {
        self.lock().frames
    }

    pub(crate) fn swaps(&self) -> u32 {
        self.lock().swaps
    }

    pub(crate) fn front(&self) -> usize {
        self.lock().front
    }
}
