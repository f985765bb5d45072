//! Swap-wait instrumentation for a double-buffered video producer.
//!
//! [`FrameSync`] wraps a [`VideoProducer`] and a [`CycleCounter`]. Every call
//! to [`FrameSync::wait_for_frame`] is timed, and the time spent blocked is
//! tallied against the time elapsed since the session began. The ratio is
//! the *wait fraction*: near 10000 the drawing code finishes well within a
//! frame, near 0 it is the bottleneck.
//!
//! # Counter Wraparound
//!
//! The cycle counter is 32 bits and wraps (about every 18 seconds at 240 MHz).
//! A session never spans a wrap:
//!
//! - if the counter is found below the previous wait's end sample, the
//!   session is closed before the new wait is recorded;
//! - if the counter wraps during a wait, that wait is dropped from the tally
//!   and the session is closed at the wait's start sample.
//!
//! Either way a report is logged and a fresh session starts with the next wait.
//!
//! # Example
//!
//! ```no_run
//! use composite_framesync::{
//!     FrameSync, FrameSyncOptions, ProducerOptions, SoftwareProducer, SystemCycleCounter,
//!     VideoStandard,
//! };
//!
//! # fn main() -> Result<(), composite_framesync::Error> {
//! let producer = SoftwareProducer::new(ProducerOptions::builder(VideoStandard::Ntsc).build()?);
//! let options = FrameSyncOptions::builder().copy_after_swap(true).build();
//! let mut sync = FrameSync::with_options(producer, SystemCycleCounter::default(), options);
//! sync.begin(true)?;
//!
//! for _ in 0..600 {
//!     // draw into sync.producer_mut() ...
//!     sync.wait_for_frame();
//! }
//! println!("waited {} bp", sync.performance_number());
//! # Ok(())
//! # }
//! ```

use crate::{
    copier,
    counter::{CycleCounter, Cycles},
    producer::VideoProducer,
    session::{CloseReason, PerformanceReport, Session},
    Result,
};

/// Configuration for a [`FrameSync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSyncOptions {
    /// Copy the previous buffer into the new one after every swap.
    pub copy_after_swap: bool,
    /// Level at which session reports are logged.
    pub report_level: log::Level,
}

impl FrameSyncOptions {
    /// Create a builder for configuring frame sync options
    pub fn builder() -> FrameSyncOptionsBuilder {
        FrameSyncOptionsBuilder::new()
    }
}

impl Default for FrameSyncOptions {
    fn default() -> Self {
        Self {
            copy_after_swap: false,
            report_level: log::Level::Info,
        }
    }
}

/// Builder for configuring `FrameSyncOptions` with ergonomic method chaining
#[derive(Debug, Clone, Default)]
pub struct FrameSyncOptionsBuilder {
    copy_after_swap: Option<bool>,
    report_level: Option<log::Level>,
}

impl FrameSyncOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure whether to copy buffer contents forward after each swap
    #[must_use]
    pub fn copy_after_swap(mut self, enabled: bool) -> Self {
        self.copy_after_swap = Some(enabled);
        self
    }

    /// Set the log level used for session reports
    #[must_use]
    pub fn report_level(mut self, level: log::Level) -> Self {
        self.report_level = Some(level);
        self
    }

    /// Build the `FrameSyncOptions`
    pub fn build(self) -> FrameSyncOptions {
        let defaults = FrameSyncOptions::default();
        FrameSyncOptions {
            copy_after_swap: self.copy_after_swap.unwrap_or(defaults.copy_after_swap),
            report_level: self.report_level.unwrap_or(defaults.report_level),
        }
    }
}

/// Frame synchronizer and swap-wait monitor.
///
/// Owns the producer and the counter. Single-threaded: every operation that
/// touches the session takes `&mut self`, and none of them fail. Diagnostics
/// go to the `log` facade.
#[derive(Debug)]
pub struct FrameSync<P, C> {
    producer: P,
    counter: C,
    pub(crate) session: Session,
    options: FrameSyncOptions,
    last_report: Option<PerformanceReport>,
}

impl<P: VideoProducer, C: CycleCounter> FrameSync<P, C> {
    /// Wrap `producer` with default options (no continuity copy).
    pub fn new(producer: P, counter: C) -> Self {
        Self::with_options(producer, counter, FrameSyncOptions::default())
    }

    pub fn with_options(producer: P, counter: C, options: FrameSyncOptions) -> Self {
        Self {
            producer,
            counter,
            session: Session::new(),
            options,
            last_report: None,
        }
    }

    /// Start the producer.
    ///
    /// # Errors
    ///
    /// Propagates the producer's error, typically
    /// [`Error::AllocationFailed`](crate::Error::AllocationFailed). The
    /// failure is logged here once; it is not retried.
    pub fn begin(&mut self, double_buffer: bool) -> Result<()> {
        self.producer.begin(double_buffer).map_err(|e| {
            log::error!("Video producer failed to start: {e}");
            e
        })
    }

    /// Block until the next buffer swap, timing the wait.
    ///
    /// Never fails; timing anomalies close the session and are logged.
    pub fn wait_for_frame(&mut self) {
        let old_lines = if self.options.copy_after_swap {
            // SAFETY: the producer keeps its rows in place until it is dropped,
            // and it lives in self for the rest of this call.
            Some(unsafe { self.producer.frame_buffer_lines().detach() })
        } else {
            None
        };

        let wait_start = self.counter.cycles();
        if wait_start < self.session.end_time {
            log::debug!(
                "cycle counter wrapped since last wait ({wait_start} < {}), closing session",
                self.session.end_time
            );
            self.close_session(CloseReason::CounterWrapped);
        }
        if !self.session.is_open() {
            self.session.begin(
                wait_start,
                self.producer.rendered_frame_count(),
                self.producer.buffer_swap_count(),
            );
        }

        self.producer.wait_for_swap();

        let wait_end = self.counter.cycles();
        if wait_end < wait_start {
            log::debug!(
                "cycle counter wrapped during wait ({wait_end} < {wait_start}), wait not counted"
            );
            self.session.end_at(wait_start);
            self.close_session(CloseReason::WrappedDuringWait);
        } else {
            self.session.record_wait(wait_start, wait_end);
        }

        if let Some(old_lines) = old_lines {
            let new_lines = self.producer.frame_buffer_lines();
            let layout = self.producer.layout();
            // SAFETY: the producer is reachable only through &mut self, so no
            // caller holds a view into either buffer.
            let copied = unsafe { copier::copy_after_swap(&layout, &old_lines, &new_lines) };
            if let Err(e) = copied {
                log::error!("Buffer copy after swap skipped: {e}");
            }
        }
    }

    /// Close the current session, log its report and return its wait
    /// fraction in basis points (0..=10000).
    ///
    /// The session is reset even if its state turns out to be inconsistent,
    /// in which case the report is skipped and an error is logged.
    pub fn performance_number(&mut self) -> u32 {
        self.close_session(CloseReason::Query)
    }

    /// End the current session and start a new one with the next wait.
    ///
    /// Use this to bracket a section of code for isolated measurement; the
    /// return value covers the section just closed. Counter wraps still end
    /// sessions on their own.
    pub fn start_new_session(&mut self) -> u32 {
        self.performance_number()
    }

    /// Wait fraction of the current session without closing it.
    pub fn wait_fraction(&self) -> u32 {
        self.session.wait_fraction()
    }

    fn close_session(&mut self, reason: CloseReason) -> u32 {
        let fraction = self.session.wait_fraction();

        let report = self.session.report(
            self.producer.rendered_frame_count(),
            self.producer.buffer_swap_count(),
            reason,
        );
        self.last_report = match report {
            Ok(report) => {
                log::log!(self.options.report_level, "{report}");
                Some(report)
            }
            Err(fault) => {
                log::error!("{fault}");
                None
            }
        };

        self.session.reset();
        fraction
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Report of the most recently closed session, if one was produced.
    pub fn last_report(&self) -> Option<&PerformanceReport> {
        self.last_report.as_ref()
    }

    pub fn options(&self) -> &FrameSyncOptions {
        &self.options
    }

    pub fn copy_after_swap(&self) -> bool {
        self.options.copy_after_swap
    }

    /// Enable or disable the continuity copy for subsequent waits.
    pub fn set_copy_after_swap(&mut self, enabled: bool) {
        self.options.copy_after_swap = enabled;
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    pub fn producer_mut(&mut self) -> &mut P {
        &mut self.producer
    }

    /// Sample the counter this monitor times with.
    pub fn cycles(&self) -> Cycles {
        self.counter.cycles()
    }

    pub fn into_parts(self) -> (P, C) {
        (self.producer, self.counter)
    }
}
