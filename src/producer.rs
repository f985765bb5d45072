//! The video producer seam.
//!
//! The producer owns the frame buffers and the signal generator behind them.
//! [`FrameSync`](crate::FrameSync) only ever talks to it through
//! [`VideoProducer`]. [`SoftwareProducer`](crate::SoftwareProducer) is the
//! in-process implementation; hardware back ends implement the same trait.

use std::time::Duration;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    layout::{FrameLayout, LineTable},
    Error, Result,
};

/// A double-buffered video frame producer.
pub trait VideoProducer {
    /// One-time setup: allocate frame buffers and start the signal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationFailed`] if the frame buffers cannot be
    /// allocated. This is not recoverable.
    fn begin(&mut self, double_buffer: bool) -> Result<()>;

    /// Block until the buffer being drawn into has been handed to the
    /// display and a fresh buffer is active.
    fn wait_for_swap(&mut self);

    /// Row table of the buffer currently being drawn into.
    ///
    /// Producers that have not started return [`LineTable::empty`].
    fn frame_buffer_lines(&self) -> LineTable<'_>;

    /// Frames scanned out since `begin`. Wraps.
    fn rendered_frame_count(&self) -> u32;

    /// Buffer swaps performed since `begin`. Wraps.
    fn buffer_swap_count(&self) -> u32;

    /// How the rows returned by [`frame_buffer_lines`](Self::frame_buffer_lines)
    /// are grouped in memory.
    fn layout(&self) -> FrameLayout;
}

impl<P: VideoProducer + ?Sized> VideoProducer for Box<P> {
    fn begin(&mut self, double_buffer: bool) -> Result<()> {
        (**self).begin(double_buffer)
    }

    fn wait_for_swap(&mut self) {
        (**self).wait_for_swap()
    }

    fn frame_buffer_lines(&self) -> LineTable<'_> {
        (**self).frame_buffer_lines()
    }

    fn rendered_frame_count(&self) -> u32 {
        (**self).rendered_frame_count()
    }

    fn buffer_swap_count(&self) -> u32 {
        (**self).buffer_swap_count()
    }

    fn layout(&self) -> FrameLayout {
        (**self).layout()
    }
}

/// Analog video standard the signal is generated for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum VideoStandard {
    /// 525 lines, 59.94 fields per second.
    #[default]
    Ntsc = 0,
    /// 625 lines, 50 fields per second.
    Pal = 1,
}

impl VideoStandard {
    /// Construct from the classic `ntsc: bool` switch.
    pub fn from_ntsc(ntsc: bool) -> Self {
        if ntsc {
            VideoStandard::Ntsc
        } else {
            VideoStandard::Pal
        }
    }

    /// Nominal time between vertical blanks.
    pub fn frame_period(&self) -> Duration {
        match self {
            // 1001/60000 s
            VideoStandard::Ntsc => Duration::from_nanos(16_683_333),
            VideoStandard::Pal => Duration::from_millis(20),
        }
    }
}

/// Configuration for a [`SoftwareProducer`](crate::SoftwareProducer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerOptions {
    pub standard: VideoStandard,
    pub layout: FrameLayout,
    pub frame_period: Duration,
}

impl ProducerOptions {
    /// Create a builder for the given video standard
    pub fn builder(standard: VideoStandard) -> ProducerOptionsBuilder {
        ProducerOptionsBuilder::new(standard)
    }
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            standard: VideoStandard::Ntsc,
            layout: FrameLayout::COMPOSITE,
            frame_period: VideoStandard::Ntsc.frame_period(),
        }
    }
}

/// Builder for configuring `ProducerOptions` with ergonomic method chaining
#[derive(Debug, Clone)]
pub struct ProducerOptionsBuilder {
    standard: VideoStandard,
    layout: Option<FrameLayout>,
    frame_period: Option<Duration>,
}

impl ProducerOptionsBuilder {
    /// Create a new builder with the specified video standard
    pub fn new(standard: VideoStandard) -> Self {
        Self {
            standard,
            layout: None,
            frame_period: None,
        }
    }

    /// Set the frame buffer layout
    #[must_use]
    pub fn layout(mut self, layout: FrameLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Override the vertical blank period (defaults to the standard's rate)
    #[must_use]
    pub fn frame_period(mut self, period: Duration) -> Self {
        self.frame_period = Some(period);
        self
    }

    /// Build the `ProducerOptions`
    ///
    /// # Errors
    ///
    /// Returns an error if the frame period is zero.
    pub fn build(self) -> Result<ProducerOptions> {
        let frame_period = self
            .frame_period
            .unwrap_or_else(|| self.standard.frame_period());

        if frame_period.is_zero() {
            return Err(Error::InvalidConfiguration(
                "Frame period must be greater than zero".into(),
            ));
        }

        Ok(ProducerOptions {
            standard: self.standard,
            layout: self.layout.unwrap_or_default(),
            frame_period,
        })
    }
}
