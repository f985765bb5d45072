//! Swap-wait instrumentation and buffer continuity for double-buffered
//! composite video producers.
//!
//! A drawing loop on a small video target spends each frame either drawing
//! or blocked waiting for the buffer swap. This crate measures the split
//! using nothing but a free-running 32-bit cycle counter, and optionally
//! copies the previous frame forward after each swap so drawing can be
//! incremental.
//!
//! # Quick Start
//!
//! ```no_run
//! use composite_framesync::{
//!     FrameSync, ProducerOptions, SoftwareProducer, SystemCycleCounter, VideoStandard,
//! };
//!
//! # fn main() -> Result<(), composite_framesync::Error> {
//! let producer = SoftwareProducer::new(ProducerOptions::builder(VideoStandard::Ntsc).build()?);
//! let mut sync = FrameSync::new(producer, SystemCycleCounter::default());
//! sync.begin(true)?;
//!
//! loop {
//!     // draw ...
//!     sync.wait_for_frame();
//!     # break;
//! }
//!
//! // Logs "waited X.YY%, missed M of N frames" and starts a new session.
//! let fraction = sync.performance_number();
//! # let _ = fraction;
//! # Ok(())
//! # }
//! ```
//!
//! # Core Concepts
//!
//! ## Producers
//!
//! A [`VideoProducer`] owns the frame buffers and performs swaps. The crate
//! ships [`SoftwareProducer`], which runs scan-out on a background thread;
//! hardware back ends implement the same trait.
//!
//! ## Sessions and the Wait Fraction
//!
//! [`FrameSync`] times each swap wait and tallies it within a [`Session`].
//! The wait fraction is the tally over the elapsed session time, in basis
//! points (10000 = 100.00%). Sessions close when queried and whenever the
//! cycle counter wraps, so statistics never straddle a wrap.
//!
//! ## Buffer Continuity
//!
//! With `copy_after_swap` enabled, the pre-swap buffer is copied into the
//! newly active buffer chunk by chunk, following the producer's
//! [`FrameLayout`].
//!
//! # Thread Safety
//!
//! [`FrameSync`] is driven from a single thread. [`SoftwareProducer`] is not
//! `Send`; its scan-out thread only shares counters with it.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

// Internal modules
mod error;
mod vblank;

// Public modules
pub mod copier;
pub mod counter;
pub mod layout;
pub mod monitor;
pub mod producer;
pub mod session;
pub mod software;

// Re-exports
pub use {
    copier::{copy_after_swap, CopyOutcome},
    counter::{CycleCounter, Cycles, SystemCycleCounter, DEFAULT_CLOCK_HZ},
    error::*,
    layout::{FrameLayout, LineTable},
    monitor::{FrameSync, FrameSyncOptions, FrameSyncOptionsBuilder},
    producer::{ProducerOptions, ProducerOptionsBuilder, VideoProducer, VideoStandard},
    session::{CloseReason, PerformanceReport, Session, FULL_SCALE},
    software::SoftwareProducer,
};

/// Alias for Result with our Error type
pub type Result<T> = std::result::Result<T, crate::error::Error>;
