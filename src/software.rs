//! In-process video producer.
//!
//! [`SoftwareProducer`] stands in for a composite video generator: it owns
//! one or two frame buffers allocated chunk by chunk, and a scan-out thread
//! that raises a vertical blank every frame period and performs pending swaps
//! on it. Nothing is displayed; the front buffer can be inspected with
//! [`SoftwareProducer::front_line`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use composite_framesync::{ProducerOptions, SoftwareProducer, VideoProducer, VideoStandard};
//!
//! # fn main() -> Result<(), composite_framesync::Error> {
//! let options = ProducerOptions::builder(VideoStandard::Ntsc)
//!     .frame_period(Duration::from_millis(2))
//!     .build()?;
//! let mut producer = SoftwareProducer::new(options);
//! producer.begin(true)?;
//!
//! if let Some(line) = producer.line_mut(0) {
//!     line.fill(0xE0);
//! }
//! producer.wait_for_swap();
//! assert_eq!(producer.front_line(0).map(|l| l[0]), Some(0xE0));
//! # Ok(())
//! # }
//! ```

use std::{
    fmt,
    ptr::NonNull,
    slice,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};

use crate::{
    layout::{FrameLayout, LineTable},
    producer::{ProducerOptions, VideoProducer},
    vblank::VBlankSignal,
    Error, Result,
};

/// One frame buffer: a set of chunk allocations and the row table into them.
struct FrameBuffer {
    chunks: Vec<NonNull<[u8]>>,
    rows: Vec<*mut u8>,
}

impl FrameBuffer {
    /// Allocate `layout.chunk_count()` chunks of `layout.chunk_bytes()` each.
    ///
    /// The chunking here is what [`FrameLayout`] describes to the copier.
    fn allocate(layout: &FrameLayout) -> Result<Self> {
        let mut buffer = FrameBuffer {
            chunks: Vec::new(),
            rows: Vec::new(),
        };
        buffer.chunks.try_reserve_exact(layout.chunk_count())?;
        buffer.rows.try_reserve_exact(layout.lines())?;

        for _ in 0..layout.chunk_count() {
            let mut chunk = Vec::new();
            chunk.try_reserve_exact(layout.chunk_bytes())?;
            chunk.resize(layout.chunk_bytes(), 0u8);
            let raw = Box::into_raw(chunk.into_boxed_slice());
            // SAFETY: Box::into_raw never returns null.
            let chunk = unsafe { NonNull::new_unchecked(raw) };
            let base = chunk.as_ptr() as *mut u8;
            for line in 0..layout.lines_per_chunk() {
                buffer
                    .rows
                    .push(base.wrapping_add(line * layout.line_bytes()));
            }
            buffer.chunks.push(chunk);
        }
        Ok(buffer)
    }

    fn line_table(&self) -> LineTable<'_> {
        // SAFETY: rows point into chunks owned by this buffer, which are freed
        // only when the producer drops it and never move on a swap. Each row
        // spans line_bytes and the scan-out thread never touches them.
        unsafe { LineTable::from_raw_parts(self.rows.as_ptr(), self.rows.len()) }
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        for chunk in self.chunks.drain(..) {
            // SAFETY: each chunk came from Box::into_raw in allocate().
            unsafe { drop(Box::from_raw(chunk.as_ptr())) };
        }
    }
}

/// Software composite video producer.
///
/// Not `Send`: the frame buffers are reached through raw row pointers and are
/// only ever touched from the thread that owns the producer. The scan-out
/// thread shares counters and the front index, nothing else.
pub struct SoftwareProducer {
    options: ProducerOptions,
    buffers: Vec<FrameBuffer>,
    signal: Arc<VBlankSignal>,
    scanout: Option<JoinHandle<()>>,
}

impl SoftwareProducer {
    /// Create a producer. No memory is allocated until [`begin`](VideoProducer::begin).
    pub fn new(options: ProducerOptions) -> Self {
        Self {
            options,
            buffers: Vec::new(),
            signal: Arc::new(VBlankSignal::new()),
            scanout: None,
        }
    }

    pub fn options(&self) -> &ProducerOptions {
        &self.options
    }

    pub fn is_started(&self) -> bool {
        self.scanout.is_some()
    }

    pub fn is_double_buffered(&self) -> bool {
        self.buffers.len() == 2
    }

    fn back_index(&self) -> usize {
        if self.is_double_buffered() {
            self.signal.front() ^ 1
        } else {
            0
        }
    }

    fn line_ptr(&self, buffer: usize, y: usize) -> Option<*mut u8> {
        self.buffers.get(buffer)?.rows.get(y).copied()
    }

    /// Row `y` of the buffer being drawn into.
    pub fn line(&self, y: usize) -> Option<&[u8]> {
        let row = self.line_ptr(self.back_index(), y)?;
        // SAFETY: row spans line_bytes inside a chunk owned by self.
        Some(unsafe { slice::from_raw_parts(row, self.options.layout.line_bytes()) })
    }

    /// Mutable row `y` of the buffer being drawn into.
    pub fn line_mut(&mut self, y: usize) -> Option<&mut [u8]> {
        let row = self.line_ptr(self.back_index(), y)?;
        // SAFETY: as in line(); &mut self makes this the only live view.
        Some(unsafe { slice::from_raw_parts_mut(row, self.options.layout.line_bytes()) })
    }

    /// Row `y` of the buffer currently being scanned out.
    pub fn front_line(&self, y: usize) -> Option<&[u8]> {
        let front = if self.is_double_buffered() {
            self.signal.front()
        } else {
            0
        };
        let row = self.line_ptr(front, y)?;
        // SAFETY: as in line().
        Some(unsafe { slice::from_raw_parts(row, self.options.layout.line_bytes()) })
    }

    fn spawn_scanout(&self, exchange_buffers: bool) -> Result<JoinHandle<()>> {
        let signal = Arc::clone(&self.signal);
        let period = self.options.frame_period;
        let handle = thread::Builder::new()
            .name("scanout".into())
            .spawn(move || {
                let mut deadline = Instant::now() + period;
                while signal.sleep_until(deadline) {
                    signal.tick(exchange_buffers);
                    deadline += period;
                    // Fell behind by more than a frame; resynchronize.
                    let now = Instant::now();
                    if deadline < now {
                        deadline = now + period;
                    }
                }
            })?;
        Ok(handle)
    }
}

impl VideoProducer for SoftwareProducer {
    fn begin(&mut self, double_buffer: bool) -> Result<()> {
        if self.is_started() {
            return Err(Error::InvalidConfiguration(
                "Video producer has already been started".into(),
            ));
        }

        let count = if double_buffer { 2 } else { 1 };
        let mut buffers = Vec::with_capacity(count);
        for _ in 0..count {
            buffers.push(FrameBuffer::allocate(&self.options.layout)?);
        }
        self.buffers = buffers;

        self.signal.start();
        match self.spawn_scanout(double_buffer) {
            Ok(handle) => {
                self.scanout = Some(handle);
                log::debug!(
                    "scan-out started: {:?}, {} buffer(s), period {:?}",
                    self.options.standard,
                    count,
                    self.options.frame_period
                );
                Ok(())
            }
            Err(e) => {
                self.signal.stop();
                self.buffers.clear();
                Err(e)
            }
        }
    }

    fn wait_for_swap(&mut self) {
        if !self.signal.request_swap_and_wait() {
            log::warn!("wait_for_swap called while scan-out is not running");
        }
    }

    fn frame_buffer_lines(&self) -> LineTable<'_> {
        self.buffers
            .get(self.back_index())
            .map(FrameBuffer::line_table)
            .unwrap_or_default()
    }

    fn rendered_frame_count(&self) -> u32 {
        self.signal.frames()
    }

    fn buffer_swap_count(&self) -> u32 {
        self.signal.swaps()
    }

    fn layout(&self) -> FrameLayout {
        self.options.layout
    }
}

impl Drop for SoftwareProducer {
    fn drop(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.scanout.take() {
            if handle.join().is_err() {
                log::error!("scan-out thread panicked");
            }
        }
    }
}

impl fmt::Debug for SoftwareProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareProducer")
            .field("options", &self.options)
            .field("buffers", &self.buffers.len())
            .field("started", &self.is_started())
            .field("rendered_frames", &self.rendered_frame_count())
            .field("buffer_swaps", &self.buffer_swap_count())
            .finish()
    }
}
