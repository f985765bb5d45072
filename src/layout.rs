//! Physical frame buffer layout and line table snapshots.
//!
//! A producer does not hand out one flat buffer. It hands out a table of row
//! base addresses, and the rows are grouped into equally sized chunks that are
//! each one contiguous allocation. The continuity copier moves whole chunks,
//! so the grouping is part of the contract between producer and copier. It is
//! spelled out once in a [`FrameLayout`] that the producer reports and the
//! copier checks against every [`LineTable`] it is given.

use std::{fmt, marker::PhantomData, ptr::NonNull, slice};

use crate::{Error, Result};

/// Row grouping of a frame buffer.
///
/// Invariants (enforced by every constructor): all sizes are non-zero and
/// `lines` is a whole number of chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameLayout {
    line_bytes: usize,
    lines: usize,
    lines_per_chunk: usize,
}

impl FrameLayout {
    /// 256x240 at one byte per pixel, allocated as 15 chunks of 16 lines.
    pub const COMPOSITE: FrameLayout = FrameLayout {
        line_bytes: 256,
        lines: 240,
        lines_per_chunk: 16,
    };

    /// Describe a layout of `lines` rows of `line_bytes` each, allocated in
    /// chunks of `lines_per_chunk` rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLayout`] if any size is zero or `lines` is not
    /// a multiple of `lines_per_chunk`.
    pub fn new(line_bytes: usize, lines: usize, lines_per_chunk: usize) -> Result<Self> {
        if line_bytes == 0 || lines == 0 || lines_per_chunk == 0 {
            return Err(Error::InvalidLayout(format!(
                "sizes must be non-zero (line_bytes={line_bytes}, lines={lines}, lines_per_chunk={lines_per_chunk})"
            )));
        }
        if lines % lines_per_chunk != 0 {
            return Err(Error::InvalidLayout(format!(
                "{lines} lines do not divide into chunks of {lines_per_chunk}"
            )));
        }
        line_bytes
            .checked_mul(lines)
            .ok_or_else(|| Error::InvalidLayout("frame size overflows usize".into()))?;

        Ok(Self {
            line_bytes,
            lines,
            lines_per_chunk,
        })
    }

    pub const fn line_bytes(&self) -> usize {
        self.line_bytes
    }

    pub const fn lines(&self) -> usize {
        self.lines
    }

    pub const fn lines_per_chunk(&self) -> usize {
        self.lines_per_chunk
    }

    pub const fn chunk_count(&self) -> usize {
        self.lines / self.lines_per_chunk
    }

    /// Bytes covered by one contiguous chunk.
    pub const fn chunk_bytes(&self) -> usize {
        self.line_bytes * self.lines_per_chunk
    }

    pub const fn frame_bytes(&self) -> usize {
        self.line_bytes * self.lines
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::COMPOSITE
    }
}

/// Snapshot of a producer's row table for its currently active buffer.
///
/// The table borrows the producer that issued it, so it cannot outlive the
/// buffers it points into, and the producer cannot be mutated while it is
/// held. It keeps naming the same buffer after a swap.
///
/// ```compile_fail
/// use composite_framesync::{ProducerOptions, SoftwareProducer, VideoProducer};
///
/// let table = {
///     let producer = SoftwareProducer::new(ProducerOptions::default());
///     producer.frame_buffer_lines()
/// };
/// assert!(table.is_empty());
/// ```
///
/// ```compile_fail
/// use composite_framesync::{ProducerOptions, SoftwareProducer, VideoProducer};
///
/// let mut producer = SoftwareProducer::new(ProducerOptions::default());
/// let table = producer.frame_buffer_lines();
/// producer.wait_for_swap();
/// assert!(table.is_empty());
/// ```
#[derive(Clone, Copy)]
pub struct LineTable<'a> {
    rows: NonNull<*mut u8>,
    len: usize,
    _producer: PhantomData<&'a ()>,
}

impl<'a> LineTable<'a> {
    /// A table with no rows, for producers that expose no buffer memory.
    pub const fn empty() -> Self {
        Self {
            rows: NonNull::dangling(),
            len: 0,
            _producer: PhantomData,
        }
    }

    /// Build a table from a producer's row pointer array.
    ///
    /// # Safety
    ///
    /// The caller must ensure that, until the issuing producer is dropped
    /// (not only for `'a`):
    /// - `rows` points to `len` initialized row pointers (it may be null only
    ///   if `len` is 0)
    /// - every row pointer is valid for reads and writes of the producer's
    ///   `layout().line_bytes()` bytes, and buffer swaps never move or free them
    /// - rows belonging to different buffers never overlap
    /// - row memory is only reached through the producer's own `&self` and
    ///   `&mut self` methods, never from another thread
    pub unsafe fn from_raw_parts(rows: *const *mut u8, len: usize) -> Self {
        match NonNull::new(rows as *mut *mut u8) {
            Some(rows) => Self {
                rows,
                len,
                _producer: PhantomData,
            },
            None => {
                debug_assert_eq!(len, 0, "null row table with non-zero length");
                Self::empty()
            }
        }
    }

    /// Release the borrow on the producer.
    ///
    /// # Safety
    ///
    /// The caller must not use the result after the issuing producer is
    /// dropped, and must not write through it while any reference into the
    /// producer's row memory is live.
    pub(crate) unsafe fn detach<'b>(self) -> LineTable<'b> {
        LineTable {
            rows: self.rows,
            len: self.len,
            _producer: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The row base addresses, in scan order.
    pub fn rows(&self) -> &[*mut u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: from_raw_parts guarantees `len` initialized pointers.
        unsafe { slice::from_raw_parts(self.rows.as_ptr(), self.len) }
    }

    /// Address of the first row. Identifies the buffer without borrowing it.
    pub fn first_row(&self) -> Option<*const u8> {
        self.rows().first().map(|&row| row as *const u8)
    }

    /// Whether both snapshots describe the same buffer.
    pub fn same_buffer(&self, other: &LineTable<'_>) -> bool {
        self.len == other.len && self.first_row() == other.first_row()
    }

    /// Base address of `chunk`, after checking that the table matches
    /// `layout` and the chunk's rows are contiguous.
    pub(crate) fn chunk_base(&self, layout: &FrameLayout, chunk: usize) -> Result<*mut u8> {
        self.check_len(layout)?;

        let first = chunk * layout.lines_per_chunk();
        let rows = &self.rows()[first..first + layout.lines_per_chunk()];
        let base = rows[0];
        for (offset, &row) in rows.iter().enumerate().skip(1) {
            if row != base.wrapping_add(offset * layout.line_bytes()) {
                return Err(Error::ChunkNotContiguous {
                    chunk,
                    row: first + offset,
                });
            }
        }
        Ok(base)
    }

    pub(crate) fn check_len(&self, layout: &FrameLayout) -> Result<()> {
        if self.len != layout.lines() {
            return Err(Error::LineTableMismatch {
                expected: layout.lines(),
                actual: self.len,
            });
        }
        Ok(())
    }
}

impl Default for LineTable<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for LineTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineTable")
            .field("len", &self.len)
            .field("first_row", &self.first_row())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_layout_geometry() {
        let layout = FrameLayout::COMPOSITE;
        assert_eq!(layout.chunk_count(), 15);
        assert_eq!(layout.chunk_bytes(), 256 * 16);
        assert_eq!(layout.frame_bytes(), 256 * 240);
        assert_eq!(FrameLayout::new(256, 240, 16).unwrap(), layout);
    }

    #[test]
    fn test_layout_rejects_ragged_chunks() {
        match FrameLayout::new(256, 240, 7) {
            Err(Error::InvalidLayout(msg)) => assert!(msg.contains("do not divide")),
            other => panic!("Expected InvalidLayout, got {other:?}"),
        }
    }

    #[test]
    fn test_layout_rejects_zero_sizes() {
        assert!(FrameLayout::new(0, 240, 16).is_err());
        assert!(FrameLayout::new(256, 0, 16).is_err());
        assert!(FrameLayout::new(256, 240, 0).is_err());
    }

    #[test]
    fn test_empty_table() {
        let table = LineTable::empty();
        assert!(table.is_empty());
        assert!(table.rows().is_empty());
        assert!(matches!(
            table.check_len(&FrameLayout::COMPOSITE),
            Err(Error::LineTableMismatch {
                expected: 240,
                actual: 0
            })
        ));
    }

    #[test]
    fn test_chunk_base_detects_gap() {
        let layout = FrameLayout::new(4, 4, 2).unwrap();
        let mut memory = vec![0u8; 32];
        let base = memory.as_mut_ptr();
        // Chunk 1 has its second row displaced by one line.
        let rows: Vec<*mut u8> = vec![
            base,
            base.wrapping_add(4),
            base.wrapping_add(16),
            base.wrapping_add(24),
        ];
        let table = unsafe { LineTable::from_raw_parts(rows.as_ptr(), rows.len()) };

        assert_eq!(table.chunk_base(&layout, 0).unwrap(), base);
        match table.chunk_base(&layout, 1) {
            Err(Error::ChunkNotContiguous { chunk: 1, row: 3 }) => {}
            other => panic!("Expected ChunkNotContiguous, got {other:?}"),
        }
    }

    #[test]
    fn test_same_buffer() {
        let mut a = vec![0u8; 8];
        let mut b = vec![0u8; 8];
        let rows_a = vec![a.as_mut_ptr()];
        let rows_a2 = vec![a.as_mut_ptr()];
        let rows_b = vec![b.as_mut_ptr()];
        let (ta, ta2, tb) = unsafe {
            (
                LineTable::from_raw_parts(rows_a.as_ptr(), 1),
                LineTable::from_raw_parts(rows_a2.as_ptr(), 1),
                LineTable::from_raw_parts(rows_b.as_ptr(), 1),
            )
        };
        assert!(ta.same_buffer(&ta2));
        assert!(!ta.same_buffer(&tb));
        assert_eq!(ta.first_row(), Some(a.as_ptr()));
        assert_eq!(LineTable::empty().first_row(), None);
    }
}
