//! Buffer continuity across a swap.
//!
//! After a swap the caller draws into a buffer that still holds whatever was
//! drawn two frames ago. Copying the previous buffer forward keeps drawing
//! incremental. The copy moves one contiguous chunk at a time, as laid out by
//! the producer's [`FrameLayout`], instead of one row at a time.

use std::ptr;

use crate::{
    layout::{FrameLayout, LineTable},
    Result,
};

/// Outcome of a continuity copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Every chunk was copied.
    Copied { chunks: usize, bytes: usize },
    /// Both snapshots name the same buffer; there is nothing to copy.
    SameBuffer,
}

/// Copy the contents of the pre-swap buffer into the post-swap buffer.
///
/// Both tables are checked against `layout` before any byte moves, so a
/// table that does not match produces an error and leaves the new buffer
/// untouched. [`FrameSync`](crate::FrameSync) calls this after every swap
/// when copying is enabled.
///
/// # Safety
///
/// The caller must ensure that:
/// - both tables still point into buffers of a live producer
/// - no reference into `new_lines`' row memory is live, and no mutable
///   reference into `old_lines`' row memory is live
///
/// # Errors
///
/// - [`Error::LineTableMismatch`](crate::Error::LineTableMismatch) if either
///   table's row count differs from `layout.lines()`
/// - [`Error::ChunkNotContiguous`](crate::Error::ChunkNotContiguous) if a
///   chunk's rows are not at `line_bytes` stride from its first row
pub unsafe fn copy_after_swap(
    layout: &FrameLayout,
    old_lines: &LineTable<'_>,
    new_lines: &LineTable<'_>,
) -> Result<CopyOutcome> {
    old_lines.check_len(layout)?;
    new_lines.check_len(layout)?;

    if old_lines.same_buffer(new_lines) {
        return Ok(CopyOutcome::SameBuffer);
    }

    for chunk in 0..layout.chunk_count() {
        old_lines.chunk_base(layout, chunk)?;
        new_lines.chunk_base(layout, chunk)?;
    }

    let chunk_bytes = layout.chunk_bytes();
    for chunk in 0..layout.chunk_count() {
        let src = old_lines.chunk_base(layout, chunk)?;
        let dst = new_lines.chunk_base(layout, chunk)?;
        if src == dst {
            continue;
        }
        // SAFETY: each row is valid for line_bytes and the contiguity check
        // extends that to the whole chunk. Buffers never overlap and the
        // caller guarantees no live views into them.
        unsafe {
            ptr::copy_nonoverlapping(src as *const u8, dst, chunk_bytes);
        }
    }

    Ok(CopyOutcome::Copied {
        chunks: layout.chunk_count(),
        bytes: layout.frame_bytes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    /// Two buffers allocated chunk by chunk, with their row tables.
    struct Buffers {
        chunks: Vec<Vec<u8>>,
        old_rows: Vec<*mut u8>,
        new_rows: Vec<*mut u8>,
    }

    fn chunked_buffers(layout: &FrameLayout) -> Buffers {
        let mut chunks: Vec<Vec<u8>> = (0..layout.chunk_count() * 2)
            .map(|_| vec![0u8; layout.chunk_bytes()])
            .collect();
        let mut rows: Vec<Vec<*mut u8>> = vec![Vec::new(), Vec::new()];
        for (idx, chunk) in chunks.iter_mut().enumerate() {
            let buffer = idx / layout.chunk_count();
            for line in 0..layout.lines_per_chunk() {
                rows[buffer].push(chunk.as_mut_ptr().wrapping_add(line * layout.line_bytes()));
            }
        }
        let new_rows = rows.pop().unwrap();
        let old_rows = rows.pop().unwrap();
        Buffers {
            chunks,
            old_rows,
            new_rows,
        }
    }

    #[test]
    fn test_copies_every_chunk() {
        let layout = FrameLayout::new(8, 6, 2).unwrap();
        let mut buffers = chunked_buffers(&layout);
        for (i, chunk) in buffers.chunks[..3].iter_mut().enumerate() {
            for (j, byte) in chunk.iter_mut().enumerate() {
                *byte = (i * 31 + j) as u8;
            }
        }

        let (old, new) = unsafe {
            (
                LineTable::from_raw_parts(buffers.old_rows.as_ptr(), buffers.old_rows.len()),
                LineTable::from_raw_parts(buffers.new_rows.as_ptr(), buffers.new_rows.len()),
            )
        };
        let outcome = unsafe { copy_after_swap(&layout, &old, &new) }.unwrap();

        assert_eq!(
            outcome,
            CopyOutcome::Copied {
                chunks: 3,
                bytes: 48
            }
        );
        for i in 0..3 {
            assert_eq!(buffers.chunks[i], buffers.chunks[i + 3], "chunk {i}");
        }
    }

    #[test]
    fn test_same_buffer_is_noop() {
        let layout = FrameLayout::new(8, 4, 2).unwrap();
        let buffers = chunked_buffers(&layout);
        let table =
            unsafe { LineTable::from_raw_parts(buffers.old_rows.as_ptr(), buffers.old_rows.len()) };
        assert_eq!(
            unsafe { copy_after_swap(&layout, &table, &table) }.unwrap(),
            CopyOutcome::SameBuffer
        );
    }

    #[test]
    fn test_layout_mismatch_leaves_target_untouched() {
        let layout = FrameLayout::new(8, 4, 2).unwrap();
        let mut buffers = chunked_buffers(&layout);
        buffers.chunks[0].fill(0xAA);

        // Claims one row fewer than the layout.
        let (old, short) = unsafe {
            (
                LineTable::from_raw_parts(buffers.old_rows.as_ptr(), 4),
                LineTable::from_raw_parts(buffers.new_rows.as_ptr(), 3),
            )
        };
        match unsafe { copy_after_swap(&layout, &old, &short) } {
            Err(Error::LineTableMismatch {
                expected: 4,
                actual: 3,
            }) => {}
            other => panic!("Expected LineTableMismatch, got {other:?}"),
        }
        assert!(buffers.chunks[2].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fragmented_chunk_is_rejected_before_copying() {
        let layout = FrameLayout::new(8, 4, 2).unwrap();
        let mut buffers = chunked_buffers(&layout);
        buffers.chunks[0].fill(0x55);
        // Split the second chunk of the new buffer across two allocations.
        buffers.new_rows[3] = buffers.chunks[0].as_mut_ptr();

        let (old, new) = unsafe {
            (
                LineTable::from_raw_parts(buffers.old_rows.as_ptr(), 4),
                LineTable::from_raw_parts(buffers.new_rows.as_ptr(), 4),
            )
        };
        match unsafe { copy_after_swap(&layout, &old, &new) } {
            Err(Error::ChunkNotContiguous { chunk: 1, row: 3 }) => {}
            other => panic!("Expected ChunkNotContiguous, got {other:?}"),
        }
        assert!(buffers.chunks[2].iter().all(|&b| b == 0));
    }
}
