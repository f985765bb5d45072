//! Error types for the composite-framesync library.

use std::collections::TryReserveError;
use std::io;
use thiserror::Error;

use crate::counter::Cycles;

/// The main error type for frame producer and monitor operations.
///
/// None of these escape [`FrameSync::wait_for_frame`](crate::FrameSync::wait_for_frame)
/// or [`FrameSync::performance_number`](crate::FrameSync::performance_number);
/// those paths log and carry on. They surface from construction, setup and
/// the standalone copier.
#[derive(Debug, Error)]
pub enum Error {
    /// The video producer could not allocate its frame buffers.
    ///
    /// This is fatal for the producer; it is reported once and never retried.
    #[error("Video signal generator allocation failed: {0}")]
    AllocationFailed(String),

    /// A frame layout descriptor is malformed (zero sizes, or lines that do
    /// not divide evenly into chunks).
    #[error("Invalid frame layout: {0}")]
    InvalidLayout(String),

    /// A line table does not hold the number of rows the layout describes.
    #[error("Line table holds {actual} rows, layout expects {expected}")]
    LineTableMismatch { expected: usize, actual: usize },

    /// The rows of a chunk are not laid out contiguously in memory.
    #[error("Rows of chunk {chunk} are not contiguous at row {row}")]
    ChunkNotContiguous { chunk: usize, row: usize },

    /// Configuration parameters are invalid.
    ///
    /// This can occur when builder validation fails or conflicting options are set.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// I/O operation failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Error::AllocationFailed(err.to_string())
    }
}

/// Structurally impossible session states, detected when a
/// session is closed.
///
/// A fault suppresses the derived report but never the session reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionFault {
    #[error("Performance end time {end} is earlier than start time {start}")]
    EndBeforeStart { start: Cycles, end: Cycles },

    #[error("Overall time duration {elapsed} is less than tally of wait times {tally}")]
    TallyExceedsElapsed { elapsed: Cycles, tally: Cycles },
}
