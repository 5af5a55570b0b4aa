// src/error.rs

use std::fmt;
use std::io;

/// Error type for `BytePipe` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeError {
    /// The requested capacity cannot hold a single byte, because one slot
    /// of the ring is reserved to tell full from empty.
    Capacity(usize),
    /// The consumer closed the pipe. Buffered bytes are unreachable.
    Closed,
    /// The producer finished and the ring has drained.
    Ended,
    /// A bounded wait for free space expired before any byte was accepted.
    TimedOut,
}

impl fmt::Display for PipeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeError::Capacity(n) => {
                write!(f, "capacity {} is too small, need at least 2", n)
            }
            PipeError::Closed => write!(f, "pipe was closed"),
            PipeError::Ended => write!(f, "pipe reached end of stream"),
            PipeError::TimedOut => write!(f, "timed out waiting for free space"),
        }
    }
}

impl std::error::Error for PipeError {}

impl From<PipeError> for io::Error {
    fn from(err: PipeError) -> Self {
        let kind = match err {
            PipeError::Capacity(_) => io::ErrorKind::InvalidInput,
            PipeError::Closed | PipeError::Ended => io::ErrorKind::BrokenPipe,
            PipeError::TimedOut => io::ErrorKind::TimedOut,
        };
        io::Error::new(kind, err)
    }
}
