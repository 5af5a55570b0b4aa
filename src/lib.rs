//! Terminal interaction utilities: line and password prompts that bracket
//! the terminal in raw mode, and a bounded circular byte pipe for handing
//! input bytes from a producer thread to a consumer thread.
//!
//! The pipe is the load-bearing piece. Writes block while the ring is
//! full and are woken by the read that frees space; reads never block and
//! distinguish "nothing yet" (`Ok(0)`) from the two terminal signals: a
//! graceful end of stream that drains first, and a hard close that
//! discards whatever is still buffered.
//!
//! ```
//! use termpipe::BytePipe;
//!
//! let pipe = BytePipe::with_capacity(8)?;
//! pipe.write(b"hi")?;
//! pipe.finish();
//!
//! let mut buf = [0u8; 8];
//! let n = pipe.read(&mut buf)?;
//! assert_eq!(&buf[..n], b"hi");
//! # Ok::<(), termpipe::PipeError>(())
//! ```
//!
//! The pipe also implements [`std::io::Read`] and [`std::io::Write`], so
//! it can stand in for stdin wherever the prompt helpers accept a
//! buffered reader.

mod error;
mod input;
mod pipe;

pub use error::PipeError;
pub use input::{
    confirm, password, password_with_mask, prompt_line, prompt_line_from, prompt_line_raw,
    wait_for, Answer,
};
pub use pipe::BytePipe;
