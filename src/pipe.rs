use std::io;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::PipeError;

/// Pipe lifecycle. `Closed` is reachable from every state and wins over
/// `Ended` for all observable outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Both sides active.
    Open,
    /// Producer finished; buffered bytes drain until empty.
    Ended,
    /// Consumer forced shutdown; buffered bytes are unreachable.
    Closed,
}

/// Ring storage plus cursors. One slot stays reserved so that cursor
/// equality always means empty and a write cursor one step (modulo
/// capacity) behind the read cursor always means full; usable capacity
/// is `storage.len() - 1`.
#[derive(Debug)]
struct Ring {
    storage: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
    state: Lifecycle,
}

impl Ring {
    /// Bytes currently buffered and unread.
    fn occupied(&self) -> usize {
        let cap = self.storage.len();
        (cap + self.write_pos - self.read_pos) % cap
    }

    fn free(&self) -> usize {
        self.storage.len() - 1 - self.occupied()
    }

    /// Copy as much of `data` as fits, advancing the write cursor.
    fn push(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free());
        if n == 0 {
            return 0;
        }
        let cap = self.storage.len();
        // Handle wrap-around: copy to the end of storage, then the rest
        // to the beginning.
        let first = n.min(cap - self.write_pos);
        self.storage[self.write_pos..self.write_pos + first].copy_from_slice(&data[..first]);
        self.storage[..n - first].copy_from_slice(&data[first..n]);
        self.write_pos = (self.write_pos + n) % cap;
        n
    }

    /// Move up to `dest.len()` buffered bytes out in FIFO order,
    /// advancing the read cursor.
    fn pop(&mut self, dest: &mut [u8]) -> usize {
        let n = dest.len().min(self.occupied());
        if n == 0 {
            return 0;
        }
        let cap = self.storage.len();
        let first = n.min(cap - self.read_pos);
        dest[..first].copy_from_slice(&self.storage[self.read_pos..self.read_pos + first]);
        dest[first..n].copy_from_slice(&self.storage[..n - first]);
        self.read_pos = (self.read_pos + n) % cap;
        n
    }
}

/// Fixed-capacity single-producer/single-consumer byte pipe.
///
/// A producer appends bytes with [`write`](BytePipe::write), blocking
/// while the ring is full; a consumer drains them in FIFO order with
/// [`read`](BytePipe::read), which never blocks and reports `Ok(0)` when
/// nothing is available yet. The two shutdown signals are distinct:
/// [`finish`](BytePipe::finish) is the producer's graceful end-of-stream
/// (buffered bytes remain readable until drained), while
/// [`close`](BytePipe::close) is a hard stop that makes every subsequent
/// read fail even if bytes are still buffered.
///
/// One mutex guards cursors, storage, and lifecycle together, so the
/// full/empty checks never observe a torn state; a blocked writer parks
/// on a condvar and is woken by the read that frees space. A separate
/// gate serializes whole write calls, so callers that do share the write
/// side cannot interleave their bytes. Ordinary usage is one writing
/// thread and one reading thread around an `Arc<BytePipe>`.
#[derive(Debug)]
pub struct BytePipe {
    ring: Mutex<Ring>,
    space_freed: Condvar,
    write_gate: Mutex<()>,
}

/// Writes interrupted by a shutdown report the bytes they already
/// accepted; the error surfaces only when nothing was accepted.
fn partial(written: usize, err: PipeError) -> Result<usize, PipeError> {
    if written > 0 {
        Ok(written)
    } else {
        Err(err)
    }
}

impl BytePipe {
    /// Create a pipe with the given storage length. Capacities below 2
    /// are rejected: with one slot reserved such a ring could never hold
    /// a byte.
    pub fn with_capacity(capacity: usize) -> Result<Self, PipeError> {
        if capacity < 2 {
            return Err(PipeError::Capacity(capacity));
        }
        Ok(Self {
            ring: Mutex::new(Ring {
                storage: vec![0; capacity].into_boxed_slice(),
                read_pos: 0,
                write_pos: 0,
                state: Lifecycle::Open,
            }),
            space_freed: Condvar::new(),
            write_gate: Mutex::new(()),
        })
    }

    // Cursor updates never panic midway, so a guard recovered from a
    // poisoned lock still holds a consistent ring.
    fn ring(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append `data` to the pipe in order, blocking while the ring is
    /// full until a read frees space or the pipe shuts down.
    ///
    /// Returns the number of bytes accepted. A call interrupted by
    /// [`close`](BytePipe::close) or [`finish`](BytePipe::finish) after
    /// accepting some bytes returns that partial count; the next call
    /// reports [`PipeError::Closed`] or [`PipeError::Ended`]. Accepted
    /// bytes are never dropped.
    pub fn write(&self, data: &[u8]) -> Result<usize, PipeError> {
        let _gate = self.write_gate.lock().unwrap_or_else(|e| e.into_inner());
        let mut ring = self.ring();
        let mut written = 0;
        loop {
            match ring.state {
                Lifecycle::Open => {}
                Lifecycle::Ended => return partial(written, PipeError::Ended),
                Lifecycle::Closed => return partial(written, PipeError::Closed),
            }
            written += ring.push(&data[written..]);
            if written == data.len() {
                return Ok(written);
            }
            ring = self.space_freed.wait(ring).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`write`](BytePipe::write), but gives up once `timeout` has
    /// elapsed without the ring accepting every byte. Bytes accepted
    /// before the deadline are reported as a partial count;
    /// [`PipeError::TimedOut`] surfaces only when none were.
    pub fn write_timeout(&self, data: &[u8], timeout: Duration) -> Result<usize, PipeError> {
        let _gate = self.write_gate.lock().unwrap_or_else(|e| e.into_inner());
        let deadline = Instant::now() + timeout;
        let mut ring = self.ring();
        let mut written = 0;
        loop {
            match ring.state {
                Lifecycle::Open => {}
                Lifecycle::Ended => return partial(written, PipeError::Ended),
                Lifecycle::Closed => return partial(written, PipeError::Closed),
            }
            written += ring.push(&data[written..]);
            if written == data.len() {
                return Ok(written);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return partial(written, PipeError::TimedOut);
            }
            let (guard, _) = self
                .space_freed
                .wait_timeout(ring, remaining)
                .unwrap_or_else(|e| e.into_inner());
            ring = guard;
        }
    }

    /// Fill `dest` with up to `dest.len()` buffered bytes, in the order
    /// they were written. Never blocks.
    ///
    /// `Ok(0)` means nothing is available right now; poll again later.
    /// Once the producer has finished, reads keep draining buffered
    /// bytes and the call after the last byte reports
    /// [`PipeError::Ended`]. After [`close`](BytePipe::close) every read
    /// reports [`PipeError::Closed`] immediately, buffered or not.
    pub fn read(&self, dest: &mut [u8]) -> Result<usize, PipeError> {
        let mut ring = self.ring();
        if ring.state == Lifecycle::Closed {
            return Err(PipeError::Closed);
        }
        let n = ring.pop(dest);
        if n > 0 {
            self.space_freed.notify_one();
            return Ok(n);
        }
        if ring.state == Lifecycle::Ended && !dest.is_empty() {
            return Err(PipeError::Ended);
        }
        Ok(0)
    }

    /// Hard stop. Every subsequent read fails immediately and buffered
    /// bytes become unreachable; a blocked writer wakes and reports its
    /// partial count. Idempotent, and overrides an earlier
    /// [`finish`](BytePipe::finish).
    pub fn close(&self) {
        let mut ring = self.ring();
        ring.state = Lifecycle::Closed;
        self.space_freed.notify_all();
    }

    /// Graceful end-of-stream from the producer: no more bytes will be
    /// accepted, but buffered bytes remain readable until drained.
    /// Idempotent; a no-op after [`close`](BytePipe::close).
    pub fn finish(&self) {
        let mut ring = self.ring();
        if ring.state == Lifecycle::Open {
            ring.state = Lifecycle::Ended;
        }
        self.space_freed.notify_all();
    }

    /// Bytes currently buffered and unread.
    pub fn len(&self) -> usize {
        self.ring().occupied()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free space, in bytes the ring can still accept.
    pub fn free(&self) -> usize {
        self.ring().free()
    }

    /// Total storage length. One slot is reserved, so at most
    /// `capacity() - 1` bytes can be buffered at once.
    pub fn capacity(&self) -> usize {
        self.ring().storage.len()
    }
}

/// Non-blocking reader over a shared pipe.
///
/// Graceful end-of-stream maps to `Ok(0)` as the io contract expects;
/// a forced close maps to [`io::ErrorKind::BrokenPipe`]. Since `Ok(0)`
/// already means end-of-stream here, transient emptiness surfaces as
/// [`io::ErrorKind::WouldBlock`], the non-blocking-reader convention.
impl io::Read for &BytePipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match BytePipe::read(*self, buf) {
            Ok(0) if !buf.is_empty() => Err(io::ErrorKind::WouldBlock.into()),
            Ok(n) => Ok(n),
            Err(PipeError::Ended) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}

impl io::Write for &BytePipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BytePipe::write(*self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for BytePipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut &*self, buf)
    }
}

impl io::Write for BytePipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let pipe = BytePipe::with_capacity(10).unwrap();
        assert_eq!(pipe.len(), 0);
        assert_eq!(pipe.free(), 9);
        assert_eq!(pipe.capacity(), 10);

        assert_eq!(pipe.write(b"hello").unwrap(), 5);
        assert_eq!(pipe.len(), 5);
        assert_eq!(pipe.free(), 4);

        let mut buf = [0u8; 3];
        assert_eq!(pipe.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(pipe.len(), 2);

        let mut buf = [0u8; 5];
        assert_eq!(pipe.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert!(pipe.is_empty());
    }

    #[test]
    fn test_wraparound() {
        let pipe = BytePipe::with_capacity(6).unwrap();
        assert_eq!(pipe.write(b"12345").unwrap(), 5);
        assert_eq!(pipe.free(), 0);

        let mut buf = [0u8; 2];
        assert_eq!(pipe.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"12");

        // The next write crosses the physical end of storage.
        assert_eq!(pipe.write(b"ab").unwrap(), 2);
        assert_eq!(pipe.len(), 5);

        let mut buf = [0u8; 8];
        assert_eq!(pipe.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"345ab");
        assert_eq!(pipe.free(), 5);
    }

    #[test]
    fn test_degenerate_capacity_rejected() {
        assert_eq!(
            BytePipe::with_capacity(0).unwrap_err(),
            PipeError::Capacity(0)
        );
        assert_eq!(
            BytePipe::with_capacity(1).unwrap_err(),
            PipeError::Capacity(1)
        );
        assert!(BytePipe::with_capacity(2).is_ok());
    }

    #[test]
    fn test_empty_read_does_not_block() {
        let pipe = BytePipe::with_capacity(8).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(pipe.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_close_discards_buffered_bytes() {
        let pipe = BytePipe::with_capacity(8).unwrap();
        pipe.write(b"hello").unwrap();
        pipe.close();

        let mut buf = [0u8; 10];
        assert_eq!(pipe.read(&mut buf).unwrap_err(), PipeError::Closed);
        // The cursors themselves are untouched, only unreachable.
        assert_eq!(pipe.len(), 5);
    }

    #[test]
    fn test_finish_drains_then_ends() {
        let pipe = BytePipe::with_capacity(8).unwrap();
        pipe.write(b"hi").unwrap();
        pipe.finish();

        let mut buf = [0u8; 10];
        assert_eq!(pipe.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"hi");
        assert_eq!(pipe.read(&mut buf).unwrap_err(), PipeError::Ended);
    }

    #[test]
    fn test_write_after_shutdown() {
        let pipe = BytePipe::with_capacity(8).unwrap();
        pipe.finish();
        assert_eq!(pipe.write(b"x").unwrap_err(), PipeError::Ended);

        let pipe = BytePipe::with_capacity(8).unwrap();
        pipe.close();
        assert_eq!(pipe.write(b"x").unwrap_err(), PipeError::Closed);
        assert_eq!(pipe.len(), 0);
    }

    #[test]
    fn test_close_wins_over_finish() {
        let pipe = BytePipe::with_capacity(8).unwrap();
        pipe.write(b"hi").unwrap();
        pipe.finish();
        pipe.close();
        let mut buf = [0u8; 4];
        assert_eq!(pipe.read(&mut buf).unwrap_err(), PipeError::Closed);

        // And finish never un-closes.
        let pipe = BytePipe::with_capacity(8).unwrap();
        pipe.close();
        pipe.finish();
        assert_eq!(pipe.write(b"x").unwrap_err(), PipeError::Closed);
    }

    #[test]
    fn test_write_timeout_on_full_ring() {
        let pipe = BytePipe::with_capacity(4).unwrap();
        assert_eq!(pipe.write(b"abc").unwrap(), 3);

        let err = pipe
            .write_timeout(b"d", Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err, PipeError::TimedOut);

        // Nothing was lost or duplicated by the expired wait.
        let mut buf = [0u8; 4];
        assert_eq!(pipe.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn test_write_timeout_reports_partial_count() {
        let pipe = BytePipe::with_capacity(4).unwrap();
        // Three of four fit; the rest times out but the accepted bytes count.
        let n = pipe
            .write_timeout(b"wxyz", Duration::from_millis(10))
            .unwrap();
        assert_eq!(n, 3);

        let mut buf = [0u8; 4];
        assert_eq!(pipe.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"wxy");
    }

    #[test]
    fn test_zero_length_write() {
        let pipe = BytePipe::with_capacity(4).unwrap();
        assert_eq!(pipe.write(b"").unwrap(), 0);
        assert!(pipe.is_empty());
    }
}
