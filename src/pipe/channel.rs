/*!
 * Pipe Channel
 * Blocking open/read/write protocol over a shared ring buffer
 */

use super::handle::PipeHandle;
use super::notify::{AsyncQueue, NotifyBand, NotifyEvent};
use super::ring::{RingBuffer, Span};
use super::types::{IoOptions, OpenFlags, OpenMode, PipeStats, PollMask};
use crate::core::errors::{PipeError, PipeResult};
use crate::core::limits::LOCK_POLL_INTERVAL;
use crate::core::sync::Deadline;
use crate::core::types::Size;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Everything the channel lock protects
struct ChannelState {
    ring: RingBuffer,
    readers: usize,
    writers: usize,
    bytes_read: u64,
    bytes_written: u64,
}

/// Lock and wait conditions, shared with cancellation wakers
struct Shared {
    state: Mutex<ChannelState>,
    /// Data arrived, or the writer count changed
    readable: Condvar,
    /// Space was freed
    writable: Condvar,
}

impl Shared {
    /// Broadcast both conditions under the lock so no waiter can miss it
    fn wake_all(&self) {
        let _state = self.state.lock();
        self.readable.notify_all();
        self.writable.notify_all();
    }
}

/// Byte pipe shared by any number of readers and writers
///
/// All cursor and count mutation happens under one lock. Every blocking
/// point releases the lock while suspended and re-validates its condition
/// after each wakeup, so broadcasts and spurious wakeups are harmless.
///
/// # Example
///
/// ```
/// use scull_pipe::{OpenFlags, PipeChannel};
///
/// let channel = PipeChannel::new(16).unwrap();
/// let writer = channel.open(OpenFlags::write_only()).unwrap();
/// let reader = channel.open(OpenFlags::read_only()).unwrap();
///
/// assert_eq!(writer.write(b"hello").unwrap(), 5);
/// let mut buf = [0u8; 16];
/// let n = reader.read(&mut buf).unwrap();
/// assert_eq!(&buf[..n], b"hello");
/// ```
pub struct PipeChannel {
    name: Arc<str>,
    shared: Arc<Shared>,
    async_queue: AsyncQueue,
    lock_poll_interval: Duration,
}

impl std::fmt::Debug for PipeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("PipeChannel")
            .field("name", &self.name)
            .field("ring", &state.ring)
            .field("readers", &state.readers)
            .field("writers", &state.writers)
            .field("async_subscribers", &self.async_queue.len())
            .finish()
    }
}

impl PipeChannel {
    /// Create an anonymous channel with a `capacity` byte buffer
    pub fn new(capacity: Size) -> PipeResult<Arc<Self>> {
        Self::named("scullpipe", capacity, LOCK_POLL_INTERVAL)
    }

    /// Create a channel; the buffer is allocated here and never again
    pub fn named(
        name: impl Into<Arc<str>>,
        capacity: Size,
        lock_poll_interval: Duration,
    ) -> PipeResult<Arc<Self>> {
        let ring = RingBuffer::new(capacity)?;
        Ok(Arc::new(Self {
            name: name.into(),
            shared: Arc::new(Shared {
                state: Mutex::new(ChannelState {
                    ring,
                    readers: 0,
                    writers: 0,
                    bytes_read: 0,
                    bytes_written: 0,
                }),
                readable: Condvar::new(),
                writable: Condvar::new(),
            }),
            async_queue: AsyncQueue::new(),
            lock_poll_interval,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> Size {
        self.shared.state.lock().ring.capacity()
    }

    pub fn readers(&self) -> usize {
        self.shared.state.lock().readers
    }

    pub fn writers(&self) -> usize {
        self.shared.state.lock().writers
    }

    /// Async subscribers of this channel
    pub fn async_queue(&self) -> &AsyncQueue {
        &self.async_queue
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Attach a reader and/or writer
    ///
    /// A read-only open waits for a writer to attach unless the flags are
    /// non-blocking, in which case it fails with `WouldBlock`.
    pub fn open(self: &Arc<Self>, flags: OpenFlags) -> PipeResult<PipeHandle> {
        self.open_with(flags, &IoOptions::default())
    }

    /// Attach with cancellation and timeout support
    ///
    /// A failed open leaves the reader/writer counts untouched. The token and
    /// timeout in `opts` stay attached to the returned handle for its later
    /// reads and writes.
    pub fn open_with(self: &Arc<Self>, flags: OpenFlags, opts: &IoOptions) -> PipeResult<PipeHandle> {
        let nonblocking = flags.nonblocking || opts.nonblocking;
        let deadline = Deadline::start(opts.timeout);
        let mut state = self.lock(opts, &deadline)?;

        match flags.mode {
            OpenMode::ReadOnly => {
                state.readers += 1;
                while state.writers == 0 {
                    let waited = if nonblocking {
                        Err(PipeError::WouldBlock("no writer attached".to_string()))
                    } else {
                        debug!(device = %self.name, "reader waiting for a writer");
                        self.suspend(&mut state, &self.shared.readable, opts, &deadline)
                    };
                    if let Err(e) = waited {
                        state.readers -= 1;
                        return Err(e);
                    }
                }
            }
            OpenMode::WriteOnly => {
                state.writers += 1;
            }
            OpenMode::ReadWrite => {
                state.readers += 1;
                state.writers += 1;
            }
        }

        let (readers, writers) = (state.readers, state.writers);
        drop(state);

        if flags.mode.can_write() {
            // Readers blocked in open can now proceed
            self.shared.readable.notify_all();
        }

        debug!(
            device = %self.name,
            mode = ?flags.mode,
            readers,
            writers,
            "opened"
        );
        Ok(PipeHandle::new(Arc::clone(self), flags, opts))
    }

    /// Detach a handle opened with `mode`
    ///
    /// Does not touch the buffer. Losing the last writer wakes readers so
    /// they can report end-of-stream.
    pub(crate) fn release(&self, mode: OpenMode) {
        let mut state = self.shared.state.lock();
        if mode.can_read() {
            state.readers = state.readers.saturating_sub(1);
        }
        let last_writer = if mode.can_write() {
            state.writers = state.writers.saturating_sub(1);
            state.writers == 0
        } else {
            false
        };
        let (readers, writers) = (state.readers, state.writers);
        drop(state);

        if last_writer {
            self.shared.readable.notify_all();
        }
        debug!(device = %self.name, mode = ?mode, readers, writers, "released");
    }

    // =========================================================================
    // Data transfer
    // =========================================================================

    /// Read up to `buf.len()` bytes
    ///
    /// Returns `Ok(0)` when no writer is attached. A single call never
    /// crosses the physical end of the buffer, so a short read is normal
    /// while data wraps.
    pub fn read(&self, buf: &mut [u8], opts: &IoOptions) -> PipeResult<Size> {
        let max = buf.len();
        self.read_with(max, opts, |chunk| {
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        })
    }

    /// Read up to `max` bytes straight into `sink`
    ///
    /// The chunk is offered to the sink in a single `write`; only the bytes it
    /// accepts are consumed. A failing sink is reported as `Fault` and
    /// consumes nothing.
    pub fn read_to<W: Write + ?Sized>(
        &self,
        sink: &mut W,
        max: Size,
        opts: &IoOptions,
    ) -> PipeResult<Size> {
        self.read_with(max, opts, |chunk| match sink.write(chunk) {
            Ok(0) => Err(PipeError::Fault("caller buffer accepted no bytes".to_string())),
            Ok(n) => Ok(n),
            Err(e) => Err(PipeError::Fault(format!("copy to caller failed: {}", e))),
        })
    }

    /// Write as much of `data` as fits in one contiguous span
    ///
    /// A short write is normal when the free space wraps; the caller issues
    /// another call for the rest.
    pub fn write(&self, data: &[u8], opts: &IoOptions) -> PipeResult<Size> {
        self.write_with(data.len(), opts, |dst| {
            dst.copy_from_slice(&data[..dst.len()]);
            Ok(dst.len())
        })
    }

    /// Write up to `max` bytes pulled from `source`
    ///
    /// A failing source is reported as `Fault` and commits nothing.
    pub fn write_from<R: Read + ?Sized>(
        &self,
        source: &mut R,
        max: Size,
        opts: &IoOptions,
    ) -> PipeResult<Size> {
        self.write_with(max, opts, |dst| {
            source
                .read(dst)
                .map_err(|e| PipeError::Fault(format!("copy from caller failed: {}", e)))
        })
    }

    fn read_with<F>(&self, max: Size, opts: &IoOptions, copy_out: F) -> PipeResult<Size>
    where
        F: FnOnce(&[u8]) -> PipeResult<Size>,
    {
        if max == 0 {
            return Ok(0);
        }

        let deadline = Deadline::start(opts.timeout);
        let mut state = self.lock(opts, &deadline)?;

        loop {
            if state.writers == 0 {
                trace!(device = %self.name, "no writer attached, end of stream");
                return Ok(0);
            }
            if !state.ring.is_empty() {
                break;
            }
            if opts.nonblocking {
                return Err(PipeError::WouldBlock("no data available".to_string()));
            }
            debug!(device = %self.name, "reader going to sleep");
            self.suspend(&mut state, &self.shared.readable, opts, &deadline)?;
        }

        let span = state.ring.contiguous_readable_span();
        let chunk = Span {
            start: span.start,
            len: max.min(span.len),
        };

        // Cursor only moves past what the copy delivered
        let taken = copy_out(state.ring.slice(chunk))?.min(chunk.len);
        state.ring.advance_read(taken);
        state.bytes_read += taken as u64;
        let buffered = state.ring.len();
        drop(state);

        if taken > 0 {
            self.shared.writable.notify_all();
        }
        trace!(device = %self.name, bytes = taken, buffered, "did read");
        Ok(taken)
    }

    fn write_with<F>(&self, len: Size, opts: &IoOptions, copy_in: F) -> PipeResult<Size>
    where
        F: FnOnce(&mut [u8]) -> PipeResult<Size>,
    {
        if len == 0 {
            return Ok(0);
        }

        let deadline = Deadline::start(opts.timeout);
        let mut state = self.lock(opts, &deadline)?;

        while state.ring.free_space() == 0 {
            if opts.nonblocking {
                return Err(PipeError::WouldBlock("pipe buffer full".to_string()));
            }
            debug!(device = %self.name, "writer going to sleep");
            self.suspend(&mut state, &self.shared.writable, opts, &deadline)?;
        }

        let span = state.ring.contiguous_writable_span();
        let chunk = Span {
            start: span.start,
            len: len.min(state.ring.free_space()).min(span.len),
        };

        let accepted = copy_in(state.ring.slice_mut(chunk))?.min(chunk.len);
        state.ring.advance_write(accepted);
        state.bytes_written += accepted as u64;
        let buffered = state.ring.len();
        drop(state);

        if accepted > 0 {
            self.shared.readable.notify_all();
            self.async_queue.fire(&NotifyEvent {
                device: Arc::clone(&self.name),
                band: NotifyBand::PollIn,
                len: accepted,
            });
        }
        trace!(device = %self.name, bytes = accepted, buffered, "did write");
        Ok(accepted)
    }

    // =========================================================================
    // Readiness & statistics
    // =========================================================================

    /// Current readiness, as reported to an external poller
    pub fn poll(&self) -> PollMask {
        let state = self.shared.state.lock();
        let mut mask = PollMask::empty();
        if !state.ring.is_empty() {
            mask |= PollMask::POLLIN | PollMask::POLLRDNORM;
        }
        if state.ring.free_space() > 0 {
            mask |= PollMask::POLLOUT | PollMask::POLLWRNORM;
        }
        if state.writers == 0 {
            mask |= PollMask::POLLHUP;
        }
        mask
    }

    pub fn stats(&self) -> PipeStats {
        let state = self.shared.state.lock();
        PipeStats {
            capacity: state.ring.capacity(),
            buffered: state.ring.len(),
            free: state.ring.free_space(),
            readers: state.readers,
            writers: state.writers,
            bytes_read: state.bytes_read,
            bytes_written: state.bytes_written,
            async_subscribers: self.async_queue.len(),
        }
    }

    // =========================================================================
    // Locking & suspension
    // =========================================================================

    /// Acquire the channel lock, giving up on cancellation or timeout
    fn lock(&self, opts: &IoOptions, deadline: &Deadline) -> PipeResult<MutexGuard<'_, ChannelState>> {
        if let Some(state) = self.shared.state.try_lock() {
            return Ok(state);
        }
        if opts.cancel.is_none() && opts.timeout.is_none() {
            return Ok(self.shared.state.lock());
        }

        loop {
            if opts.is_cancelled() {
                return Err(PipeError::Interrupted);
            }
            let slice = match deadline.remaining() {
                Some(left) if left.is_zero() => return Err(deadline.error()),
                Some(left) => left.min(self.lock_poll_interval),
                None => self.lock_poll_interval,
            };
            if let Some(state) = self.shared.state.try_lock_for(slice) {
                return Ok(state);
            }
        }
    }

    /// Sleep on `condvar` once, releasing the lock while asleep
    ///
    /// Returns `Ok` after any wakeup; callers re-check their condition.
    fn suspend(
        &self,
        state: &mut MutexGuard<'_, ChannelState>,
        condvar: &Condvar,
        opts: &IoOptions,
        deadline: &Deadline,
    ) -> PipeResult<()> {
        let _registration = opts.cancel.as_ref().map(|token| {
            let shared = Arc::clone(&self.shared);
            token.register_waker(move || shared.wake_all())
        });

        // Checked after registering, so a concurrent cancel either is seen
        // here or wakes us through the waker.
        if opts.is_cancelled() {
            debug!(device = %self.name, "interrupted before sleeping");
            return Err(PipeError::Interrupted);
        }

        if deadline.expired() {
            return Err(deadline.error());
        }
        match deadline.instant() {
            None => condvar.wait(state),
            Some(until) => {
                let _ = condvar.wait_until(state, until);
            }
        }

        if opts.is_cancelled() {
            debug!(device = %self.name, "interrupted while sleeping");
            return Err(PipeError::Interrupted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let channel = PipeChannel::new(32).unwrap();
        let _w = channel.open(OpenFlags::write_only()).unwrap();

        let opts = IoOptions::nonblocking();
        assert_eq!(channel.write(b"abc", &opts).unwrap(), 3);

        let mut buf = [0u8; 8];
        assert_eq!(channel.read(&mut buf, &opts).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn test_read_without_writer_is_eof() {
        let channel = PipeChannel::new(32).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(channel.read(&mut buf, &IoOptions::blocking()).unwrap(), 0);
    }

    #[test]
    fn test_failed_nonblocking_open_rolls_back() {
        let channel = PipeChannel::new(32).unwrap();
        let result = channel.open(OpenFlags::read_only().nonblocking());
        assert!(matches!(result, Err(PipeError::WouldBlock(_))));
        assert_eq!(channel.readers(), 0);
    }

    #[test]
    fn test_sink_fault_consumes_nothing() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "unmapped"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let channel = PipeChannel::new(32).unwrap();
        let _w = channel.open(OpenFlags::write_only()).unwrap();
        channel.write(b"keep", &IoOptions::default()).unwrap();

        let result = channel.read_to(&mut Broken, 4, &IoOptions::default());
        assert!(matches!(result, Err(PipeError::Fault(_))));
        assert_eq!(channel.stats().buffered, 4);
    }

    #[test]
    fn test_poll_mask() {
        let channel = PipeChannel::new(4).unwrap();
        assert!(channel.poll().hung_up());

        let _w = channel.open(OpenFlags::write_only()).unwrap();
        let mask = channel.poll();
        assert!(mask.writable() && !mask.readable() && !mask.hung_up());

        channel.write(b"xyz", &IoOptions::default()).unwrap();
        let mask = channel.poll();
        assert!(mask.readable() && !mask.writable());
    }
}
