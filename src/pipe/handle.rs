/*!
 * Pipe Handle
 * An attached reader/writer with automatic release on drop
 */

use super::channel::PipeChannel;
use super::notify::AsyncNotifier;
use super::types::{IoOptions, OpenFlags, OpenMode, PollMask};
use crate::core::errors::{PipeError, PipeResult};
use crate::core::sync::CancelToken;
use crate::core::types::{HandleId, Size};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Open handle on a [`PipeChannel`]
///
/// Holds one reader and/or writer reference on the channel; the reference is
/// dropped exactly once, by [`close`](Self::close) or on drop. Handles can be
/// shared between threads by reference.
///
/// # Example
///
/// ```rust
/// use scull_pipe::{OpenFlags, PipeChannel, PipeError};
///
/// let channel = PipeChannel::new(8).unwrap();
/// let writer = channel.open(OpenFlags::write_only().nonblocking()).unwrap();
/// writer.write_all(b"1234567").unwrap();
/// assert!(matches!(writer.write(b"8"), Err(PipeError::WouldBlock(_))));
/// writer.close();
/// ```
pub struct PipeHandle {
    id: HandleId,
    channel: Arc<PipeChannel>,
    mode: OpenMode,
    nonblocking: AtomicBool,
    cancel: Option<CancelToken>,
    timeout: Option<Duration>,
    released: AtomicBool,
}

impl std::fmt::Debug for PipeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeHandle")
            .field("id", &self.id)
            .field("device", &self.channel.name())
            .field("mode", &self.mode)
            .field("nonblocking", &self.is_nonblocking())
            .finish()
    }
}

impl PipeHandle {
    pub(super) fn new(channel: Arc<PipeChannel>, flags: OpenFlags, opts: &IoOptions) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            channel,
            mode: flags.mode,
            nonblocking: AtomicBool::new(flags.nonblocking),
            cancel: opts.cancel.clone(),
            timeout: opts.timeout,
            released: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn id(&self) -> HandleId {
        self.id
    }

    #[inline]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn channel(&self) -> &Arc<PipeChannel> {
        &self.channel
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking.load(Ordering::Relaxed)
    }

    /// Switch between blocking and non-blocking transfers
    pub fn set_nonblocking(&self, nonblocking: bool) {
        self.nonblocking.store(nonblocking, Ordering::Relaxed);
    }

    /// Token that interrupts this handle's blocking calls
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Bound every blocking call on this handle
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn options(&self) -> IoOptions {
        IoOptions {
            nonblocking: self.is_nonblocking(),
            cancel: self.cancel.clone(),
            timeout: self.timeout,
        }
    }

    fn check_readable(&self) -> PipeResult<()> {
        if self.mode.can_read() {
            Ok(())
        } else {
            Err(PipeError::BadDescriptor(format!("handle {} is write-only", self.id)))
        }
    }

    fn check_writable(&self) -> PipeResult<()> {
        if self.mode.can_write() {
            Ok(())
        } else {
            Err(PipeError::BadDescriptor(format!("handle {} is read-only", self.id)))
        }
    }

    /// Read into `buf`; `Ok(0)` means no writer is attached
    pub fn read(&self, buf: &mut [u8]) -> PipeResult<Size> {
        self.check_readable()?;
        self.channel.read(buf, &self.options())
    }

    /// Read up to `max` bytes into a caller stream
    pub fn read_to<W: Write + ?Sized>(&self, sink: &mut W, max: Size) -> PipeResult<Size> {
        self.check_readable()?;
        self.channel.read_to(sink, max, &self.options())
    }

    /// Write one contiguous chunk of `data`, possibly short
    pub fn write(&self, data: &[u8]) -> PipeResult<Size> {
        self.check_writable()?;
        self.channel.write(data, &self.options())
    }

    /// Write up to `max` bytes pulled from a caller stream
    pub fn write_from<R: Read + ?Sized>(&self, source: &mut R, max: Size) -> PipeResult<Size> {
        self.check_writable()?;
        self.channel.write_from(source, max, &self.options())
    }

    /// Repeat short writes until all of `data` is accepted
    ///
    /// Stops at the first error; bytes accepted before it stay in the pipe.
    pub fn write_all(&self, mut data: &[u8]) -> PipeResult<Size> {
        self.check_writable()?;
        let opts = self.options();
        let total = data.len();
        while !data.is_empty() {
            let n = self.channel.write(data, &opts)?;
            data = &data[n..];
        }
        Ok(total)
    }

    pub fn poll(&self) -> PollMask {
        self.channel.poll()
    }

    /// Turn async notification on or off for this handle
    pub fn fasync(&self, notifier: Option<Arc<dyn AsyncNotifier>>) {
        match notifier {
            Some(notifier) => self.channel.async_queue().subscribe(self.id, notifier),
            None => {
                self.channel.async_queue().unsubscribe(self.id);
            }
        }
    }

    /// Detach from the channel
    pub fn close(self) {
        drop(self);
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.channel.async_queue().unsubscribe(self.id);
        self.channel.release(self.mode);
    }
}

impl Drop for PipeHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_checks() {
        let channel = PipeChannel::new(16).unwrap();
        let writer = channel.open(OpenFlags::write_only()).unwrap();
        let reader = channel.open(OpenFlags::read_only()).unwrap();

        let mut buf = [0u8; 4];
        assert!(matches!(writer.read(&mut buf), Err(PipeError::BadDescriptor(_))));
        assert!(matches!(reader.write(b"x"), Err(PipeError::BadDescriptor(_))));
    }

    #[test]
    fn test_drop_releases_counts() {
        let channel = PipeChannel::new(16).unwrap();
        {
            let _rw = channel.open(OpenFlags::read_write()).unwrap();
            assert_eq!((channel.readers(), channel.writers()), (1, 1));
        }
        assert_eq!((channel.readers(), channel.writers()), (0, 0));
    }

    #[test]
    fn test_unique_ids() {
        let channel = PipeChannel::new(16).unwrap();
        let a = channel.open(OpenFlags::write_only()).unwrap();
        let b = channel.open(OpenFlags::write_only()).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
