/*!
 * Ring Buffer
 * Fixed-capacity byte store with wrap-aware span computation
 */

use crate::core::errors::{PipeError, PipeResult};
use crate::core::limits::MIN_PIPE_BUFFER;
use crate::core::types::Size;
use std::ops::Range;

/// Contiguous region of the storage array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Circular byte buffer addressed by a read and a write cursor
///
/// One slot is always left unused: the buffer is empty when both cursors are
/// equal and full when advancing the write cursor would make them equal, so
/// a buffer of capacity `C` holds at most `C - 1` bytes.
///
/// The buffer does no locking of its own; the owning channel serializes all
/// access.
pub struct RingBuffer {
    storage: Box<[u8]>,
    read: usize,
    write: usize,
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("read", &self.read)
            .field("write", &self.write)
            .field("buffered", &self.len())
            .finish()
    }
}

impl RingBuffer {
    /// Allocate a zeroed buffer of `capacity` bytes
    ///
    /// Allocation failure is reported instead of aborting so that device
    /// setup can unwind cleanly.
    pub fn new(capacity: Size) -> PipeResult<Self> {
        if capacity < MIN_PIPE_BUFFER {
            return Err(PipeError::InvalidArgument(format!(
                "ring buffer capacity {} is below the minimum of {}",
                capacity, MIN_PIPE_BUFFER
            )));
        }

        let mut storage = Vec::new();
        storage.try_reserve_exact(capacity).map_err(|e| {
            PipeError::AllocationFailed(format!("{} byte pipe buffer: {}", capacity, e))
        })?;
        storage.resize(capacity, 0u8);

        Ok(Self {
            storage: storage.into_boxed_slice(),
            read: 0,
            write: 0,
        })
    }

    /// Physical size of the storage array
    #[inline]
    pub fn capacity(&self) -> Size {
        self.storage.len()
    }

    /// Bytes currently stored
    #[inline]
    pub fn len(&self) -> Size {
        (self.write + self.capacity() - self.read) % self.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_space() == 0
    }

    /// Bytes that can still be written
    #[inline]
    pub fn free_space(&self) -> Size {
        (self.read + self.capacity() - self.write - 1) % self.capacity()
    }

    #[inline]
    pub fn read_cursor(&self) -> usize {
        self.read
    }

    #[inline]
    pub fn write_cursor(&self) -> usize {
        self.write
    }

    /// Largest run of stored bytes starting at the read cursor
    ///
    /// When the data wraps, only the part up to the physical end is returned;
    /// the remainder becomes visible after [`advance_read`](Self::advance_read).
    pub fn contiguous_readable_span(&self) -> Span {
        let len = if self.write >= self.read {
            self.write - self.read
        } else {
            self.capacity() - self.read
        };
        Span {
            start: self.read,
            len,
        }
    }

    /// Largest run of free bytes starting at the write cursor
    ///
    /// Stops at the physical end, and never reaches the slot right before the
    /// read cursor.
    pub fn contiguous_writable_span(&self) -> Span {
        let len = if self.write >= self.read {
            // Filling up to the end is only allowed if the read cursor is not
            // sitting at slot 0, otherwise the buffer would look empty.
            let to_end = self.capacity() - self.write;
            if self.read == 0 {
                to_end - 1
            } else {
                to_end
            }
        } else {
            self.read - self.write - 1
        };
        Span {
            start: self.write,
            len,
        }
    }

    /// Stored bytes of `span`, as returned by `contiguous_readable_span`
    #[inline]
    pub fn slice(&self, span: Span) -> &[u8] {
        &self.storage[span.range()]
    }

    /// Free bytes of `span`, as returned by `contiguous_writable_span`
    #[inline]
    pub fn slice_mut(&mut self, span: Span) -> &mut [u8] {
        &mut self.storage[span.range()]
    }

    /// Consume `n` bytes from the read side
    pub fn advance_read(&mut self, n: Size) {
        debug_assert!(n <= self.contiguous_readable_span().len);
        self.read = (self.read + n) % self.capacity();
    }

    /// Commit `n` bytes on the write side
    pub fn advance_write(&mut self, n: Size) {
        debug_assert!(n <= self.contiguous_writable_span().len);
        self.write = (self.write + n) % self.capacity();
    }

    /// Copy as much of `data` as fits in one contiguous span
    ///
    /// Returns the number of bytes accepted, which is short when the write
    /// would have to wrap.
    pub fn push_span(&mut self, data: &[u8]) -> Size {
        let span = self.contiguous_writable_span();
        let n = data.len().min(self.free_space()).min(span.len);
        self.storage[span.start..span.start + n].copy_from_slice(&data[..n]);
        self.advance_write(n);
        n
    }

    /// Copy out up to `buf.len()` bytes from one contiguous span
    pub fn pop_span(&mut self, buf: &mut [u8]) -> Size {
        let span = self.contiguous_readable_span();
        let n = buf.len().min(span.len);
        buf[..n].copy_from_slice(&self.storage[span.start..span.start + n]);
        self.advance_read(n);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_accounting(ring: &RingBuffer) {
        assert_eq!(ring.free_space() + ring.len(), ring.capacity() - 1);
    }

    #[test]
    fn test_new_is_empty() {
        let ring = RingBuffer::new(8).unwrap();
        assert!(ring.is_empty());
        assert_eq!(ring.free_space(), 7);
        assert_eq!(ring.contiguous_readable_span().len, 0);
        assert_eq!(ring.contiguous_writable_span(), Span { start: 0, len: 7 });
    }

    #[test]
    fn test_rejects_capacity_one() {
        assert!(matches!(
            RingBuffer::new(1),
            Err(PipeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_fill_then_full() {
        let mut ring = RingBuffer::new(8).unwrap();
        assert_eq!(ring.push_span(b"ABCDEFGH"), 7);
        assert!(ring.is_full());
        assert_eq!(ring.contiguous_writable_span().len, 0);
        assert_eq!(ring.push_span(b"Z"), 0);
        assert_accounting(&ring);
    }

    #[test]
    fn test_writable_span_stops_before_reader() {
        let mut ring = RingBuffer::new(8).unwrap();
        ring.push_span(b"ABCDEFG");
        let mut out = [0u8; 3];
        ring.pop_span(&mut out);

        // read=3, write=7: only the last physical slot is contiguous
        assert_eq!(ring.contiguous_writable_span(), Span { start: 7, len: 1 });
        assert_eq!(ring.push_span(b"XY"), 1);

        // write wrapped to 0: may fill slots 0..2, leaving slot 2 free
        assert_eq!(ring.write_cursor(), 0);
        assert_eq!(ring.contiguous_writable_span(), Span { start: 0, len: 2 });
        assert_accounting(&ring);
    }

    #[test]
    fn test_readable_span_wraps_in_two_calls() {
        let mut ring = RingBuffer::new(8).unwrap();
        ring.push_span(b"ABCDEFG");
        let mut out = [0u8; 5];
        assert_eq!(ring.pop_span(&mut out), 5);
        ring.push_span(b"H");
        ring.push_span(b"IJ");

        // read=5, write=2: first span runs to the physical end
        assert_eq!(ring.contiguous_readable_span(), Span { start: 5, len: 3 });
        let mut out = [0u8; 8];
        assert_eq!(ring.pop_span(&mut out), 3);
        assert_eq!(&out[..3], b"FGH");
        assert_eq!(ring.pop_span(&mut out), 2);
        assert_eq!(&out[..2], b"IJ");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_free_space_formula_all_cursor_pairs() {
        let mut ring = RingBuffer::new(5).unwrap();
        for read in 0..5 {
            for write in 0..5 {
                ring.read = read;
                ring.write = write;
                assert_eq!(ring.free_space(), (read + 5 - write - 1) % 5);
                assert_accounting(&ring);
                let span = ring.contiguous_writable_span();
                assert!(span.len <= ring.free_space());
                assert!(span.start + span.len <= 5);
            }
        }
    }
}
