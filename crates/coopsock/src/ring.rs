//! Per-socket buffers
//!
//! `RecvRing` is a fixed-capacity circular buffer filled by receive
//! completions and drained by `recv()`. Its fill level is tracked in an
//! explicit `len` because `read == write` means both "empty" and "full".
//!
//! `SendBuffer` is linear: `send()` copies the whole payload in, the
//! bridge confirms it piecewise as the engine reports partial transfers.

/// Receive ring
pub struct RecvRing {
    buf: Box<[u8]>,
    read: usize,
    write: usize,
    len: usize,
}

impl RecvRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            read: 0,
            write: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Buffered bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    #[inline]
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Free bytes reachable from the write cursor without wrapping
    ///
    /// This is the size of the next receive request.
    #[inline]
    pub fn contiguous_free(&self) -> usize {
        self.free().min(self.capacity() - self.write)
    }

    #[inline]
    pub fn read_cursor(&self) -> usize {
        self.read
    }

    #[inline]
    pub fn write_cursor(&self) -> usize {
        self.write
    }

    /// Append as much of `data` as fits; returns the bytes taken
    pub fn push(&mut self, data: &[u8]) -> usize {
        let cap = self.capacity();
        let n = data.len().min(self.free());
        if n == 0 {
            return 0;
        }

        let first = n.min(cap - self.write);
        self.buf[self.write..self.write + first].copy_from_slice(&data[..first]);
        if first < n {
            self.buf[..n - first].copy_from_slice(&data[first..n]);
        }

        self.write = (self.write + n) % cap;
        self.len += n;
        n
    }

    /// Move up to `out.len()` bytes out of the ring, oldest first
    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let cap = self.capacity();
        let n = out.len().min(self.len);
        if n == 0 {
            return 0;
        }

        let first = n.min(cap - self.read);
        out[..first].copy_from_slice(&self.buf[self.read..self.read + first]);
        if first < n {
            out[first..n].copy_from_slice(&self.buf[..n - first]);
        }

        self.read = (self.read + n) % cap;
        self.len -= n;
        if self.len == 0 {
            // Empty: rewind so the next fill starts contiguous
            self.read = 0;
            self.write = 0;
        }
        n
    }

    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.len = 0;
    }
}

/// Linear send buffer
///
/// `submitted` bytes were handed over by `send()`; `confirmed` of them
/// have been reported transferred by the engine.
pub struct SendBuffer {
    buf: Box<[u8]>,
    submitted: usize,
    confirmed: usize,
}

impl SendBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            submitted: 0,
            confirmed: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Copy a whole payload in. Fails without copying when it does not fit.
    pub fn load(&mut self, data: &[u8]) -> bool {
        if data.len() > self.capacity() {
            return false;
        }
        self.buf[..data.len()].copy_from_slice(data);
        self.submitted = data.len();
        self.confirmed = 0;
        true
    }

    /// Bytes not yet confirmed
    #[inline]
    pub fn pending(&self) -> &[u8] {
        &self.buf[self.confirmed..self.submitted]
    }

    /// Record `n` transferred bytes; returns `true` once everything is out
    pub fn confirm(&mut self, n: usize) -> bool {
        self.confirmed = (self.confirmed + n).min(self.submitted);
        self.is_idle()
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.confirmed == self.submitted
    }

    #[inline]
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    #[inline]
    pub fn confirmed(&self) -> usize {
        self.confirmed
    }

    pub fn reset(&mut self) {
        self.submitted = 0;
        self.confirmed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_fifo() {
        let mut ring = RecvRing::new(8);
        assert_eq!(ring.push(b"abc"), 3);
        assert_eq!(ring.len(), 3);

        let mut out = [0u8; 8];
        assert_eq!(ring.pop_into(&mut out), 3);
        assert_eq!(&out[..3], b"abc");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_split_across_wrap() {
        // 4 bytes before the wrap point, 1 after
        let mut ring = RecvRing::new(8);
        ring.push(b"xxxxhell");
        let mut sink = [0u8; 4];
        ring.pop_into(&mut sink);
        assert_eq!(ring.read_cursor(), 4);

        assert_eq!(ring.push(b"o"), 1);
        assert_eq!(ring.write_cursor(), 1);

        let mut out = [0u8; 10];
        assert_eq!(ring.pop_into(&mut out), 5);
        assert_eq!(&out[..5], b"hello");
    }

    #[test]
    fn test_ring_rewinds_when_drained() {
        let mut ring = RecvRing::new(8);
        ring.push(b"abcde");
        let mut out = [0u8; 8];
        assert_eq!(ring.pop_into(&mut out), 5);

        assert_eq!(ring.read_cursor(), 0);
        assert_eq!(ring.write_cursor(), 0);
        assert_eq!(ring.contiguous_free(), 8);
    }

    #[test]
    fn test_ring_full_vs_empty() {
        let mut ring = RecvRing::new(4);
        ring.push(b"ab");
        let mut out = [0u8; 2];
        ring.pop_into(&mut out);
        assert_eq!(ring.push(b"wxyz"), 4);

        assert_eq!(ring.read_cursor(), ring.write_cursor());
        assert!(ring.is_full());
        assert_eq!(ring.free(), 0);
        assert_eq!(ring.push(b"!"), 0);
    }

    #[test]
    fn test_ring_contiguous_free() {
        let mut ring = RecvRing::new(8);
        assert_eq!(ring.contiguous_free(), 8);

        ring.push(b"abcdef");
        let mut out = [0u8; 4];
        ring.pop_into(&mut out);
        // write=6, read=4: 6 free but only 2 before the end
        assert_eq!(ring.free(), 6);
        assert_eq!(ring.contiguous_free(), 2);

        ring.push(b"gh");
        assert_eq!(ring.write_cursor(), 0);
        assert_eq!(ring.contiguous_free(), 4);
    }

    #[test]
    fn test_ring_partial_pop() {
        let mut ring = RecvRing::new(6);
        ring.push(b"abcdef");
        let mut out = [0u8; 4];
        assert_eq!(ring.pop_into(&mut out), 4);
        assert_eq!(&out, b"abcd");
        assert_eq!(ring.len(), 2);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.read_cursor(), 0);
    }

    #[test]
    fn test_send_buffer_confirm() {
        let mut sb = SendBuffer::new(10);
        assert!(sb.load(b"0123456789"));
        assert!(!sb.is_idle());

        assert!(!sb.confirm(4));
        assert_eq!(sb.pending(), b"456789");
        assert!(sb.confirm(6));
        assert!(sb.pending().is_empty());
    }

    #[test]
    fn test_send_buffer_too_large() {
        let mut sb = SendBuffer::new(4);
        assert!(!sb.load(b"12345"));
        assert_eq!(sb.submitted(), 0);
        assert!(sb.is_idle());
    }

    #[test]
    fn test_send_buffer_overconfirm_clamps() {
        let mut sb = SendBuffer::new(4);
        sb.load(b"ab");
        assert!(sb.confirm(10));
        assert_eq!(sb.confirmed(), 2);
        sb.reset();
        assert_eq!(sb.submitted(), 0);
    }
}
