//! Inbound buffer
//!
//! FIFO of decoded bytes received from the peer. Appends never fail: a full
//! buffer drops its oldest [`EVICT_BLOCK`] bytes to make room, trading a few
//! lost bytes per overflow for not shifting the buffer on every byte.

use heapless::Vec;

use crate::config::{EVICT_BLOCK, IN_CAPACITY, IN_TOTAL};
use crate::error::TransportError;

/// Decoded bytes waiting to be read by the foreground
#[derive(Debug, Clone, Default)]
pub struct InboundBuffer {
    data: Vec<u8, IN_TOTAL>,
}

impl InboundBuffer {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Number of unread bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing is waiting to be read
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Unread bytes, oldest first
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Append a decoded byte
    ///
    /// Returns the number of bytes evicted to make room. At most one block
    /// goes per append, even when requeued bytes sit in the margin.
    pub fn push(&mut self, byte: u8) -> usize {
        let mut evicted = 0;
        if self.data.len() >= IN_CAPACITY {
            self.drain_front(EVICT_BLOCK);
            evicted = EVICT_BLOCK;
        }
        // At most IN_TOTAL - EVICT_BLOCK bytes remain, the push cannot fail
        let _ = self.data.push(byte);
        evicted
    }

    /// Move up to `dest.len()` bytes from the front into `dest`
    ///
    /// Returns the number of bytes copied.
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let count = dest.len().min(self.data.len());
        dest[..count].copy_from_slice(&self.data[..count]);
        self.drain_front(count);
        count
    }

    /// Move one line, up to and including `delimiter`, into `dest`
    ///
    /// Returns `None` without consuming anything if no complete line is
    /// buffered. A line longer than `dest` is truncated to `dest.len()`
    /// bytes; the rest stays buffered for the next call.
    pub fn read_line(&mut self, dest: &mut [u8], delimiter: u8) -> Option<usize> {
        let end = self.data.iter().position(|&b| b == delimiter)? + 1;
        let count = end.min(dest.len());
        dest[..count].copy_from_slice(&self.data[..count]);
        self.drain_front(count);
        Some(count)
    }

    /// Put bytes back in front of the unread data
    ///
    /// Refused if the result would not fit in the buffer including its
    /// emergency margin; nothing is evicted to make room.
    pub fn requeue(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if bytes.len() + self.data.len() > IN_TOTAL {
            return Err(TransportError::RequeueRejected);
        }

        let old_len = self.data.len();
        // Length checked above
        let _ = self.data.resize(old_len + bytes.len(), 0);
        self.data.copy_within(..old_len, bytes.len());
        self.data[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn drain_front(&mut self, count: usize) {
        let count = count.min(self.data.len());
        let remaining = self.data.len() - count;
        self.data.copy_within(count.., 0);
        self.data.truncate(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IN_MARGIN;

    fn filled(count: usize) -> InboundBuffer {
        let mut buffer = InboundBuffer::new();
        for i in 0..count {
            buffer.push(i as u8);
        }
        buffer
    }

    #[test]
    fn test_push_and_read_in_order() {
        let mut buffer = InboundBuffer::new();
        for b in b"hello" {
            assert_eq!(buffer.push(*b), 0);
        }

        let mut dest = [0u8; 3];
        assert_eq!(buffer.read(&mut dest), 3);
        assert_eq!(&dest, b"hel");
        assert_eq!(buffer.as_slice(), b"lo");
    }

    #[test]
    fn test_read_more_than_available() {
        let mut buffer = filled(2);
        let mut dest = [0xAAu8; 8];
        assert_eq!(buffer.read(&mut dest), 2);
        assert_eq!(&dest[..3], &[0, 1, 0xAA]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_overflow_evicts_oldest_block() {
        let mut buffer = filled(IN_CAPACITY);
        assert_eq!(buffer.len(), IN_CAPACITY);

        assert_eq!(buffer.push(0xEE), EVICT_BLOCK);
        assert_eq!(buffer.len(), IN_CAPACITY - EVICT_BLOCK + 1);
        // The EVICT_BLOCK oldest bytes are gone
        assert_eq!(buffer.as_slice()[0], EVICT_BLOCK as u8);
        assert_eq!(*buffer.as_slice().last().unwrap(), 0xEE);
    }

    #[test]
    fn test_read_line_found() {
        let mut buffer = InboundBuffer::new();
        for b in b"ab\ncd" {
            buffer.push(*b);
        }

        let mut dest = [0u8; 16];
        assert_eq!(buffer.read_line(&mut dest, b'\n'), Some(3));
        assert_eq!(&dest[..3], b"ab\n");
        assert_eq!(buffer.as_slice(), b"cd");
    }

    #[test]
    fn test_read_line_missing_consumes_nothing() {
        let mut buffer = InboundBuffer::new();
        for b in b"no newline" {
            buffer.push(*b);
        }

        let mut dest = [0u8; 16];
        assert_eq!(buffer.read_line(&mut dest, b'\n'), None);
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_read_line_truncated_to_dest() {
        let mut buffer = InboundBuffer::new();
        for b in b"abcdef\n" {
            buffer.push(*b);
        }

        let mut dest = [0u8; 4];
        assert_eq!(buffer.read_line(&mut dest, b'\n'), Some(4));
        assert_eq!(&dest, b"abcd");
        assert_eq!(buffer.read_line(&mut dest, b'\n'), Some(3));
        assert_eq!(&dest[..3], b"ef\n");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_requeue_prepends() {
        let mut buffer = InboundBuffer::new();
        buffer.push(b'c');
        buffer.push(b'd');

        assert_eq!(buffer.requeue(b"ab"), Ok(()));
        assert_eq!(buffer.as_slice(), b"abcd");
    }

    #[test]
    fn test_requeue_may_use_margin() {
        let mut buffer = filled(IN_CAPACITY);
        assert_eq!(buffer.requeue(&[0xAB; IN_MARGIN]), Ok(()));
        assert_eq!(buffer.len(), IN_TOTAL);
        assert_eq!(buffer.as_slice()[IN_MARGIN], 0);
    }

    #[test]
    fn test_requeue_rejected_when_full() {
        let mut buffer = filled(IN_CAPACITY);
        assert_eq!(
            buffer.requeue(&[0xAB; IN_MARGIN + 1]),
            Err(TransportError::RequeueRejected)
        );
        assert_eq!(buffer.len(), IN_CAPACITY);
        assert_eq!(buffer.as_slice()[0], 0);
    }

    #[test]
    fn test_push_after_requeue_into_margin() {
        let mut buffer = filled(IN_CAPACITY);
        buffer.requeue(&[0xAB; IN_MARGIN]).unwrap();

        // Exactly one block goes: the requeued bytes at the front
        assert_eq!(buffer.push(0xEE), EVICT_BLOCK);
        assert_eq!(buffer.len(), IN_TOTAL - EVICT_BLOCK + 1);
        assert_eq!(buffer.as_slice()[0], 0);
        assert_eq!(*buffer.as_slice().last().unwrap(), 0xEE);

        // Still over capacity, so the next append evicts one more block
        assert_eq!(buffer.push(0xEF), EVICT_BLOCK);
        assert_eq!(buffer.len(), IN_TOTAL - 2 * EVICT_BLOCK + 2);
    }
}
