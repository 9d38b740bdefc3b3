//! Outbound buffer
//!
//! Wire bytes waiting to be clocked out. A cursor marks the next byte due;
//! bytes before it have been sent and are purged lazily, on the next write
//! or priority insert, so the exchange engine only ever bumps an index.
//!
//! The buffer also remembers which stored bytes belong to the priority frame
//! and whether the last data byte sent opened an escape pair, so a frame is
//! never wedged between an escape marker and the byte it escapes.

use core::ops::Range;

use heapless::Vec;
use syncuart_protocol::{escape, ESCAPE};

use crate::config::{OUT_CAPACITY, OUT_TOTAL};
use crate::error::TransportError;

/// Wire bytes queued for transmission
#[derive(Debug, Clone, Default)]
pub struct OutboundBuffer {
    data: Vec<u8, OUT_TOTAL>,
    cursor: usize,
    /// Indices of the priority frame's bytes in `data`
    frame: Range<usize>,
    /// An escape marker went out and its second byte has not
    pair_open: bool,
}

impl OutboundBuffer {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            cursor: 0,
            frame: 0..0,
            pair_open: false,
        }
    }

    /// Bytes not yet transmitted
    pub fn pending(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    /// Whether every queued byte has been transmitted
    pub fn is_drained(&self) -> bool {
        self.cursor >= self.data.len()
    }

    /// Stored bytes, sent and unsent
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Index of the next byte due for transmission
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Next byte due, without consuming it
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.cursor).copied()
    }

    /// Mark the byte at the cursor as transmitted
    ///
    /// Returns true if that byte belonged to the priority frame.
    pub fn advance(&mut self) -> bool {
        let Some(&byte) = self.data.get(self.cursor) else {
            return false;
        };
        let in_frame = self.frame.contains(&self.cursor);
        self.cursor += 1;

        // Frame bytes are raw; only the data stream is made of pairs
        self.pair_open = !in_frame && !self.pair_open && byte == ESCAPE;
        in_frame
    }

    /// Escape and queue `src`
    ///
    /// Stops at the first byte whose wire form no longer fits in
    /// [`OUT_CAPACITY`] and returns the number of source bytes queued.
    pub fn write(&mut self, src: &[u8]) -> usize {
        self.compact();

        let mut accepted = 0;
        for &byte in src {
            let wire = escape(byte);
            if self.data.len() + wire.len() > OUT_CAPACITY {
                break;
            }
            // Capacity checked above
            let _ = self.data.extend_from_slice(wire.as_slice());
            accepted += 1;
        }
        accepted
    }

    /// Put `frame` in front of all untransmitted bytes
    ///
    /// Already transmitted bytes are purged. If an escape pair is half sent,
    /// its second byte stays ahead of the frame. If the frame and the pending
    /// bytes do not fit together, pending bytes are dropped from the tail
    /// (those that would have gone out last). Returns the number dropped.
    pub fn insert_front(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        self.compact();

        let pending = self.data.len();
        let hold = usize::from(self.pair_open).min(pending);
        if frame.is_empty() || frame.len() + hold > OUT_TOTAL {
            return Err(TransportError::PriorityRejected);
        }

        // keep >= hold, the held byte is the oldest pending one
        let keep = pending.min(OUT_TOTAL - frame.len());
        let new_len = frame.len() + keep;
        let frame_end = hold + frame.len();

        if new_len > self.data.len() {
            // new_len <= OUT_TOTAL
            let _ = self.data.resize(new_len, 0);
        }
        self.data.copy_within(hold..keep, frame_end);
        self.data.truncate(new_len);
        self.data[hold..frame_end].copy_from_slice(frame);
        self.frame = hold..frame_end;

        Ok(pending - keep)
    }

    fn compact(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let sent = self.cursor;
        let remaining = self.data.len() - sent;
        self.data.copy_within(sent.., 0);
        self.data.truncate(remaining);
        self.frame = self.frame.start.saturating_sub(sent)..self.frame.end.saturating_sub(sent);
        self.cursor = 0;
    }
}
