//! Escape framing for the data stream.
//!
//! Sender side: `0x00` and the escape marker are sent as a two-byte pair
//! `ESCAPE, byte`. Receiver side: the escape marker is swallowed and the next
//! byte is taken literally; unescaped `0x00` and `0xFF` are dropped as noise.

/// Escape marker (`\`)
pub const ESCAPE: u8 = 0x5C;

/// Byte clocked out when nothing is queued; an idle line reads as this
pub const FILLER: u8 = 0x00;

/// Byte read when no peer is driving the line
pub const NOISE_NO_PEER: u8 = 0xFF;

/// Wire form of one data byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Escaped {
    bytes: [u8; 2],
    len: u8,
}

impl Escaped {
    /// Wire bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Number of wire bytes (1 or 2)
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false; an escaped byte has at least one wire byte
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Escape a single outgoing data byte
pub fn escape(byte: u8) -> Escaped {
    match byte {
        FILLER | ESCAPE => Escaped {
            bytes: [ESCAPE, byte],
            len: 2,
        },
        _ => Escaped {
            bytes: [byte, 0],
            len: 1,
        },
    }
}

/// Receive-side filter
///
/// Holds the single bit of state the framing needs: whether the previous
/// byte was an escape marker that has not yet been consumed.
#[derive(Debug, Clone, Default)]
pub struct Unescaper {
    escaped: bool,
}

impl Unescaper {
    /// Create a filter in the unescaped state
    pub const fn new() -> Self {
        Self { escaped: false }
    }

    /// Whether the last byte fed was an unconsumed escape marker
    pub fn is_escaped(&self) -> bool {
        self.escaped
    }

    /// Forget a pending escape marker
    pub fn reset(&mut self) {
        self.escaped = false;
    }

    /// Feed one raw wire byte
    ///
    /// Returns the decoded data byte, or `None` if the wire byte was framing
    /// or noise.
    pub fn feed(&mut self, byte: u8) -> Option<u8> {
        if self.escaped {
            // Anything after the marker is literal, including 0x00 and 0xFF
            self.escaped = false;
            return Some(byte);
        }

        match byte {
            ESCAPE => {
                self.escaped = true;
                None
            }
            FILLER | NOISE_NO_PEER => None,
            _ => Some(byte),
        }
    }
}
