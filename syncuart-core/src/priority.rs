//! Priority channel
//!
//! Tracks the control frame currently at the front of the outbound buffer.
//! While a frame is in flight the exchange engine reports every tick here:
//! the first [`HEADER_LEN`] received bytes are ordinary stream data, the rest
//! are the peer's reply and are diverted away from the inbound buffer.

use heapless::Vec;
use syncuart_protocol::{WaterLevel, HEADER_LEN};

use crate::config::OUT_TOTAL;

/// Handle for a foreground priority frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PriorityTicket(u16);

/// Progress of a priority frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PriorityStatus {
    /// Still being clocked out
    Pending,
    /// Every byte was exchanged
    Complete,
    /// Replaced by a newer frame or demoted before completing
    Superseded,
}

/// What the exchange engine must do with the byte just exchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStep {
    /// Stop the periodic clock until the link-state interrupt restarts it
    pub suspend_clock: bool,
    /// The received byte belonged to the reply and must not reach the
    /// framing filter
    pub consumed: bool,
    /// This was the frame's last byte
    pub completed: bool,
}

#[derive(Debug, Clone)]
struct ActiveFrame {
    /// `None` for internally generated notices and demoted frames
    ticket: Option<PriorityTicket>,
    len: usize,
    sent: usize,
    /// Reply bytes are kept away from the stream; off once demoted
    divert: bool,
    capture: bool,
    suspend_mask: u32,
}

/// The priority side channel
#[derive(Debug, Clone)]
pub struct PriorityChannel {
    active: Option<ActiveFrame>,
    generation: u16,
    completed: Option<PriorityTicket>,
    reply: Vec<u8, OUT_TOTAL>,
    reply_ticket: Option<PriorityTicket>,
    deferred: Option<WaterLevel>,
}

impl Default for PriorityChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityChannel {
    /// Create an idle channel
    pub const fn new() -> Self {
        Self {
            active: None,
            generation: 0,
            completed: None,
            reply: Vec::new(),
            reply_ticket: None,
            deferred: None,
        }
    }

    /// Whether a frame is still being clocked out
    pub fn in_flight(&self) -> bool {
        self.active.is_some()
    }

    /// Bytes of the active frame exchanged so far
    pub fn sent(&self) -> Option<usize> {
        self.active.as_ref().map(|frame| frame.sent)
    }

    /// Track a foreground frame that was just put at the front of the
    /// outbound buffer
    ///
    /// With `capture` set, the reply buffer starts as a copy of `frame` and
    /// every byte received past the header overwrites its counterpart.
    pub fn begin(&mut self, frame: &[u8], capture: bool, suspend_mask: u32) -> PriorityTicket {
        self.generation = self.generation.wrapping_add(1);
        let ticket = PriorityTicket(self.generation);

        if capture {
            self.reply.clear();
            // frame.len() <= OUT_TOTAL, checked by the outbound insert
            let _ = self.reply.extend_from_slice(frame);
            self.reply_ticket = Some(ticket);
        }

        self.active = Some(ActiveFrame {
            ticket: Some(ticket),
            len: frame.len(),
            sent: 0,
            divert: true,
            capture,
            suspend_mask,
        });
        ticket
    }

    /// Track an internally generated notice frame
    pub fn begin_notice(&mut self, len: usize) {
        self.active = Some(ActiveFrame {
            ticket: None,
            len,
            sent: 0,
            divert: true,
            capture: false,
            suspend_mask: 0,
        });
    }

    /// Account for one exchanged byte
    ///
    /// Returns `None` when no frame is in flight.
    pub fn step(&mut self, received: u8) -> Option<FrameStep> {
        let frame = self.active.as_mut()?;

        // Bit k: suspend after the byte k positions before the last one
        let from_end = (frame.len - 1 - frame.sent) as u32;
        let suspend_clock = 1u32
            .checked_shl(from_end)
            .is_some_and(|bit| frame.suspend_mask & bit != 0);

        let consumed = frame.divert && frame.sent >= HEADER_LEN;
        if consumed && frame.capture {
            if let Some(slot) = self.reply.get_mut(frame.sent) {
                *slot = received;
            }
        }

        frame.sent += 1;
        let completed = frame.sent == frame.len;
        if completed {
            if frame.ticket.is_some() {
                self.completed = frame.ticket;
            }
            self.active = None;
        }

        Some(FrameStep {
            suspend_clock,
            consumed,
            completed,
        })
    }

    /// Progress of a foreground frame
    pub fn status(&self, ticket: PriorityTicket) -> PriorityStatus {
        match &self.active {
            Some(frame) if frame.ticket == Some(ticket) => PriorityStatus::Pending,
            _ if self.completed == Some(ticket) => PriorityStatus::Complete,
            _ => PriorityStatus::Superseded,
        }
    }

    /// Give up on `ticket`'s frame; its unsent bytes go out as ordinary data
    ///
    /// The frame stays in flight until its last byte is out, so deferred
    /// notices still wait behind it, but it no longer captures, diverts
    /// replies or suspends the clock. Returns false if that frame is no
    /// longer in flight.
    pub fn demote(&mut self, ticket: PriorityTicket) -> bool {
        match self.active.as_mut() {
            Some(frame) if frame.ticket == Some(ticket) => {
                frame.ticket = None;
                frame.divert = false;
                frame.capture = false;
                frame.suspend_mask = 0;
                true
            }
            _ => false,
        }
    }

    /// Copy the captured reply of `ticket` into `dest`
    ///
    /// Returns the number of bytes copied; 0 if nothing was captured for it.
    pub fn copy_reply(&self, ticket: PriorityTicket, dest: &mut [u8]) -> usize {
        if self.reply_ticket != Some(ticket) {
            return 0;
        }
        let count = dest.len().min(self.reply.len());
        dest[..count].copy_from_slice(&self.reply[..count]);
        count
    }

    /// Hold a watermark notice until the frame in flight completes
    ///
    /// A notice of the opposite level cancels the held one; the peer never
    /// saw it, so its state is already right.
    pub fn defer(&mut self, level: WaterLevel) {
        self.deferred = match self.deferred {
            Some(held) if held != level => None,
            _ => Some(level),
        };
    }

    /// Drop a held notice without sending it
    pub fn clear_deferred(&mut self) {
        self.deferred = None;
    }

    /// Take the held notice, if any
    pub fn take_deferred(&mut self) -> Option<WaterLevel> {
        self.deferred.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncuart_protocol::ESCAPE;

    const VERSION_QUERY: [u8; 3] = [ESCAPE, b'v', 0x00];

    #[test]
    fn test_header_bytes_pass_through() {
        let mut channel = PriorityChannel::new();
        let ticket = channel.begin(&VERSION_QUERY, true, 0);

        let first = channel.step(b'a').unwrap();
        assert!(!first.consumed);
        let second = channel.step(b'b').unwrap();
        assert!(!second.consumed);
        assert_eq!(channel.status(ticket), PriorityStatus::Pending);

        let third = channel.step(0x42).unwrap();
        assert!(third.consumed);
        assert!(third.completed);
        assert_eq!(channel.status(ticket), PriorityStatus::Complete);
        assert!(channel.step(0x00).is_none());
    }

    #[test]
    fn test_reply_capture() {
        let mut channel = PriorityChannel::new();
        let ticket = channel.begin(&VERSION_QUERY, true, 0);
        for b in [0x00, 0x00, 0x07] {
            channel.step(b);
        }

        let mut reply = [0u8; 3];
        assert_eq!(channel.copy_reply(ticket, &mut reply), 3);
        assert_eq!(reply, [ESCAPE, b'v', 0x07]);
    }

    #[test]
    fn test_no_capture_without_request() {
        let mut channel = PriorityChannel::new();
        let ticket = channel.begin(&VERSION_QUERY, false, 0);
        for b in [0x00, 0x00, 0x07] {
            channel.step(b);
        }

        let mut reply = [0u8; 3];
        assert_eq!(channel.copy_reply(ticket, &mut reply), 0);
    }

    #[test]
    fn test_suspend_mask_counts_from_end() {
        let frame = [ESCAPE, b'b', 1, 2, 3, 4];
        let mut channel = PriorityChannel::new();
        // Bit 0: after the last byte; bit 5: after the first byte
        channel.begin(&frame, false, 0b10_0001);

        let suspends: std::vec::Vec<bool> = (0..frame.len())
            .map(|_| channel.step(0x00).unwrap().suspend_clock)
            .collect();
        assert_eq!(suspends, [true, false, false, false, false, true]);
    }

    #[test]
    fn test_suspend_mask_beyond_32_bytes_ignored() {
        let frame = [0x41u8; 40];
        let mut channel = PriorityChannel::new();
        channel.begin(&frame, false, u32::MAX);

        let suspends: std::vec::Vec<bool> = (0..frame.len())
            .map(|_| channel.step(0x00).unwrap().suspend_clock)
            .collect();
        assert!(suspends[..8].iter().all(|s| !s));
        assert!(suspends[8..].iter().all(|s| *s));
    }

    #[test]
    fn test_newer_frame_supersedes() {
        let mut channel = PriorityChannel::new();
        let first = channel.begin(&VERSION_QUERY, true, 0);
        channel.step(0x00);
        let second = channel.begin(&VERSION_QUERY, true, 0);

        assert_eq!(channel.status(first), PriorityStatus::Superseded);
        assert_eq!(channel.status(second), PriorityStatus::Pending);
    }

    #[test]
    fn test_notice_does_not_hide_completion() {
        let mut channel = PriorityChannel::new();
        let ticket = channel.begin(&VERSION_QUERY, true, 0);
        for b in [0x00, 0x00, 0x07] {
            channel.step(b);
        }

        channel.begin_notice(3);
        for _ in 0..3 {
            channel.step(0x00);
        }
        assert_eq!(channel.status(ticket), PriorityStatus::Complete);
    }

    #[test]
    fn test_demote() {
        let mut channel = PriorityChannel::new();
        let ticket = channel.begin(&VERSION_QUERY, false, 0);
        channel.step(0x00);

        assert!(channel.demote(ticket));
        assert_eq!(channel.status(ticket), PriorityStatus::Superseded);
        assert!(!channel.demote(ticket));

        // Still in flight until the remainder is out, replies now pass through
        assert!(channel.in_flight());
        let second = channel.step(0x00).unwrap();
        assert!(!second.consumed);
        let third = channel.step(0x42).unwrap();
        assert!(!third.consumed);
        assert!(third.completed);
        assert!(!channel.in_flight());
        assert_eq!(channel.status(ticket), PriorityStatus::Superseded);
    }

    #[test]
    fn test_demoted_frame_never_suspends() {
        let mut channel = PriorityChannel::new();
        let ticket = channel.begin(&[ESCAPE, b'b', 1, 2], false, u32::MAX);
        assert!(channel.step(0x00).unwrap().suspend_clock);

        channel.demote(ticket);
        for _ in 0..3 {
            assert!(!channel.step(0x00).unwrap().suspend_clock);
        }
    }

    #[test]
    fn test_deferred_opposite_levels_cancel() {
        let mut channel = PriorityChannel::new();
        channel.defer(WaterLevel::High);
        channel.defer(WaterLevel::Low);
        assert_eq!(channel.take_deferred(), None);

        channel.defer(WaterLevel::Low);
        channel.defer(WaterLevel::Low);
        assert_eq!(channel.take_deferred(), Some(WaterLevel::Low));
        assert_eq!(channel.take_deferred(), None);
    }
}
