//! Exchange engine
//!
//! One [`Engine`] owns every piece of state the interrupt handlers and the
//! foreground share: both buffers, the priority channel, the watermark latch
//! and the framing filter's escape bit, plus the link and the clock timer.
//! [`SharedEngine`] wraps it for access from both contexts.
//!
//! # Tick sequence
//!
//! ```text
//!  outbound ──► link.exchange(out) ──► received
//!                                         │
//!                      ┌──────────────────┴──────────────┐
//!                      ▼                                 ▼
//!            priority frame reply?            framing filter (unescape)
//!              (diverted, dropped                        │
//!               from the stream)                         ▼
//!                                              inbound + watermarks
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use syncuart_hal::{DuplexLink, TickTimer};
use syncuart_protocol::{Command, Unescaper, WaterLevel, FILLER};

use crate::buffer::{InboundBuffer, OutboundBuffer};
use crate::config::WatermarkConfig;
use crate::error::TransportError;
use crate::flow::Watermarks;
use crate::priority::{PriorityChannel, PriorityStatus, PriorityTicket};
use crate::rate::RateSetting;

/// Running counters, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineStats {
    /// Bytes exchanged with the peer
    pub exchanges: u32,
    /// Inbound bytes lost to overflow eviction
    pub evicted: u32,
    /// Ticks abandoned because the link reported an error
    pub link_errors: u32,
}

impl EngineStats {
    const fn new() -> Self {
        Self {
            exchanges: 0,
            evicted: 0,
            link_errors: 0,
        }
    }
}

/// Transport state and the hardware it drives
pub struct Engine<L, T> {
    link: L,
    timer: Option<T>,
    achieved_hz: Option<f32>,
    inbound: InboundBuffer,
    outbound: OutboundBuffer,
    priority: PriorityChannel,
    watermarks: Watermarks,
    unescaper: Unescaper,
    stats: EngineStats,
}

impl<L, T> Engine<L, T> {
    /// Create a closed engine around a link
    pub const fn new(link: L) -> Self {
        Self {
            link,
            timer: None,
            achieved_hz: None,
            inbound: InboundBuffer::new(),
            outbound: OutboundBuffer::new(),
            priority: PriorityChannel::new(),
            watermarks: Watermarks::disabled(),
            unescaper: Unescaper::new(),
            stats: EngineStats::new(),
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn inbound(&self) -> &InboundBuffer {
        &self.inbound
    }

    pub fn outbound(&self) -> &OutboundBuffer {
        &self.outbound
    }

    pub fn watermarks(&self) -> &Watermarks {
        &self.watermarks
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Whether a timer is attached
    pub fn is_open(&self) -> bool {
        self.timer.is_some()
    }

    /// Number of decoded bytes waiting to be read
    pub fn available(&self) -> usize {
        self.inbound.len()
    }

    /// Whether every queued outbound byte has been clocked out
    pub fn is_flushed(&self) -> bool {
        self.outbound.is_drained()
    }

    /// Escape and queue `src`; returns the number of source bytes accepted
    pub fn write(&mut self, src: &[u8]) -> usize {
        self.outbound.write(src)
    }

    /// Move decoded bytes into `dest`; returns the number moved
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let count = self.inbound.read(dest);
        self.check_drain();
        count
    }

    /// Move one delimited line into `dest`, see [`InboundBuffer::read_line`]
    pub fn read_line(&mut self, dest: &mut [u8], delimiter: u8) -> Option<usize> {
        let count = self.inbound.read_line(dest, delimiter)?;
        self.check_drain();
        Some(count)
    }

    /// Put bytes back in front of the inbound data
    pub fn requeue(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.inbound.requeue(bytes)
    }

    /// Apply new watermark thresholds
    pub fn set_watermarks(&mut self, config: &WatermarkConfig) {
        self.watermarks.configure(config);
    }

    /// Put a frame at the front of the outbound queue
    ///
    /// With `capture` set, the reply bytes are kept for
    /// [`copy_reply`](Self::copy_reply). See [`PriorityChannel::step`] for
    /// the meaning of `suspend_mask`.
    pub fn enqueue_priority(
        &mut self,
        frame: &[u8],
        capture: bool,
        suspend_mask: u32,
    ) -> Result<PriorityTicket, TransportError> {
        let dropped = self.outbound.insert_front(frame)?;
        if dropped > 0 {
            debug!("priority frame dropped {} queued bytes", dropped);
        }
        Ok(self.priority.begin(frame, capture, suspend_mask))
    }

    pub fn priority_status(&self, ticket: PriorityTicket) -> PriorityStatus {
        self.priority.status(ticket)
    }

    pub fn copy_reply(&self, ticket: PriorityTicket, dest: &mut [u8]) -> usize {
        self.priority.copy_reply(ticket, dest)
    }

    /// Give up on a frame: stop diverting its replies and let its unsent
    /// bytes go out as ordinary data
    ///
    /// The cursor already points at the first unsent byte of the frame, so
    /// nothing in the outbound buffer moves. A notice deferred behind the
    /// frame goes out once the remainder has been sent.
    pub fn demote(&mut self, ticket: PriorityTicket) -> bool {
        self.priority.demote(ticket)
    }

    /// Timer currently driving the clock
    pub fn timer(&self) -> Option<&T> {
        self.timer.as_ref()
    }

    /// Install the timer that will clock the link
    ///
    /// The framing filter starts over, so an escape marker received before
    /// the link went down cannot swallow the first byte after it comes up.
    pub fn attach_timer(&mut self, timer: T) {
        self.unescaper.reset();
        self.timer = Some(timer);
    }

    /// Remove the timer; the engine is closed afterwards
    pub fn detach_timer(&mut self) -> Option<T> {
        self.achieved_hz = None;
        self.timer.take()
    }

    /// Achieved exchange rate, if a rate has been programmed
    pub fn clock_rate(&self) -> Option<f32> {
        self.achieved_hz
    }

    fn check_drain(&mut self) {
        if let Some(level) = self.watermarks.after_drain(self.inbound.len()) {
            self.raise_notice(level);
        }
    }

    /// Send the notice held behind the frame that just finished
    ///
    /// Only a notice that still matches the latch is sent.
    fn release_deferred(&mut self) {
        let Some(level) = self.priority.take_deferred() else {
            return;
        };
        let latched = self.watermarks.is_latched();
        match (level, latched) {
            (WaterLevel::High, true) | (WaterLevel::Low, false) => self.raise_notice(level),
            _ => debug!("dropping stale watermark notice"),
        }
    }

    fn raise_notice(&mut self, level: WaterLevel) {
        if self.priority.in_flight() {
            trace!("deferring watermark notice");
            self.priority.defer(level);
            return;
        }

        self.priority.clear_deferred();
        let frame = Command::Watermark(level).encode();
        match self.outbound.insert_front(&frame) {
            Ok(_) => self.priority.begin_notice(frame.len()),
            Err(_) => warn!("watermark notice rejected"),
        }
    }
}

impl<L, T: TickTimer> Engine<L, T> {
    /// Whether the periodic clock is counting
    pub fn clock_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| t.is_running())
    }

    /// Re-arm the periodic clock
    pub fn start_clock(&mut self) {
        if let Some(timer) = self.timer.as_mut() {
            timer.start();
        }
    }

    /// Suspend the periodic clock
    pub fn stop_clock(&mut self) {
        if let Some(timer) = self.timer.as_mut() {
            timer.stop();
        }
    }

    /// Program the clock for `rate_hz` exchanges per second and start it
    ///
    /// Returns the achieved rate, or `None` if no timer is attached.
    pub fn configure_clock(&mut self, rate_hz: u32) -> Option<f32> {
        let timer = self.timer.as_mut()?;
        let setting = RateSetting::for_rate(timer.input_clock_hz(), rate_hz);
        timer.configure(setting.timer);
        self.achieved_hz = Some(setting.achieved_hz);
        Some(setting.achieved_hz)
    }
}

impl<L: DuplexLink, T: TickTimer> Engine<L, T> {
    /// Run one tick: exchange a byte with the peer and route what came back
    ///
    /// Called from interrupt context for both the clock and the link-state
    /// interrupt. Never blocks beyond the single byte transfer.
    pub fn exchange(&mut self) {
        let next = self.outbound.peek();
        let received = match self.link.exchange(next.unwrap_or(FILLER)) {
            Ok(byte) => byte,
            Err(_) => {
                warn!("link exchange failed, retrying next tick");
                self.stats.link_errors = self.stats.link_errors.wrapping_add(1);
                self.start_clock();
                return;
            }
        };
        let framed = next.is_some() && self.outbound.advance();
        self.stats.exchanges = self.stats.exchanges.wrapping_add(1);

        self.start_clock();

        let step = if framed { self.priority.step(received) } else { None };
        if let Some(step) = step {
            if step.suspend_clock {
                self.stop_clock();
            }
            if step.completed {
                self.release_deferred();
            }
            if step.consumed {
                return;
            }
        }

        if let Some(byte) = self.unescaper.feed(received) {
            self.receive(byte);
        }
    }

    fn receive(&mut self, byte: u8) {
        let evicted = self.inbound.push(byte);
        if evicted > 0 {
            trace!("inbound overflow, evicted {} bytes", evicted);
            self.stats.evicted = self.stats.evicted.wrapping_add(evicted as u32);
        }

        if let Some(level) = self.watermarks.after_fill(self.inbound.len()) {
            self.raise_notice(level);
        }
    }
}

/// An [`Engine`] that interrupt handlers and the foreground can share
///
/// Meant to live in a `static`:
///
/// ```ignore
/// static ENGINE: SharedEngine<CriticalSectionRawMutex, BoardLink, BoardTimer> =
///     SharedEngine::new(BoardLink::new());
///
/// #[interrupt]
/// fn TIMER0() {
///     ENGINE.on_interrupt();
/// }
/// ```
pub struct SharedEngine<M: RawMutex, L, T> {
    inner: Mutex<M, RefCell<Engine<L, T>>>,
}

impl<M: RawMutex, L, T> SharedEngine<M, L, T> {
    /// Create a closed engine around a link
    pub const fn new(link: L) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Engine::new(link))),
        }
    }

    /// Run `f` with exclusive access to the engine
    ///
    /// `f` must not wait for interrupts.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Engine<L, T>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl<M: RawMutex, L: DuplexLink, T: TickTimer> SharedEngine<M, L, T> {
    /// Interrupt entry point for the clock and link-state interrupts
    pub fn on_interrupt(&self) {
        self.lock(|engine| engine.exchange());
    }
}
