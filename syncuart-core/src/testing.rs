//! Host-side doubles for the hardware traits

use std::cell::Cell;
use std::collections::VecDeque;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use syncuart_hal::{DuplexLink, Interrupts, LinkConfig, Monotonic, TickTimer, TimerPool, TimerSetting};
use syncuart_protocol::{ESCAPE, FILLER};

use crate::engine::SharedEngine;
use crate::rate::DEFAULT_INPUT_CLOCK_HZ;
use crate::transport::Transport;

pub type TestShared = SharedEngine<NoopRawMutex, MockLink, MockTimer>;
pub type TestTransport<'a> = Transport<'a, NoopRawMutex, MockLink, MockTimer, MockPlatform<'a>>;

/// Count occurrences of `frame` in `wire`
pub fn count_frames(wire: &[u8], frame: &[u8]) -> usize {
    wire.windows(frame.len()).filter(|w| *w == frame).count()
}

#[derive(Debug)]
pub struct LinkFault;

/// Scripted peer
///
/// Answers the firmware version query with `version` when set, otherwise
/// plays back `replies` and then idles at the filler value.
#[derive(Debug, Default)]
pub struct MockLink {
    pub sent: Vec<u8>,
    pub replies: VecDeque<u8>,
    pub version: Option<u8>,
    pub fail_next: bool,
    pub enabled: bool,
    pub config: Option<LinkConfig>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: u8) -> Self {
        Self {
            version: Some(version),
            ..Self::default()
        }
    }
}

impl DuplexLink for MockLink {
    type Error = LinkFault;

    fn exchange(&mut self, outgoing: u8) -> Result<u8, Self::Error> {
        if self.fail_next {
            self.fail_next = false;
            return Err(LinkFault);
        }
        self.sent.push(outgoing);

        if let Some(version) = self.version {
            if self.sent.ends_with(&[ESCAPE, b'v', FILLER]) {
                return Ok(version);
            }
        }
        Ok(self.replies.pop_front().unwrap_or(FILLER))
    }

    fn configure(&mut self, config: &LinkConfig) {
        self.config = Some(*config);
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}

#[derive(Debug)]
pub struct MockTimer {
    pub setting: Option<TimerSetting>,
    pub running: bool,
}

impl MockTimer {
    pub fn new() -> Self {
        Self {
            setting: None,
            running: false,
        }
    }
}

impl TickTimer for MockTimer {
    fn input_clock_hz(&self) -> u32 {
        DEFAULT_INPUT_CLOCK_HZ
    }

    fn configure(&mut self, setting: TimerSetting) {
        self.setting = Some(setting);
        self.running = true;
    }

    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[derive(Debug, Default)]
pub struct MockPool {
    pub free: Vec<MockTimer>,
}

impl MockPool {
    pub fn with_timers(count: u8) -> Self {
        Self {
            free: (0..count).map(|_| MockTimer::new()).collect(),
        }
    }
}

impl TimerPool for MockPool {
    type Timer = MockTimer;

    fn claim(&mut self) -> Option<MockTimer> {
        self.free.pop()
    }

    fn release(&mut self, mut timer: MockTimer) {
        timer.stop();
        self.free.push(timer);
    }
}

/// Interrupt controller and clock that drive the engine synchronously
///
/// Every wait runs one tick as the link-state interrupt would. Every poll
/// advances time by `ms_per_poll` and runs one tick only while the clock is
/// counting, so a suspended frame stalls until someone re-arms the clock.
pub struct MockPlatform<'a> {
    pub engine: &'a TestShared,
    pub enabled: bool,
    pub now: Cell<u64>,
    pub ms_per_poll: u64,
    pub waits: usize,
}

impl<'a> MockPlatform<'a> {
    pub fn new(engine: &'a TestShared) -> Self {
        Self {
            engine,
            enabled: false,
            now: Cell::new(0),
            ms_per_poll: 1,
            waits: 0,
        }
    }

    fn tick_time(&self) {
        self.now.set(self.now.get() + self.ms_per_poll);
    }
}

impl Interrupts for MockPlatform<'_> {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn wait_for_event(&mut self) {
        assert!(self.enabled, "waiting with interrupts masked would hang");
        self.waits += 1;
        self.tick_time();
        self.engine.on_interrupt();
    }

    fn relax(&mut self) {
        self.tick_time();
        if self.enabled && self.engine.lock(|e| e.clock_running()) {
            self.engine.on_interrupt();
        }
    }
}

impl Monotonic for MockPlatform<'_> {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}
