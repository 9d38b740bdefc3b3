//! Foreground transport API
//!
//! [`Transport`] is the application's handle on a [`SharedEngine`]. Every
//! operation that touches shared state masks both interrupt sources for its
//! duration, and the blocking operations sleep on the platform's
//! wait-for-event between attempts.
//!
//! # Example
//!
//! ```ignore
//! let mut transport = Transport::new(&ENGINE, board_irqs, TransportConfig::default());
//! let version = transport.open(&mut timers)?;
//! transport.send(b"hello\n")?;
//! transport.flush()?;
//!
//! let mut line = [0u8; 64];
//! while transport.read_line(&mut line, b'\n').is_none() {
//!     transport.wait()?;
//! }
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use syncuart_hal::{DuplexLink, Interrupts, Monotonic, TickTimer, TimerPool};
use syncuart_protocol::{Command, DeviceStatus, MAX_COMMAND_LEN};

use crate::config::{TransportConfig, WatermarkConfig};
use crate::engine::{Engine, SharedEngine};
use crate::error::TransportError;
use crate::priority::{PriorityStatus, PriorityTicket};

/// Masks both interrupt sources until dropped
///
/// Does nothing while the transport is closed, so a closed transport never
/// unmasks interrupts it did not enable.
struct IrqGuard<'p, P: Interrupts> {
    platform: &'p mut P,
    active: bool,
}

impl<'p, P: Interrupts> IrqGuard<'p, P> {
    fn new(platform: &'p mut P, active: bool) -> Self {
        if active {
            platform.disable();
        }
        Self { platform, active }
    }
}

impl<P: Interrupts> Drop for IrqGuard<'_, P> {
    fn drop(&mut self) {
        if self.active {
            self.platform.enable();
        }
    }
}

/// Buffered byte-stream transport over a clocked full-duplex link
pub struct Transport<'a, M: RawMutex, L, T, P> {
    engine: &'a SharedEngine<M, L, T>,
    platform: P,
    config: TransportConfig,
    open: bool,
}

impl<'a, M, L, T, P> Transport<'a, M, L, T, P>
where
    M: RawMutex,
    L: DuplexLink,
    T: TickTimer,
    P: Interrupts + Monotonic,
{
    /// Create a closed transport
    pub fn new(engine: &'a SharedEngine<M, L, T>, platform: P, config: TransportConfig) -> Self {
        Self {
            engine,
            platform,
            config,
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    fn locked<R>(&mut self, f: impl FnOnce(&mut Engine<L, T>) -> R) -> R {
        let _guard = IrqGuard::new(&mut self.platform, self.open);
        self.engine.lock(f)
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.open {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }

    /// Bring the link up and query the peer
    ///
    /// Claims a clock timer from `pool`, starts exchanging at the configured
    /// rate and queries the peer's firmware version until it answers. Returns
    /// the version byte. On failure everything is shut down again and the
    /// timer goes back to the pool.
    pub fn open<Pool>(&mut self, pool: &mut Pool) -> Result<u8, TransportError>
    where
        Pool: TimerPool<Timer = T>,
    {
        if self.open {
            return Err(TransportError::AlreadyOpen);
        }

        let link_config = self.config.link_config();
        self.engine.lock(|e| e.link_mut().configure(&link_config));

        let Some(timer) = pool.claim() else {
            warn!("no free timer for the link clock");
            self.engine.lock(|e| e.link_mut().disable());
            return Err(TransportError::ResourceUnavailable);
        };

        let watermarks = self.config.watermarks;
        self.engine.lock(|e| {
            e.attach_timer(timer);
            e.set_watermarks(&watermarks);
        });
        self.open = true;
        self.platform.enable();

        let result = self.await_peer_ready();
        if result.is_err() {
            if let Some(timer) = self.close() {
                pool.release(timer);
            }
        }
        result
    }

    fn await_peer_ready(&mut self) -> Result<u8, TransportError> {
        self.set_clock_rate(self.config.rate_hz)?;

        for attempt in 0..self.config.init_retries {
            let status = match self.firmware_version() {
                Err(TransportError::PriorityTimeout) => DeviceStatus::NotReady,
                other => other?,
            };
            // The peer gets one event's time after every query
            self.wait()?;

            match status {
                DeviceStatus::Ready(version) => {
                    info!("peer firmware version {}", version);
                    return Ok(version);
                }
                DeviceStatus::Absent => {
                    warn!("no peer on the link");
                    return Err(TransportError::DeviceNotResponding);
                }
                DeviceStatus::NotReady => {
                    debug!("peer not ready, attempt {}", attempt);
                }
            }
        }

        warn!("peer never became ready");
        Err(TransportError::DeviceNotResponding)
    }

    /// Shut the link down and hand back the clock timer
    ///
    /// Queued data stays buffered. Returns `None` if the transport was not
    /// open.
    pub fn close(&mut self) -> Option<T> {
        if !self.open {
            return None;
        }
        self.platform.disable();
        self.open = false;

        self.engine.lock(|e| {
            e.stop_clock();
            e.link_mut().disable();
            e.detach_timer()
        })
    }

    /// Queue `bytes` without blocking
    ///
    /// Fails with [`TransportError::ShortWrite`] if the outbound buffer could
    /// only take part of them; the accepted prefix stays queued.
    pub fn try_write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let accepted = self.locked(|e| e.write(bytes));
        if accepted < bytes.len() {
            return Err(TransportError::ShortWrite { accepted });
        }
        Ok(())
    }

    /// Queue all of `bytes`, waiting for room as needed
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut rest = bytes;
        loop {
            let accepted = self.locked(|e| e.write(rest));
            rest = &rest[accepted..];
            if rest.is_empty() {
                return Ok(());
            }
            self.wait()?;
        }
    }

    pub fn send_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        self.send(&[byte])
    }

    /// Wait until every queued byte has been clocked out
    pub fn flush(&mut self) -> Result<(), TransportError> {
        while !self.locked(|e| e.is_flushed()) {
            self.wait()?;
        }
        Ok(())
    }

    /// Move whatever has arrived into `dest` without blocking
    pub fn try_read(&mut self, dest: &mut [u8]) -> usize {
        self.locked(|e| e.read(dest))
    }

    /// Move one complete line, delimiter included, into `dest`
    ///
    /// `None` if no delimiter has arrived yet. Lines longer than `dest` are
    /// returned in pieces.
    pub fn read_line(&mut self, dest: &mut [u8], delimiter: u8) -> Option<usize> {
        self.locked(|e| e.read_line(dest, delimiter))
    }

    /// Push bytes back in front of the unread data
    pub fn requeue(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.locked(|e| e.requeue(bytes))
    }

    /// Number of bytes ready to read
    pub fn available(&mut self) -> usize {
        self.locked(|e| e.available())
    }

    /// Sleep until the next clock or link-state interrupt has run
    pub fn wait(&mut self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.platform.wait_for_event();
        Ok(())
    }

    /// Put a frame ahead of all queued data
    ///
    /// Bit `k` of `suspend_mask` stops the clock after the byte `k` positions
    /// before the frame's last byte; the next link-state interrupt resumes it.
    pub fn enqueue_priority(
        &mut self,
        frame: &[u8],
        capture_reply: bool,
        suspend_mask: u32,
    ) -> Result<PriorityTicket, TransportError> {
        self.ensure_open()?;
        self.locked(|e| e.enqueue_priority(frame, capture_reply, suspend_mask))
    }

    /// Wait for a priority frame to be clocked out
    ///
    /// `timeout_ms` of 0 waits forever. With `reply` given, the captured
    /// reply frame is copied into it and its length returned. On timeout the
    /// frame's unsent bytes are left queued as ordinary data and the clock is
    /// re-armed.
    pub fn await_priority(
        &mut self,
        ticket: PriorityTicket,
        timeout_ms: u32,
        reply: Option<&mut [u8]>,
    ) -> Result<usize, TransportError> {
        let start = self.platform.now_ms();
        loop {
            match self.locked(|e| e.priority_status(ticket)) {
                PriorityStatus::Complete => {
                    return Ok(match reply {
                        Some(dest) => self.locked(|e| e.copy_reply(ticket, dest)),
                        None => 0,
                    });
                }
                PriorityStatus::Superseded => return Err(TransportError::PrioritySuperseded),
                PriorityStatus::Pending => {}
            }
            self.ensure_open()?;

            let elapsed = self.platform.now_ms().saturating_sub(start);
            if timeout_ms != 0 && elapsed >= u64::from(timeout_ms) {
                let demoted = self.locked(|e| {
                    let demoted = e.demote(ticket);
                    if demoted {
                        e.start_clock();
                    }
                    demoted
                });
                if demoted {
                    warn!("priority frame timed out after {} ms", elapsed);
                    return Err(TransportError::PriorityTimeout);
                }
                // Finished just now, report it on the next pass
                continue;
            }
            self.platform.relax();
        }
    }

    /// Send a priority frame and wait for it, optionally capturing the reply
    pub fn transact(
        &mut self,
        frame: &[u8],
        reply: Option<&mut [u8]>,
        suspend_mask: u32,
        timeout_ms: u32,
    ) -> Result<usize, TransportError> {
        let ticket = self.enqueue_priority(frame, reply.is_some(), suspend_mask)?;
        self.await_priority(ticket, timeout_ms, reply)
    }

    /// Ask the peer for its firmware version
    pub fn firmware_version(&mut self) -> Result<DeviceStatus, TransportError> {
        let frame = Command::FirmwareVersion.encode();
        let mut reply = [0u8; MAX_COMMAND_LEN];
        let len = self.transact(&frame, Some(&mut reply), 0, self.config.control_timeout_ms)?;
        Ok(DeviceStatus::from_reply(&reply[..len]))
    }

    /// Tell the peer to switch its own line rate
    pub fn set_peer_rate(&mut self, bps: u32) -> Result<(), TransportError> {
        let frame = Command::SetRate(bps).encode();
        self.transact(&frame, None, 0, self.config.control_timeout_ms)?;
        Ok(())
    }

    /// Reprogram the exchange clock; returns the rate actually achieved
    pub fn set_clock_rate(&mut self, rate_hz: u32) -> Result<f32, TransportError> {
        self.ensure_open()?;
        let achieved = self
            .locked(|e| e.configure_clock(rate_hz))
            .ok_or(TransportError::Closed)?;
        self.config.rate_hz = rate_hz;
        debug!("exchange clock {} Hz, achieved {} Hz", rate_hz, achieved);
        Ok(achieved)
    }

    /// Achieved exchange rate, `None` while closed
    pub fn clock_rate(&mut self) -> Option<f32> {
        self.locked(|e| e.clock_rate())
    }

    /// Change the inbound flow-control thresholds (percent, 0 = off)
    pub fn set_watermarks(&mut self, high_pct: u8, low_pct: u8) {
        let watermarks = WatermarkConfig { high_pct, low_pct };
        self.config.watermarks = watermarks;
        self.locked(|e| e.set_watermarks(&watermarks));
    }
}

impl<M: RawMutex, L, T, P> embedded_io::ErrorType for Transport<'_, M, L, T, P> {
    type Error = TransportError;
}

impl<M, L, T, P> embedded_io::Read for Transport<'_, M, L, T, P>
where
    M: RawMutex,
    L: DuplexLink,
    T: TickTimer,
    P: Interrupts + Monotonic,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let count = self.try_read(buf);
            if count > 0 {
                return Ok(count);
            }
            self.wait()?;
        }
    }
}

impl<M, L, T, P> embedded_io::ReadReady for Transport<'_, M, L, T, P>
where
    M: RawMutex,
    L: DuplexLink,
    T: TickTimer,
    P: Interrupts + Monotonic,
{
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.available() > 0)
    }
}

impl<M, L, T, P> embedded_io::Write for Transport<'_, M, L, T, P>
where
    M: RawMutex,
    L: DuplexLink,
    T: TickTimer,
    P: Interrupts + Monotonic,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let accepted = self.locked(|e| e.write(buf));
            if accepted > 0 {
                return Ok(accepted);
            }
            self.wait()?;
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Transport::flush(self)
    }
}
