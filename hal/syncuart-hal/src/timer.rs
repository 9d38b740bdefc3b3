//! Periodic tick timer abstractions
//!
//! The transport is clocked by a hardware timer whose overflow interrupt
//! drives one byte exchange per tick. Timers count up from a reload value
//! and overflow after `ticks` input clocks divided by a prescaler.

/// Timer input prescaler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    Div1,
    Div64,
    Div256,
    Div1024,
}

impl Prescaler {
    /// All prescalers, finest first
    pub const ALL: [Prescaler; 4] = [
        Prescaler::Div1,
        Prescaler::Div64,
        Prescaler::Div256,
        Prescaler::Div1024,
    ];

    /// Division ratio
    pub const fn divisor(self) -> u32 {
        match self {
            Prescaler::Div1 => 1,
            Prescaler::Div64 => 64,
            Prescaler::Div256 => 256,
            Prescaler::Div1024 => 1024,
        }
    }
}

/// Register-level timer programming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerSetting {
    /// Input prescaler
    pub prescaler: Prescaler,
    /// Counter reload value; the timer overflows after `0x1_0000 - reload`
    /// prescaled clocks
    pub reload: u16,
}

impl TimerSetting {
    /// Number of prescaled clocks between overflows
    pub const fn ticks(&self) -> u32 {
        0x1_0000 - self.reload as u32
    }
}

/// A hardware timer driving the periodic clock interrupt
pub trait TickTimer {
    /// Timer input clock in Hz (before the prescaler)
    fn input_clock_hz(&self) -> u32;

    /// Program prescaler and reload value, enable the overflow interrupt
    /// request and start counting
    fn configure(&mut self, setting: TimerSetting);

    /// Resume counting with the current setting
    fn start(&mut self);

    /// Stop counting; no further clock interrupts until started again
    fn stop(&mut self);

    /// Whether the timer is counting
    fn is_running(&self) -> bool;
}

/// A set of hardware timers from which a free one can be claimed
pub trait TimerPool {
    /// Timer handed out by this pool
    type Timer: TickTimer;

    /// Claim a timer nobody else is using, if any
    fn claim(&mut self) -> Option<Self::Timer>;

    /// Return a timer to the pool
    fn release(&mut self, timer: Self::Timer);
}
