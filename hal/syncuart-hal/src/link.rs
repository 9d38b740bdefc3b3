//! Duplex link abstractions
//!
//! The link is a synchronous, clocked serial bus where every transfer moves
//! exactly one byte out and one byte in at the same time.

use embedded_hal::spi::SpiBus;

/// Full-duplex byte link
///
/// One call to [`exchange`](DuplexLink::exchange) shifts `outgoing` out while
/// shifting the peer's byte in. Implementations block for the duration of a
/// single byte transfer, which is short enough to run from an interrupt
/// handler.
pub trait DuplexLink {
    /// Error type for link operations
    type Error: core::fmt::Debug;

    /// Exchange one byte with the peer
    fn exchange(&mut self, outgoing: u8) -> Result<u8, Self::Error>;

    /// Apply a bus configuration and enable the link
    fn configure(&mut self, config: &LinkConfig);

    /// Disable the link
    fn disable(&mut self);
}

/// Link bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Bit clock frequency in Hz, unrelated to the byte exchange rate
    pub frequency: u32,
    /// Clock level between exchanges
    pub idle: ClockIdle,
    /// Edge on which both ends sample
    pub sample_edge: SampleEdge,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new(524_288, LinkMode::Mode0)
    }
}

impl LinkConfig {
    /// Build a configuration from a bit clock frequency and mode number
    pub const fn new(frequency: u32, mode: LinkMode) -> Self {
        Self {
            frequency,
            idle: mode.idle(),
            sample_edge: mode.sample_edge(),
        }
    }
}

/// Clock level while no byte is being exchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockIdle {
    Low,
    High,
}

/// Which clock edge of each bit both ends sample on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleEdge {
    /// First edge after the idle level; outgoing bits must be set up before it
    Leading,
    /// Second edge; outgoing bits change on the first
    Trailing,
}

/// Idle level and sample edge under their conventional mode numbers
///
/// Both ends of the link must agree. The bridge firmware ships in mode 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkMode {
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}

impl LinkMode {
    pub const fn idle(self) -> ClockIdle {
        match self {
            LinkMode::Mode0 | LinkMode::Mode1 => ClockIdle::Low,
            LinkMode::Mode2 | LinkMode::Mode3 => ClockIdle::High,
        }
    }

    pub const fn sample_edge(self) -> SampleEdge {
        match self {
            LinkMode::Mode0 | LinkMode::Mode2 => SampleEdge::Leading,
            LinkMode::Mode1 | LinkMode::Mode3 => SampleEdge::Trailing,
        }
    }
}

/// [`DuplexLink`] over any `embedded-hal` SPI bus
///
/// The bus must already be set up by the board crate; `configure` and
/// `disable` only track whether the link is in use, since `embedded-hal`
/// has no portable way to reprogram a bus at runtime.
pub struct SpiLink<S> {
    bus: S,
    enabled: bool,
    config: LinkConfig,
}

impl<S: SpiBus> SpiLink<S> {
    /// Wrap an SPI bus
    pub fn new(bus: S) -> Self {
        Self {
            bus,
            enabled: false,
            config: LinkConfig::default(),
        }
    }

    /// Last configuration applied
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Whether the link is currently enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Release the underlying bus
    pub fn into_inner(self) -> S {
        self.bus
    }
}

impl<S: SpiBus> DuplexLink for SpiLink<S> {
    type Error = S::Error;

    fn exchange(&mut self, outgoing: u8) -> Result<u8, Self::Error> {
        let mut word = [outgoing];
        self.bus.transfer_in_place(&mut word)?;
        Ok(word[0])
    }

    fn configure(&mut self, config: &LinkConfig) {
        self.config = *config;
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}
