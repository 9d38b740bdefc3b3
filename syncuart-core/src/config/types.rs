//! Runtime configuration
//!
//! Rates and thresholds the application may tune. Everything has a working
//! default, so `TransportConfig::default()` is enough to bring a link up.

use syncuart_hal::link::{LinkConfig, LinkMode};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::IN_CAPACITY;

/// Default exchange rate in transfers per second
pub const DEFAULT_RATE_HZ: u32 = 2000;

/// Default link bus clock in Hz
pub const DEFAULT_LINK_FREQUENCY_HZ: u32 = 524_288;

/// Default number of firmware version queries during `open`
pub const DEFAULT_INIT_RETRIES: u8 = 10;

/// Default time allowed for a control command to go out, in milliseconds
pub const DEFAULT_CONTROL_TIMEOUT_MS: u32 = 100;

/// Inbound watermarks as percentages of [`IN_CAPACITY`]
///
/// A value of 0 disables that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WatermarkConfig {
    /// Fill level (%) at which the peer is told to pause
    pub high_pct: u8,
    /// Fill level (%) at which the peer is told to resume
    pub low_pct: u8,
}

impl WatermarkConfig {
    /// Watermarks disabled
    pub const fn disabled() -> Self {
        Self {
            high_pct: 0,
            low_pct: 0,
        }
    }

    /// High watermark in bytes
    pub fn high_bytes(&self) -> usize {
        percent_of_capacity(self.high_pct)
    }

    /// Low watermark in bytes
    pub fn low_bytes(&self) -> usize {
        percent_of_capacity(self.low_pct)
    }
}

fn percent_of_capacity(pct: u8) -> usize {
    IN_CAPACITY * pct.min(100) as usize / 100
}

/// Transport configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransportConfig {
    /// Exchange rate in transfers per second
    pub rate_hz: u32,
    /// Link bus clock in Hz
    pub link_frequency_hz: u32,
    /// Inbound flow-control thresholds
    pub watermarks: WatermarkConfig,
    /// Firmware version queries before giving up on the peer
    pub init_retries: u8,
    /// Time allowed for a control command to be clocked out (ms, 0 = no limit)
    pub control_timeout_ms: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            rate_hz: DEFAULT_RATE_HZ,
            link_frequency_hz: DEFAULT_LINK_FREQUENCY_HZ,
            watermarks: WatermarkConfig::disabled(),
            init_retries: DEFAULT_INIT_RETRIES,
            control_timeout_ms: DEFAULT_CONTROL_TIMEOUT_MS,
        }
    }
}

impl TransportConfig {
    /// Link bus settings derived from this configuration
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig::new(self.link_frequency_hz, LinkMode::Mode0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_bytes() {
        let marks = WatermarkConfig {
            high_pct: 80,
            low_pct: 20,
        };
        assert_eq!(marks.high_bytes(), IN_CAPACITY * 80 / 100);
        assert_eq!(marks.low_bytes(), IN_CAPACITY * 20 / 100);
    }

    #[test]
    fn test_watermark_percent_clamped() {
        let marks = WatermarkConfig {
            high_pct: 250,
            low_pct: 0,
        };
        assert_eq!(marks.high_bytes(), IN_CAPACITY);
        assert_eq!(marks.low_bytes(), 0);
    }

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.rate_hz, DEFAULT_RATE_HZ);
        assert_eq!(config.watermarks, WatermarkConfig::disabled());
        assert_eq!(config.link_config().frequency, DEFAULT_LINK_FREQUENCY_HZ);
    }
}
