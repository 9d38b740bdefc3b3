//! Inbound flow control
//!
//! Edge-triggered watermarks on the inbound buffer. Crossing the high mark
//! produces one `High` notice; nothing more is sent until the buffer drains
//! to the low mark, which produces one `Low` notice and re-arms the high side.

use syncuart_protocol::WaterLevel;

use crate::config::WatermarkConfig;

/// Watermark thresholds and the latched notice state
#[derive(Debug, Clone, Default)]
pub struct Watermarks {
    /// High mark in bytes, 0 = off
    high: usize,
    /// Low mark in bytes, 0 = off
    low: usize,
    /// High-water notice sent and not yet cancelled by a low-water notice
    notified: bool,
}

impl Watermarks {
    /// Watermarks that never fire
    pub const fn disabled() -> Self {
        Self {
            high: 0,
            low: 0,
            notified: false,
        }
    }

    /// Set thresholds from percentages of the inbound capacity
    ///
    /// The latch is kept so a pending high-water state still gets its
    /// low-water notice.
    pub fn configure(&mut self, config: &WatermarkConfig) {
        self.high = config.high_bytes();
        self.low = config.low_bytes();
    }

    /// High mark in bytes (0 when disabled)
    pub fn high(&self) -> usize {
        self.high
    }

    /// Low mark in bytes (0 when disabled)
    pub fn low(&self) -> usize {
        self.low
    }

    /// Whether a high-water notice is outstanding
    pub fn is_latched(&self) -> bool {
        self.notified
    }

    /// Evaluate after bytes were added; `occupancy` is the new fill level
    pub fn after_fill(&mut self, occupancy: usize) -> Option<WaterLevel> {
        if self.high > 0 && occupancy >= self.high && !self.notified {
            self.notified = true;
            return Some(WaterLevel::High);
        }
        None
    }

    /// Evaluate after bytes were removed; `occupancy` is the new fill level
    pub fn after_drain(&mut self, occupancy: usize) -> Option<WaterLevel> {
        if self.low > 0 && occupancy <= self.low && self.notified {
            self.notified = false;
            return Some(WaterLevel::Low);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks(high_pct: u8, low_pct: u8) -> Watermarks {
        let mut marks = Watermarks::disabled();
        marks.configure(&WatermarkConfig { high_pct, low_pct });
        marks
    }

    #[test]
    fn test_disabled_never_fires() {
        let mut marks = Watermarks::disabled();
        for occupancy in 0..=300 {
            assert_eq!(marks.after_fill(occupancy), None);
            assert_eq!(marks.after_drain(occupancy), None);
        }
    }

    #[test]
    fn test_high_fires_once_per_crossing() {
        let mut marks = marks(80, 20);
        let high = marks.high();

        assert_eq!(marks.after_fill(high - 1), None);
        assert_eq!(marks.after_fill(high), Some(WaterLevel::High));
        assert_eq!(marks.after_fill(high + 1), None);
        assert_eq!(marks.after_fill(high), None);
        assert!(marks.is_latched());
    }

    #[test]
    fn test_low_requires_prior_high() {
        let mut marks = marks(80, 20);
        assert_eq!(marks.after_drain(0), None);

        marks.after_fill(marks.high());
        assert_eq!(marks.after_drain(marks.low() + 1), None);
        assert_eq!(marks.after_drain(marks.low()), Some(WaterLevel::Low));
        assert_eq!(marks.after_drain(0), None);
        assert!(!marks.is_latched());

        // Re-armed for the next rise
        assert_eq!(marks.after_fill(marks.high()), Some(WaterLevel::High));
    }

    #[test]
    fn test_low_disabled_keeps_latch() {
        let mut marks = marks(50, 0);
        assert_eq!(marks.after_fill(marks.high()), Some(WaterLevel::High));
        assert_eq!(marks.after_drain(0), None);
        assert_eq!(marks.after_fill(marks.high()), None);
    }
}
