//! Exchange rate calculation
//!
//! Maps a requested rate in transfers per second onto the nearest setting a
//! 16-bit prescaled timer can produce, and reports the rate actually
//! achieved.

use syncuart_hal::timer::{Prescaler, TimerSetting};

/// Input clock of the reference timer block (33.513982 MHz bus clock)
pub const DEFAULT_INPUT_CLOCK_HZ: u32 = 33_513_982;

/// Longest period a 16-bit counter can count
const MAX_TICKS: u64 = 0x1_0000;

/// Timer setting for a requested rate
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RateSetting {
    /// Register-level timer programming
    pub timer: TimerSetting,
    /// Rate the timer will actually run at, in Hz
    pub achieved_hz: f32,
}

impl RateSetting {
    /// Compute the setting closest to `rate_hz` for a timer fed by
    /// `input_clock_hz`
    ///
    /// The finest prescaler whose tick count still fits the counter wins,
    /// which gives the best resolution. Rates below what the coarsest
    /// prescaler can reach are clamped to its longest period; a rate of 0 is
    /// treated as 1.
    pub fn for_rate(input_clock_hz: u32, rate_hz: u32) -> Self {
        let rate = rate_hz.max(1) as u64;
        let input = input_clock_hz as u64;

        let (prescaler, ticks) = Prescaler::ALL
            .iter()
            .find_map(|&prescaler| {
                let period = rate * prescaler.divisor() as u64;
                // Round to the nearest whole tick
                let ticks = (input + period / 2) / period;
                (ticks <= MAX_TICKS).then_some((prescaler, ticks.max(1)))
            })
            .unwrap_or((Prescaler::Div1024, MAX_TICKS));

        let timer = TimerSetting {
            prescaler,
            reload: (MAX_TICKS - ticks) as u16,
        };

        Self {
            timer,
            achieved_hz: achieved_rate(input_clock_hz, &timer),
        }
    }
}

/// Rate produced by a timer setting
pub fn achieved_rate(input_clock_hz: u32, setting: &TimerSetting) -> f32 {
    let period = setting.prescaler.divisor() as u64 * setting.ticks() as u64;
    input_clock_hz as f32 / period as f32
}
