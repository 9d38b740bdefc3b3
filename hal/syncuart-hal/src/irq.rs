//! Interrupt control and time
//!
//! The engine is driven by two interrupt sources: the periodic clock timer
//! and the link-state-change line. Foreground code masks both while it
//! touches shared buffers, and sleeps on them while waiting for progress.

/// Control over the two interrupt sources that run the exchange engine
pub trait Interrupts {
    /// Unmask the clock and link-state interrupts
    fn enable(&mut self);

    /// Mask the clock and link-state interrupts
    fn disable(&mut self);

    /// Sleep until either interrupt source has fired and been handled
    ///
    /// This is a single low-power wait, not a loop.
    fn wait_for_event(&mut self);

    /// Hint issued between checks of a bounded polling loop
    fn relax(&mut self) {
        core::hint::spin_loop();
    }
}

/// Monotonic millisecond clock used for timeouts
pub trait Monotonic {
    /// Milliseconds since an arbitrary fixed point
    fn now_ms(&self) -> u64;
}
