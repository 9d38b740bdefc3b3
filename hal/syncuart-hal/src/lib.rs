//! syncuart Hardware Abstraction Layer
//!
//! This crate defines the hardware seams the transport engine is built on.
//! A board support crate implements these traits; the engine in
//! `syncuart-core` only ever talks to the hardware through them, which keeps
//! it testable on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (foreground + IRQ glue)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  syncuart-core (engine, transport)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  syncuart-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ embedded-hal  │       │ board timers  │
//! │   SPI bus     │       │ + IRQ control │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`link::DuplexLink`] - Exchange one byte in both directions
//! - [`timer::TickTimer`], [`timer::TimerPool`] - Periodic clock source
//! - [`irq::Interrupts`] - Mask, unmask and wait on the two interrupt sources
//! - [`irq::Monotonic`] - Millisecond uptime for timeouts

#![no_std]
#![deny(unsafe_code)]

pub mod irq;
pub mod link;
pub mod timer;

// Re-export key traits at crate root for convenience
pub use irq::{Interrupts, Monotonic};
pub use link::{DuplexLink, LinkConfig, LinkMode, SpiLink};
pub use timer::{Prescaler, TickTimer, TimerPool, TimerSetting};
