//! Board-agnostic transport engine for clocked full-duplex serial links
//!
//! Turns a link that moves exactly one byte each way per clock tick into a
//! buffered, escaped byte stream with a priority side channel:
//!
//! - Inbound and outbound ring buffers with block eviction on overflow
//! - Escape framing and line-noise filtering
//! - Priority frames with reply capture and clock suspension
//! - Edge-triggered watermark notices to the peer
//! - Exchange clock rate calculation
//! - Blocking foreground API over `embedded-io`

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod priority;
pub mod rate;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::TransportConfig;
pub use engine::{Engine, EngineStats, SharedEngine};
pub use error::TransportError;
pub use priority::{PriorityStatus, PriorityTicket};
pub use rate::RateSetting;
pub use transport::Transport;
