//! Configuration types
//!
//! Buffer capacities are compile-time constants; everything else is runtime
//! configuration carried by [`TransportConfig`].

pub mod types;

pub use types::*;

/// Inbound buffer capacity in decoded bytes
pub const IN_CAPACITY: usize = 256;

/// Extra inbound room only usable by requeued bytes
pub const IN_MARGIN: usize = 8;

/// Bytes dropped from the front of a full inbound buffer at once
pub const EVICT_BLOCK: usize = 8;

/// Outbound buffer capacity available to ordinary writes, in wire bytes
pub const OUT_CAPACITY: usize = 256;

/// Extra outbound room only usable by priority frames
pub const OUT_MARGIN: usize = 4;

/// Total inbound storage
pub const IN_TOTAL: usize = IN_CAPACITY + IN_MARGIN;

/// Total outbound storage
pub const OUT_TOTAL: usize = OUT_CAPACITY + OUT_MARGIN;

const _: () = assert!(EVICT_BLOCK > 0 && EVICT_BLOCK <= IN_CAPACITY);
