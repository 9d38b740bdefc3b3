//! Bounded byte buffers shared between the exchange engine and the
//! foreground

pub mod inbound;
pub mod outbound;

pub use inbound::InboundBuffer;
pub use outbound::OutboundBuffer;
