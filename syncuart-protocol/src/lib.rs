//! syncuart wire protocol
//!
//! This crate defines the byte-level protocol spoken over a clocked,
//! full-duplex serial link between the local transport engine and its peer.
//! The link exchanges one byte per clock tick in both directions, so an idle
//! line still carries bytes; the framing layer is what tells data from noise.
//!
//! # Protocol Overview
//!
//! Ordinary data is an unstructured, escaped byte stream:
//! ```text
//!  data byte      on the wire
//!  ─────────      ───────────
//!  0x00           0x5C 0x00
//!  0x5C           0x5C 0x5C
//!  other          unchanged
//! ```
//! An unescaped `0x00` (idle filler) or `0xFF` (no peer attached) is noise
//! and is dropped by the receiver.
//!
//! Control frames are short priority messages that start with the escape
//! marker followed by a command tag:
//! ```text
//! ┌──────┬─────┬──────────────────┐
//! │ 0x5C │ TAG │ PAYLOAD / REPLY  │
//! │ 1B   │ 1B  │ 0–N B            │
//! └──────┴─────┴──────────────────┘
//! ```
//! Bytes received while the payload is being clocked out are the peer's reply.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod commands;
pub mod framing;

pub use commands::{Command, CommandError, CommandFrame, DeviceStatus, WaterLevel, HEADER_LEN, MAX_COMMAND_LEN};
pub use framing::{escape, Escaped, Unescaper, ESCAPE, FILLER, NOISE_NO_PEER};
