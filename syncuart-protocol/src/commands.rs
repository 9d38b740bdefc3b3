//! Control commands carried in priority frames
//!
//! Every command starts with the escape marker and a one-byte tag. The
//! bytes after the two-byte header are payload on the way out; the bytes the
//! peer clocks back at those positions are the reply.

use crate::framing::ESCAPE;
use heapless::Vec;

// Command tags
pub const TAG_SET_RATE: u8 = b'b';
pub const TAG_VERSION: u8 = b'v';
pub const TAG_WATERMARK: u8 = b'w';

/// Marker + tag
pub const HEADER_LEN: usize = 2;

/// Longest command this crate encodes (set-rate)
pub const MAX_COMMAND_LEN: usize = HEADER_LEN + 4;

/// Encoded command bytes
pub type CommandFrame = Vec<u8, MAX_COMMAND_LEN>;

/// Errors from parsing a command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Frame does not start with the escape marker
    MissingMarker,
    /// Tag is not a known command
    UnknownTag(u8),
    /// Frame is shorter than the command requires
    Truncated,
    /// Payload value out of range
    InvalidPayload,
}

/// Flow-control level announced by a watermark notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaterLevel {
    /// Inbound buffer drained below the low watermark; peer may resume
    Low,
    /// Inbound buffer filled past the high watermark; peer should pause
    High,
}

impl WaterLevel {
    fn to_byte(self) -> u8 {
        match self {
            WaterLevel::Low => 0x00,
            WaterLevel::High => 0x01,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(WaterLevel::Low),
            0x01 => Some(WaterLevel::High),
            _ => None,
        }
    }
}

/// Control commands understood by the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Set the peer's downstream serial rate (bits per second)
    SetRate(u32),
    /// Query the peer firmware version; the reply replaces the placeholder
    FirmwareVersion,
    /// Flow-control notice
    Watermark(WaterLevel),
}

impl Command {
    /// Encode into frame bytes
    pub fn encode(&self) -> CommandFrame {
        let mut frame = CommandFrame::new();
        // Capacity covers the longest command, pushes cannot fail
        let _ = frame.push(ESCAPE);
        match self {
            Command::SetRate(bps) => {
                let _ = frame.push(TAG_SET_RATE);
                let _ = frame.extend_from_slice(&bps.to_be_bytes());
            }
            Command::FirmwareVersion => {
                let _ = frame.push(TAG_VERSION);
                let _ = frame.push(0x00);
            }
            Command::Watermark(level) => {
                let _ = frame.push(TAG_WATERMARK);
                let _ = frame.push(level.to_byte());
            }
        }
        frame
    }

    /// Parse a command from frame bytes
    pub fn parse(frame: &[u8]) -> Result<Self, CommandError> {
        if frame.first() != Some(&ESCAPE) {
            return Err(CommandError::MissingMarker);
        }
        let tag = *frame.get(1).ok_or(CommandError::Truncated)?;
        let payload = &frame[HEADER_LEN..];

        match tag {
            TAG_SET_RATE => {
                let bytes: [u8; 4] = payload
                    .get(..4)
                    .and_then(|p| p.try_into().ok())
                    .ok_or(CommandError::Truncated)?;
                Ok(Command::SetRate(u32::from_be_bytes(bytes)))
            }
            TAG_VERSION => {
                if payload.is_empty() {
                    return Err(CommandError::Truncated);
                }
                Ok(Command::FirmwareVersion)
            }
            TAG_WATERMARK => {
                let byte = *payload.first().ok_or(CommandError::Truncated)?;
                let level = WaterLevel::from_byte(byte).ok_or(CommandError::InvalidPayload)?;
                Ok(Command::Watermark(level))
            }
            other => Err(CommandError::UnknownTag(other)),
        }
    }

    /// Whether the peer's reply to this command is worth capturing
    pub fn expects_reply(&self) -> bool {
        matches!(self, Command::FirmwareVersion)
    }
}

/// Peer state as reported by a firmware version reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceStatus {
    /// Nothing answered; the line stayed at the filler value
    Absent,
    /// Peer is attached but not driving the line yet
    NotReady,
    /// Peer reported this firmware version
    Ready(u8),
}

impl DeviceStatus {
    /// Classify a version reply byte
    pub fn from_version(byte: u8) -> Self {
        match byte {
            0x00 => DeviceStatus::Absent,
            0xFF => DeviceStatus::NotReady,
            version => DeviceStatus::Ready(version),
        }
    }

    /// Classify the version byte of a captured version reply frame
    pub fn from_reply(reply: &[u8]) -> Self {
        Self::from_version(reply.get(HEADER_LEN).copied().unwrap_or(0x00))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_set_rate_big_endian() {
        let frame = Command::SetRate(115_200).encode();
        assert_eq!(frame.as_slice(), &[ESCAPE, b'b', 0x00, 0x01, 0xC2, 0x00]);
    }

    #[test]
    fn test_encode_version_query() {
        let frame = Command::FirmwareVersion.encode();
        assert_eq!(frame.as_slice(), &[ESCAPE, b'v', 0x00]);
        assert!(Command::FirmwareVersion.expects_reply());
    }

    #[test]
    fn test_encode_watermarks() {
        assert_eq!(
            Command::Watermark(WaterLevel::High).encode().as_slice(),
            &[ESCAPE, b'w', 0x01]
        );
        assert_eq!(
            Command::Watermark(WaterLevel::Low).encode().as_slice(),
            &[ESCAPE, b'w', 0x00]
        );
    }

    #[test]
    fn test_parse_encoded_commands() {
        for command in [
            Command::SetRate(9600),
            Command::FirmwareVersion,
            Command::Watermark(WaterLevel::High),
        ] {
            assert_eq!(Command::parse(&command.encode()), Ok(command));
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse(&[b'b']), Err(CommandError::MissingMarker));
        assert_eq!(Command::parse(&[ESCAPE]), Err(CommandError::Truncated));
        assert_eq!(
            Command::parse(&[ESCAPE, b'b', 0x00]),
            Err(CommandError::Truncated)
        );
        assert_eq!(
            Command::parse(&[ESCAPE, b'w', 0x07]),
            Err(CommandError::InvalidPayload)
        );
        assert_eq!(
            Command::parse(&[ESCAPE, b'?', 0x00]),
            Err(CommandError::UnknownTag(b'?'))
        );
    }

    #[test]
    fn test_device_status() {
        assert_eq!(DeviceStatus::from_version(0x00), DeviceStatus::Absent);
        assert_eq!(DeviceStatus::from_version(0xFF), DeviceStatus::NotReady);
        assert_eq!(DeviceStatus::from_version(0x12), DeviceStatus::Ready(0x12));
        assert_eq!(
            DeviceStatus::from_reply(&[ESCAPE, b'v', 0x03]),
            DeviceStatus::Ready(0x03)
        );
        assert_eq!(DeviceStatus::from_reply(&[ESCAPE, b'v']), DeviceStatus::Absent);
    }
}
