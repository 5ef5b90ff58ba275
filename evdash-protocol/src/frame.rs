//! Frame layout, validation and encoding for the controller telemetry link.
//!
//! Frame format (multi-byte integers big-endian):
//! - STX1, STX2 (2 bytes): 0x5D 0x47 synchronization marker
//! - LENGTH (2 bytes): address + payload + ETX byte count
//! - ADDRESS (3 bytes): reserved, not interpreted
//! - PAYLOAD (variable): sequence of (tag, value) entries
//! - ETX (1 byte): 0x78, at offset LENGTH + 3
//! - CRC (2 bytes): CRC-16/Modbus over LENGTH..=ETX
//!
//! Total frame length is always LENGTH + 6.

use heapless::Vec;

use crate::crc::{checksum, Crc16};
use crate::fields::{FieldUpdate, MAX_VALUE_WIDTH};

/// First start-of-frame marker
pub const STX1: u8 = 0x5D;

/// Second start-of-frame marker
pub const STX2: u8 = 0x47;

/// End-of-frame marker
pub const ETX: u8 = 0x78;

/// Offset of the two length bytes
pub const LENGTH_OFFSET: usize = 2;

/// Number of reserved address bytes after the length field
pub const ADDRESS_LEN: usize = 3;

/// Fixed header: 2 markers + 2 length bytes + 3 address bytes
pub const HEADER_LEN: usize = 7;

/// Bytes not covered by the declared length: 2 markers + 2 length + 2 CRC
pub const FRAME_OVERHEAD: usize = 6;

/// Trailer: ETX + 2 CRC bytes
pub const TRAILER_LEN: usize = 3;

/// Shortest frame the controller sends
pub const MIN_FRAME_LEN: usize = 15;

/// Largest frame the receive buffer holds
pub const MAX_FRAME_LEN: usize = 332;

/// Smallest payload that still meets `MIN_FRAME_LEN`
pub const MIN_PAYLOAD_LEN: usize = MIN_FRAME_LEN - HEADER_LEN - TRAILER_LEN;

/// Largest payload that fits in `MAX_FRAME_LEN`
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - HEADER_LEN - TRAILER_LEN;

/// Errors that can occur during frame assembly, validation or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// STX1 was not followed by STX2, or a frame does not start with both
    InvalidStart,
    /// Declared length implies a frame shorter than 15 bytes or larger than the buffer
    InvalidLength,
    /// Receive buffer filled before the frame completed
    Overflow,
    /// Frame shorter than the protocol minimum
    TooShort,
    /// Declared length does not match the number of bytes in the frame
    LengthMismatch,
    /// ETX missing at its declared position
    InvalidEndMarker,
    /// CRC mismatch
    ChecksumMismatch,
    /// Payload exceeds what fits in one frame
    PayloadTooLarge,
}

impl FrameError {
    /// Returns true for errors raised while synchronizing on the byte stream
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidStart | FrameError::InvalidLength | FrameError::Overflow
        )
    }

    /// Returns true for errors raised while checking a complete frame
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FrameError::TooShort
                | FrameError::LengthMismatch
                | FrameError::InvalidEndMarker
                | FrameError::ChecksumMismatch
        )
    }
}

/// Read the declared length from the first four bytes of a frame
pub(crate) fn declared_length(frame: &[u8]) -> Option<u16> {
    match frame.get(LENGTH_OFFSET..LENGTH_OFFSET + 2) {
        Some(&[hi, lo]) => Some(u16::from_be_bytes([hi, lo])),
        _ => None,
    }
}

/// A frame that passed every integrity check
///
/// Borrows the receive buffer; it must be consumed before the next byte is fed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidFrame<'a> {
    bytes: &'a [u8],
}

impl<'a> ValidFrame<'a> {
    /// Declared length field
    pub fn declared_length(&self) -> u16 {
        u16::from_be_bytes([self.bytes[2], self.bytes[3]])
    }

    /// Reserved address bytes
    pub fn address(&self) -> [u8; ADDRESS_LEN] {
        [self.bytes[4], self.bytes[5], self.bytes[6]]
    }

    /// Tag-value entries between the header and ETX
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[HEADER_LEN..self.bytes.len() - TRAILER_LEN]
    }

    /// Transmitted CRC
    pub fn checksum(&self) -> u16 {
        let len = self.bytes.len();
        u16::from_be_bytes([self.bytes[len - 2], self.bytes[len - 1]])
    }

    /// The complete frame
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Check a complete candidate frame
///
/// Checks run in order and stop at the first failure: minimum length and
/// start markers, declared length, end marker position, CRC.
pub fn validate(frame: &[u8]) -> Result<ValidFrame<'_>, FrameError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort);
    }
    if frame[0] != STX1 || frame[1] != STX2 {
        return Err(FrameError::InvalidStart);
    }

    let declared = declared_length(frame).ok_or(FrameError::TooShort)? as usize;
    if declared + FRAME_OVERHEAD != frame.len() {
        return Err(FrameError::LengthMismatch);
    }

    // ETX sits 3 bytes before the end of the frame
    if frame[declared + 3] != ETX {
        return Err(FrameError::InvalidEndMarker);
    }

    let calculated = checksum(&frame[LENGTH_OFFSET..declared + 4]);
    let received = u16::from_be_bytes([frame[declared + 4], frame[declared + 5]]);
    if calculated != received {
        return Err(FrameError::ChecksumMismatch);
    }

    Ok(ValidFrame { bytes: frame })
}

/// Returns true if `frame` passes every check in [`validate`]
pub fn is_valid(frame: &[u8]) -> bool {
    validate(frame).is_ok()
}

/// Builds frames the way the controller sends them
///
/// The dashboard never transmits; this exists for simulators, bench
/// tooling and tests.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    buffer: Vec<u8, MAX_FRAME_LEN>,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new([0; ADDRESS_LEN])
    }
}

impl FrameBuilder {
    /// Start a frame with the given address bytes
    pub fn new(address: [u8; ADDRESS_LEN]) -> Self {
        // Length bytes are filled in by `finish`; the header always fits
        let buffer = [STX1, STX2, 0, 0].into_iter().chain(address).collect();
        Self { buffer }
    }

    /// Bytes of payload written so far
    pub fn payload_len(&self) -> usize {
        self.buffer.len() - HEADER_LEN
    }

    /// Append one tag-value entry
    pub fn field(&mut self, update: &FieldUpdate) -> Result<&mut Self, FrameError> {
        let mut value = [0u8; MAX_VALUE_WIDTH];
        let len = update.encode_value(&mut value);
        self.raw(&[update.id().tag()])?;
        self.raw(&value[..len])
    }

    /// Append raw payload bytes (unknown tags, padding, malformed entries)
    pub fn raw(&mut self, bytes: &[u8]) -> Result<&mut Self, FrameError> {
        if self.payload_len() + bytes.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLarge);
        }
        self.buffer
            .extend_from_slice(bytes)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(self)
    }

    /// Write length, ETX and CRC and return the finished frame
    pub fn finish(mut self) -> Result<Vec<u8, MAX_FRAME_LEN>, FrameError> {
        if self.payload_len() < MIN_PAYLOAD_LEN {
            return Err(FrameError::TooShort);
        }

        // Length covers address + payload + ETX
        let declared = (self.buffer.len() - LENGTH_OFFSET - 2 + 1) as u16;
        self.buffer[LENGTH_OFFSET..LENGTH_OFFSET + 2].copy_from_slice(&declared.to_be_bytes());
        self.buffer.push(ETX).map_err(|_| FrameError::PayloadTooLarge)?;

        let mut crc = Crc16::new();
        crc.update(&self.buffer[LENGTH_OFFSET..]);
        self.buffer
            .extend_from_slice(&crc.finish().to_be_bytes())
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(self.buffer)
    }
}

/// Encode a list of field updates into one frame
pub fn encode_frame(
    address: [u8; ADDRESS_LEN],
    updates: &[FieldUpdate],
) -> Result<Vec<u8, MAX_FRAME_LEN>, FrameError> {
    let mut builder = FrameBuilder::new(address);
    for update in updates {
        builder.field(update)?;
    }
    builder.finish()
}
