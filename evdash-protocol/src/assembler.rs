//! Byte-at-a-time frame assembly
//!
//! The assembler finds the STX1/STX2 marker pair in an arbitrary byte
//! stream, reads the declared length once four bytes are buffered, and
//! collects exactly `declared + 6` bytes. Any anomaly drops the buffered
//! bytes and returns to [`AssemblerState::Idle`], so a corrupted frame costs
//! at most one frame's worth of bytes before synchronization is regained.

use heapless::Vec;

use crate::frame::{
    declared_length, FrameError, FRAME_OVERHEAD, LENGTH_OFFSET, MAX_FRAME_LEN, MIN_FRAME_LEN, STX1,
    STX2,
};

/// Bytes needed before the declared length can be read
const LENGTH_END: usize = LENGTH_OFFSET + 2;

/// Assembly state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AssemblerState {
    /// Discarding bytes until STX1
    Idle,
    /// Got STX1, waiting for STX2
    SawFirstMarker,
    /// Collecting frame bytes; the total length is known once 4 bytes are in
    Capturing { expected_len: Option<usize> },
}

/// Frame assembler backed by a fixed-capacity buffer of `N` bytes
#[derive(Debug, Clone)]
pub struct FrameAssembler<const N: usize = MAX_FRAME_LEN> {
    state: AssemblerState,
    buffer: Vec<u8, N>,
}

impl<const N: usize> Default for FrameAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameAssembler<N> {
    const CAPACITY_CHECK: () = assert!(
        N >= MIN_FRAME_LEN,
        "assembly buffer must hold a minimum-length frame"
    );

    /// Create an idle assembler
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_CHECK;
        Self {
            state: AssemblerState::Idle,
            buffer: Vec::new(),
        }
    }

    /// Drop any partial frame and return to `Idle`
    pub fn reset(&mut self) {
        self.state = AssemblerState::Idle;
        self.buffer.clear();
    }

    /// Current state
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Returns true when no frame is in progress
    pub fn is_idle(&self) -> bool {
        self.state == AssemblerState::Idle
    }

    /// Bytes held for the frame in progress
    pub fn buffered(&self) -> usize {
        match self.state {
            AssemblerState::Idle => 0,
            _ => self.buffer.len(),
        }
    }

    /// Buffer capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Feed a single byte to the assembler
    ///
    /// Returns `Ok(Some(frame))` with the complete candidate frame when the
    /// last byte arrives, `Ok(None)` when more bytes are needed, or `Err` when
    /// the bytes gathered so far were discarded. The candidate has not been
    /// validated, and the assembler is already back in `Idle` when it is
    /// returned.
    pub fn feed(&mut self, byte: u8) -> Result<Option<&[u8]>, FrameError> {
        match self.state {
            AssemblerState::Idle => {
                // Releases the previously returned frame, if any
                self.buffer.clear();
                if byte == STX1 {
                    self.begin()?;
                }
                // Silently ignore everything else while idle
                Ok(None)
            }
            AssemblerState::SawFirstMarker => {
                if byte == STX2 {
                    self.push(byte)?;
                    self.state = AssemblerState::Capturing { expected_len: None };
                    return Ok(None);
                }

                // False start; a repeated STX1 may itself open a frame
                self.reset();
                if byte == STX1 {
                    self.begin()?;
                }
                Err(FrameError::InvalidStart)
            }
            AssemblerState::Capturing { expected_len } => {
                self.push(byte)?;

                let expected = match expected_len {
                    Some(expected) => expected,
                    None if self.buffer.len() == LENGTH_END => {
                        let expected = self.read_expected_len()?;
                        self.state = AssemblerState::Capturing {
                            expected_len: Some(expected),
                        };
                        expected
                    }
                    None => return Ok(None),
                };

                if self.buffer.len() < expected {
                    return Ok(None);
                }

                // Complete; hand out the frame and start over on the next byte
                self.state = AssemblerState::Idle;
                Ok(Some(self.buffer.as_slice()))
            }
        }
    }

    /// Record STX1 as the first byte of a new frame
    fn begin(&mut self) -> Result<(), FrameError> {
        self.buffer.clear();
        self.push(STX1)?;
        self.state = AssemblerState::SawFirstMarker;
        Ok(())
    }

    fn push(&mut self, byte: u8) -> Result<(), FrameError> {
        if self.buffer.push(byte).is_err() {
            self.reset();
            return Err(FrameError::Overflow);
        }
        Ok(())
    }

    /// Total frame length implied by the length field
    fn read_expected_len(&mut self) -> Result<usize, FrameError> {
        let expected = declared_length(&self.buffer)
            .map(|declared| declared as usize + FRAME_OVERHEAD)
            .unwrap_or(0);

        if !(MIN_FRAME_LEN..=N).contains(&expected) {
            // Back to Idle, not SawFirstMarker: this byte never restarts a frame
            self.reset();
            return Err(FrameError::InvalidLength);
        }
        Ok(expected)
    }
}
