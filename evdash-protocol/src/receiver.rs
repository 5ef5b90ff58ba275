//! Telemetry receiver
//!
//! Ties the assembler, validator and decoder together: bytes go in, batches
//! of field updates come out through an [`UpdateSink`]. Rejected frames are
//! dropped and counted; nothing here ever stops the byte loop.

use evdash_hal::ByteSource;

use crate::assembler::{AssemblerState, FrameAssembler};
use crate::decoder::{decode_into, BatchSummary, SkipPolicy};
use crate::frame::{validate, FrameError, MAX_FRAME_LEN};
use crate::sink::UpdateSink;

/// Receive statistics
///
/// All counters saturate instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiverStats {
    /// Bytes fed
    pub bytes: u32,
    /// Frames that passed validation and were delivered
    pub frames: u32,
    /// STX1 not followed by STX2
    pub invalid_start: u32,
    /// Declared length out of range
    pub invalid_length: u32,
    /// Buffer filled before the frame completed
    pub overflows: u32,
    /// Complete frames with inconsistent length or markers
    pub malformed: u32,
    /// Complete frames with ETX missing
    pub end_marker_errors: u32,
    /// Complete frames with a CRC mismatch
    pub checksum_errors: u32,
    /// Delivered frames whose last entry was cut short
    pub truncated: u32,
    /// Unknown tags stepped over
    pub skipped_tags: u32,
    /// Known tags dropped for meaningless values
    pub discarded_values: u32,
}

impl ReceiverStats {
    /// Errors raised while synchronizing on the byte stream
    pub fn framing_errors(&self) -> u32 {
        self.invalid_start
            .saturating_add(self.invalid_length)
            .saturating_add(self.overflows)
    }

    /// Complete frames rejected by validation
    pub fn validation_errors(&self) -> u32 {
        self.malformed
            .saturating_add(self.end_marker_errors)
            .saturating_add(self.checksum_errors)
    }

    fn record_error(&mut self, error: FrameError) {
        let counter = match error {
            FrameError::InvalidStart => &mut self.invalid_start,
            FrameError::InvalidLength => &mut self.invalid_length,
            FrameError::Overflow => &mut self.overflows,
            FrameError::InvalidEndMarker => &mut self.end_marker_errors,
            FrameError::ChecksumMismatch => &mut self.checksum_errors,
            FrameError::TooShort | FrameError::LengthMismatch | FrameError::PayloadTooLarge => {
                &mut self.malformed
            }
        };
        *counter = counter.saturating_add(1);
    }

    fn record_batch(&mut self, summary: &BatchSummary) {
        self.frames = self.frames.saturating_add(1);
        self.skipped_tags = self.skipped_tags.saturating_add(u32::from(summary.skipped));
        self.discarded_values = self
            .discarded_values
            .saturating_add(u32::from(summary.discarded));
        if summary.truncated.is_some() {
            self.truncated = self.truncated.saturating_add(1);
        }
    }
}

/// Result of draining a [`ByteSource`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollOutcome {
    /// Bytes consumed from the source
    pub bytes: usize,
    /// Batches delivered to the sink
    pub batches: usize,
}

/// A [`ByteSource`] failed part-way through a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollError<E> {
    /// Bytes and batches handled before the failure
    pub outcome: PollOutcome,
    /// Error reported by the source
    pub error: E,
}

/// Byte-driven telemetry receiver with an `N`-byte assembly buffer
#[derive(Debug, Clone)]
pub struct TelemetryReceiver<const N: usize = MAX_FRAME_LEN> {
    assembler: FrameAssembler<N>,
    policy: SkipPolicy,
    stats: ReceiverStats,
}

impl<const N: usize> Default for TelemetryReceiver<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TelemetryReceiver<N> {
    /// Create a receiver with the default skip policy
    pub fn new() -> Self {
        Self::with_policy(SkipPolicy::default())
    }

    /// Create a receiver with a custom policy for unknown tags
    pub fn with_policy(policy: SkipPolicy) -> Self {
        Self {
            assembler: FrameAssembler::new(),
            policy,
            stats: ReceiverStats::default(),
        }
    }

    /// Feed a single byte
    ///
    /// Returns `Ok(Some(summary))` after a valid frame was delivered to
    /// `sink`, `Ok(None)` when more bytes are needed, or `Err` when bytes
    /// or a complete frame were discarded. Errors are informational; keep
    /// feeding.
    pub fn feed<S: UpdateSink + ?Sized>(
        &mut self,
        byte: u8,
        sink: &mut S,
    ) -> Result<Option<BatchSummary>, FrameError> {
        self.stats.bytes = self.stats.bytes.saturating_add(1);

        let candidate = match self.assembler.feed(byte) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.stats.record_error(e);
                #[cfg(feature = "defmt")]
                defmt::trace!("framing error: {}", e);
                return Err(e);
            }
        };

        let frame = match validate(candidate) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_error(e);
                #[cfg(feature = "defmt")]
                defmt::debug!("frame rejected: {}", e);
                return Err(e);
            }
        };

        let summary = decode_into(frame.payload(), &self.policy, sink);
        self.stats.record_batch(&summary);

        #[cfg(feature = "defmt")]
        if let Some(e) = summary.truncated {
            defmt::warn!("frame truncated after {} fields: {}", summary.updates, e);
        }

        Ok(Some(summary))
    }

    /// Feed a run of bytes, returning the number of batches delivered
    pub fn feed_bytes<S: UpdateSink + ?Sized>(&mut self, bytes: &[u8], sink: &mut S) -> usize {
        let mut batches = 0;
        for &byte in bytes {
            if let Ok(Some(_)) = self.feed(byte, sink) {
                batches += 1;
            }
        }
        batches
    }

    /// Drain every byte currently available from `source`
    ///
    /// Stops at the first `Ok(None)` from the source. A source error ends
    /// the drain; batches completed before it have already been delivered
    /// and are counted in [`PollError::outcome`].
    pub fn poll<B, S>(
        &mut self,
        source: &mut B,
        sink: &mut S,
    ) -> Result<PollOutcome, PollError<B::Error>>
    where
        B: ByteSource + ?Sized,
        S: UpdateSink + ?Sized,
    {
        let mut outcome = PollOutcome::default();
        loop {
            let byte = match source.read_byte() {
                Ok(Some(byte)) => byte,
                Ok(None) => return Ok(outcome),
                Err(error) => return Err(PollError { outcome, error }),
            };
            outcome.bytes += 1;
            if let Ok(Some(_)) = self.feed(byte, sink) {
                outcome.batches += 1;
            }
        }
    }

    /// Abandon any partial frame
    pub fn reset(&mut self) {
        self.assembler.reset();
    }

    /// Returns true while a frame is partially received
    pub fn in_frame(&self) -> bool {
        !self.assembler.is_idle()
    }

    /// Assembler state
    pub fn state(&self) -> AssemblerState {
        self.assembler.state()
    }

    /// Skip policy in use
    pub fn policy(&self) -> &SkipPolicy {
        &self.policy
    }

    /// Replace the skip policy
    pub fn set_policy(&mut self, policy: SkipPolicy) {
        self.policy = policy;
    }

    /// Receive statistics
    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Zero the statistics
    pub fn clear_stats(&mut self) {
        self.stats = ReceiverStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldUpdate;
    use crate::frame::{encode_frame, FrameBuilder};
    use crate::sink::Recorder;
    use evdash_hal::SliceSource;

    fn soc_voltage_frame() -> heapless::Vec<u8, MAX_FRAME_LEN> {
        encode_frame(
            [0, 0, 0],
            &[
                FieldUpdate::StateOfCharge(25),
                FieldUpdate::Voltage { volts_x100: 2310 },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_scenario_frame_delivers_batch() {
        let frame = soc_voltage_frame();
        assert_eq!(&frame[..13], &[
            0x5D, 0x47, 0x00, 0x09, 0x00, 0x00, 0x00, 0x85, 0x19, 0x83, 0x09, 0x06, 0x78
        ]);

        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();
        assert_eq!(receiver.feed_bytes(&frame, &mut recorder), 1);
        assert_eq!(
            recorder.updates(),
            &[
                FieldUpdate::StateOfCharge(25),
                FieldUpdate::Voltage { volts_x100: 2310 },
            ]
        );
        assert_eq!(recorder.batches(), 1);
        assert_eq!(receiver.stats().frames, 1);
        assert_eq!(receiver.stats().bytes, 15);
    }

    #[test]
    fn test_altered_crc_delivers_nothing() {
        let mut frame = soc_voltage_frame();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();
        let mut errors = 0;
        for &byte in frame.iter() {
            if receiver.feed(byte, &mut recorder) == Err(FrameError::ChecksumMismatch) {
                errors += 1;
            }
        }

        assert_eq!(errors, 1);
        assert!(recorder.updates().is_empty());
        assert_eq!(recorder.batches(), 0);
        assert_eq!(receiver.stats().checksum_errors, 1);
        assert_eq!(receiver.stats().validation_errors(), 1);
    }

    #[test]
    fn test_bad_end_marker_is_counted() {
        let mut frame = soc_voltage_frame();
        frame[12] = 0x00;

        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();
        assert_eq!(receiver.feed_bytes(&frame, &mut recorder), 0);
        assert_eq!(receiver.stats().end_marker_errors, 1);
        assert_eq!(recorder.batches(), 0);
    }

    #[test]
    fn test_truncated_frame_still_ends_batch() {
        let mut builder = FrameBuilder::default();
        builder
            .field(&FieldUpdate::StateOfCharge(60))
            .unwrap()
            .raw(&[0x8A, 0x01, 0x2C, 0x8C, 0x00])
            .unwrap();
        // Odometer needs 4 value bytes, only 1 is left before ETX
        let frame = builder.finish().unwrap();

        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();
        assert_eq!(receiver.feed_bytes(&frame, &mut recorder), 1);
        assert_eq!(
            recorder.updates(),
            &[
                FieldUpdate::StateOfCharge(60),
                FieldUpdate::AmbientTemp { celsius_x10: 300 },
            ]
        );
        assert_eq!(recorder.batches(), 1);
        assert_eq!(receiver.stats().truncated, 1);
    }

    #[test]
    fn test_framing_errors_counted() {
        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();

        // False start, then an out-of-range length
        receiver.feed_bytes(&[0x5D, 0x00, 0x5D, 0x47, 0xFF, 0xFF], &mut recorder);
        assert_eq!(receiver.stats().invalid_start, 1);
        assert_eq!(receiver.stats().invalid_length, 1);
        assert_eq!(receiver.stats().framing_errors(), 2);
        assert!(!receiver.in_frame());

        // Still synchronizes on the next frame
        assert_eq!(receiver.feed_bytes(&soc_voltage_frame(), &mut recorder), 1);
    }

    #[test]
    fn test_skipped_and_discarded_counts() {
        let mut builder = FrameBuilder::default();
        builder
            .raw(&[0x8E, 0x00, 0x00, 0x86, 0x09])
            .unwrap()
            .field(&FieldUpdate::StateOfCharge(50))
            .unwrap();
        let frame = builder.finish().unwrap();

        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();
        receiver.feed_bytes(&frame, &mut recorder);

        assert_eq!(recorder.updates(), &[FieldUpdate::StateOfCharge(50)]);
        assert_eq!(receiver.stats().skipped_tags, 1);
        assert_eq!(receiver.stats().discarded_values, 1);
    }

    #[test]
    fn test_poll_drains_source() {
        let mut stream: heapless::Vec<u8, 64> = heapless::Vec::new();
        stream.extend_from_slice(&[0x00, 0x13, 0x5D]).unwrap();
        stream.extend_from_slice(&soc_voltage_frame()).unwrap();
        stream.extend_from_slice(&soc_voltage_frame()).unwrap();

        let mut source = SliceSource::new(&stream);
        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();

        let outcome = receiver.poll(&mut source, &mut recorder).unwrap();
        assert_eq!(outcome.bytes, stream.len());
        assert_eq!(outcome.batches, 2);
        assert!(source.is_exhausted());

        let outcome = receiver.poll(&mut source, &mut recorder).unwrap();
        assert_eq!(outcome, PollOutcome::default());
    }

    #[test]
    fn test_poll_counts_with_saturated_stats() {
        let frame = soc_voltage_frame();
        let mut source = SliceSource::new(&frame);
        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();
        receiver.stats.bytes = u32::MAX;
        receiver.stats.frames = u32::MAX;

        let outcome = receiver.poll(&mut source, &mut recorder).unwrap();
        assert_eq!(outcome.bytes, frame.len());
        assert_eq!(outcome.batches, 1);
        assert_eq!(receiver.stats().bytes, u32::MAX);
        assert_eq!(receiver.stats().frames, u32::MAX);
    }

    #[test]
    fn test_poll_error_keeps_progress() {
        struct FailAfter<'a> {
            bytes: SliceSource<'a>,
        }

        impl ByteSource for FailAfter<'_> {
            type Error = ();

            fn read_byte(&mut self) -> Result<Option<u8>, ()> {
                match self.bytes.read_byte() {
                    Ok(Some(byte)) => Ok(Some(byte)),
                    _ => Err(()),
                }
            }
        }

        let frame = soc_voltage_frame();
        let mut source = FailAfter {
            bytes: SliceSource::new(&frame),
        };
        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();

        let err = receiver.poll(&mut source, &mut recorder).unwrap_err();
        assert_eq!(
            err.outcome,
            PollOutcome {
                bytes: frame.len(),
                batches: 1,
            }
        );
        assert_eq!(recorder.batches(), 1);
    }

    #[test]
    fn test_reset_mid_frame() {
        let frame = soc_voltage_frame();
        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();

        receiver.feed_bytes(&frame[..6], &mut recorder);
        assert!(receiver.in_frame());
        receiver.reset();
        assert!(!receiver.in_frame());

        assert_eq!(receiver.feed_bytes(&frame, &mut recorder), 1);
    }

    #[test]
    fn test_custom_policy() {
        let mut builder = FrameBuilder::default();
        builder
            .raw(&[0x20, 0x01, 0x02])
            .unwrap()
            .field(&FieldUpdate::StateOfCharge(50))
            .unwrap();
        let frame = builder.finish().unwrap();

        // Default policy skips one byte after 0x20 and misreads 0x02 as a tag
        let mut receiver = TelemetryReceiver::<MAX_FRAME_LEN>::new();
        let mut recorder = Recorder::<8>::new();
        receiver.feed_bytes(&frame, &mut recorder);
        assert_eq!(receiver.stats().skipped_tags, 2);

        let policy = SkipPolicy::default()
            .with_rule(crate::decoder::SkipRule::new(0x20, 0x2F, 2))
            .unwrap();
        receiver.set_policy(policy);
        receiver.clear_stats();
        recorder.clear();
        receiver.feed_bytes(&frame, &mut recorder);
        assert_eq!(receiver.stats().skipped_tags, 1);
        assert_eq!(recorder.updates(), &[FieldUpdate::StateOfCharge(50)]);
    }
}
