//! Payload decoding
//!
//! A payload is a flat run of `(tag, value)` entries. Known tags have fixed
//! widths (see [`FieldId::width`]); unknown tags are stepped over using a
//! [`SkipPolicy`] so that the entries after them stay aligned. Every read is
//! bounds-checked against the payload end: a trailing entry that does not
//! fit ends decoding with [`DecodeError::Truncated`] instead of reading past
//! the frame.

use core::iter::FusedIterator;

use heapless::Vec;

use crate::fields::{FieldId, FieldUpdate};
use crate::sink::UpdateSink;

/// Maximum number of skip rules in a policy
pub const MAX_SKIP_RULES: usize = 8;

/// Errors that can occur while decoding a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// The entry starting at `offset` needs more bytes than the payload has left
    Truncated { tag: u8, offset: usize },
}

/// Errors that can occur while building a skip policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PolicyError {
    /// `first` is greater than `last`
    InvalidRange,
    /// Rule table is full
    TooManyRules,
}

/// Skip width for a contiguous range of unknown tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SkipRule {
    /// First tag covered (inclusive)
    pub first: u8,
    /// Last tag covered (inclusive)
    pub last: u8,
    /// Value bytes following the tag
    pub width: u8,
}

impl SkipRule {
    /// Create a rule covering `first..=last`
    pub const fn new(first: u8, last: u8, width: u8) -> Self {
        Self { first, last, width }
    }

    /// Returns true if `tag` falls in this rule's range
    pub fn contains(&self, tag: u8) -> bool {
        (self.first..=self.last).contains(&tag)
    }
}

/// Telemetry tag range whose unknown members are assumed 2 bytes wide
pub const TELEMETRY_SKIP_RULE: SkipRule = SkipRule::new(0x80, 0x8F, 2);

/// Width table for tags the decoder does not recognise
///
/// The first matching rule wins; tags matched by no rule use the default
/// width. Known tags never consult the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SkipPolicy {
    rules: Vec<SkipRule, MAX_SKIP_RULES>,
    default_width: u8,
}

impl Default for SkipPolicy {
    /// 2 bytes for unknown tags in 0x80..=0x8F, 1 byte for anything else
    fn default() -> Self {
        Self {
            // MAX_SKIP_RULES is at least one
            rules: [TELEMETRY_SKIP_RULE].into_iter().collect(),
            default_width: 1,
        }
    }
}

impl SkipPolicy {
    /// Create a policy with no rules
    pub const fn new(default_width: u8) -> Self {
        Self {
            rules: Vec::new(),
            default_width,
        }
    }

    /// Append a rule; earlier rules take precedence
    pub fn add_rule(&mut self, rule: SkipRule) -> Result<(), PolicyError> {
        if rule.first > rule.last {
            return Err(PolicyError::InvalidRange);
        }
        self.rules
            .push(rule)
            .map_err(|_| PolicyError::TooManyRules)
    }

    /// Builder-style [`add_rule`](Self::add_rule)
    pub fn with_rule(mut self, rule: SkipRule) -> Result<Self, PolicyError> {
        self.add_rule(rule)?;
        Ok(self)
    }

    /// Configured rules, in precedence order
    pub fn rules(&self) -> &[SkipRule] {
        &self.rules
    }

    /// Width used when no rule matches
    pub fn default_width(&self) -> u8 {
        self.default_width
    }

    /// Value bytes to skip after an unknown `tag`
    pub fn skip_width(&self, tag: u8) -> usize {
        self.rules
            .iter()
            .find(|rule| rule.contains(tag))
            .map_or(self.default_width, |rule| rule.width) as usize
    }
}

/// Lazy iterator over the field updates in a payload
///
/// Yields updates in payload order. Yields at most one error, after which
/// it is exhausted.
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    payload: &'a [u8],
    policy: &'a SkipPolicy,
    pos: usize,
    skipped: u16,
    discarded: u16,
    done: bool,
}

impl<'a> Fields<'a> {
    /// Start decoding `payload`
    pub fn new(payload: &'a [u8], policy: &'a SkipPolicy) -> Self {
        Self {
            payload,
            policy,
            pos: 0,
            skipped: 0,
            discarded: 0,
            done: false,
        }
    }

    /// Unknown tags stepped over so far
    pub fn skipped(&self) -> u16 {
        self.skipped
    }

    /// Known tags whose value had no meaning (e.g. an undefined mode) so far
    pub fn discarded(&self) -> u16 {
        self.discarded
    }

    /// Payload bytes consumed so far
    pub fn position(&self) -> usize {
        self.pos
    }

    fn truncated(&mut self, tag: u8, offset: usize) -> Option<Result<FieldUpdate, DecodeError>> {
        self.done = true;
        Some(Err(DecodeError::Truncated { tag, offset }))
    }
}

impl Iterator for Fields<'_> {
    type Item = Result<FieldUpdate, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let offset = self.pos;
            let tag = *self.payload.get(offset)?;
            let value_start = offset + 1;

            match FieldId::from_tag(tag) {
                Some(id) => {
                    let value_end = value_start + id.width();
                    let Some(value) = self.payload.get(value_start..value_end) else {
                        return self.truncated(tag, offset);
                    };
                    self.pos = value_end;

                    match FieldUpdate::decode(id, value) {
                        Some(update) => return Some(Ok(update)),
                        None => self.discarded = self.discarded.saturating_add(1),
                    }
                }
                None => {
                    let value_end = value_start + self.policy.skip_width(tag);
                    if value_end > self.payload.len() {
                        return self.truncated(tag, offset);
                    }
                    self.pos = value_end;
                    self.skipped = self.skipped.saturating_add(1);
                }
            }
        }
        None
    }
}

impl FusedIterator for Fields<'_> {}

/// Decode `payload` into a lazy sequence of field updates
pub fn decode<'a>(payload: &'a [u8], policy: &'a SkipPolicy) -> Fields<'a> {
    Fields::new(payload, policy)
}

/// Outcome of delivering one frame's updates to a sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatchSummary {
    /// Updates delivered
    pub updates: u16,
    /// Unknown tags skipped
    pub skipped: u16,
    /// Known tags with meaningless values
    pub discarded: u16,
    /// Decoding stopped at a truncated trailing entry
    pub truncated: Option<DecodeError>,
}

/// Decode `payload` and deliver its updates to `sink` as one batch
///
/// Updates go out in payload order and are always followed by exactly one
/// `end_batch`, including when decoding stopped early.
pub fn decode_into<S: UpdateSink + ?Sized>(
    payload: &[u8],
    policy: &SkipPolicy,
    sink: &mut S,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let mut fields = decode(payload, policy);

    for result in &mut fields {
        match result {
            Ok(update) => {
                sink.update(update);
                summary.updates = summary.updates.saturating_add(1);
            }
            Err(e) => summary.truncated = Some(e),
        }
    }

    summary.skipped = fields.skipped();
    summary.discarded = fields.discarded();
    sink.end_batch();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{ArmedState, DrivingMode};
    use crate::sink::Recorder;

    fn collect(payload: &[u8], policy: &SkipPolicy) -> (Vec<FieldUpdate, 32>, Option<DecodeError>) {
        let mut updates = Vec::new();
        let mut error = None;
        for result in decode(payload, policy) {
            match result {
                Ok(update) => updates.push(update).unwrap(),
                Err(e) => error = Some(e),
            }
        }
        (updates, error)
    }

    #[test]
    fn test_decode_scenario_payload() {
        let policy = SkipPolicy::default();
        let (updates, error) = collect(&[0x85, 0x19, 0x83, 0x09, 0x06], &policy);
        assert_eq!(
            updates.as_slice(),
            &[
                FieldUpdate::StateOfCharge(25),
                FieldUpdate::Voltage { volts_x100: 2310 },
            ]
        );
        assert_eq!(error, None);
    }

    #[test]
    fn test_decode_every_width() {
        let payload = [
            0x86, 0x01, // mode City
            0x87, 0x01, // armed
            0x8C, 0x00, 0x00, 0x30, 0x39, // odometer 12345
            0x84, 0x80, 0x64, // current -1.00 A
        ];
        let (updates, error) = collect(&payload, &SkipPolicy::default());
        assert_eq!(
            updates.as_slice(),
            &[
                FieldUpdate::Mode(DrivingMode::City),
                FieldUpdate::Armed(ArmedState::Armed),
                FieldUpdate::Odometer { km_x10: 12345 },
                FieldUpdate::Current { amps_x100: -100 },
            ]
        );
        assert_eq!(error, None);
    }

    #[test]
    fn test_unknown_telemetry_tag_skips_two() {
        // 0x8E is unassigned in the telemetry range
        let payload = [0x8E, 0x85, 0x42, 0x85, 0x19];
        let policy = SkipPolicy::default();
        let mut fields = decode(&payload, &policy);
        assert_eq!(fields.next(), Some(Ok(FieldUpdate::StateOfCharge(25))));
        assert_eq!(fields.next(), None);
        assert_eq!(fields.skipped(), 1);
    }

    #[test]
    fn test_unknown_tag_outside_range_skips_one() {
        let payload = [0x10, 0xAA, 0x85, 0x19];
        let policy = SkipPolicy::default();
        let mut fields = decode(&payload, &policy);
        assert_eq!(fields.next(), Some(Ok(FieldUpdate::StateOfCharge(25))));
        assert_eq!(fields.next(), None);
        assert_eq!(fields.skipped(), 1);
    }

    #[test]
    fn test_truncated_known_field() {
        let payload = [0x85, 0x19, 0x83, 0x09];
        let (updates, error) = collect(&payload, &SkipPolicy::default());
        assert_eq!(updates.as_slice(), &[FieldUpdate::StateOfCharge(25)]);
        assert_eq!(error, Some(DecodeError::Truncated { tag: 0x83, offset: 2 }));
    }

    #[test]
    fn test_truncated_unknown_tag() {
        let payload = [0x85, 0x19, 0x8F, 0x01];
        let (updates, error) = collect(&payload, &SkipPolicy::default());
        assert_eq!(updates.as_slice(), &[FieldUpdate::StateOfCharge(25)]);
        assert_eq!(error, Some(DecodeError::Truncated { tag: 0x8F, offset: 2 }));
    }

    #[test]
    fn test_truncated_odometer() {
        let payload = [0x8C, 0x00, 0x00, 0x30];
        let (updates, error) = collect(&payload, &SkipPolicy::default());
        assert!(updates.is_empty());
        assert_eq!(error, Some(DecodeError::Truncated { tag: 0x8C, offset: 0 }));
    }

    #[test]
    fn test_iterator_is_fused_after_error() {
        let payload = [0x83];
        let policy = SkipPolicy::default();
        let mut fields = decode(&payload, &policy);
        assert!(matches!(fields.next(), Some(Err(_))));
        assert_eq!(fields.next(), None);
        assert_eq!(fields.next(), None);
    }

    #[test]
    fn test_unknown_mode_is_discarded() {
        let payload = [0x86, 0x07, 0x85, 0x50];
        let policy = SkipPolicy::default();
        let mut fields = decode(&payload, &policy);
        assert_eq!(fields.next(), Some(Ok(FieldUpdate::StateOfCharge(80))));
        assert_eq!(fields.next(), None);
        assert_eq!(fields.discarded(), 1);
        assert_eq!(fields.skipped(), 0);
    }

    #[test]
    fn test_empty_payload() {
        let (updates, error) = collect(&[], &SkipPolicy::default());
        assert!(updates.is_empty());
        assert_eq!(error, None);
    }

    #[test]
    fn test_custom_policy_first_rule_wins() {
        let policy = SkipPolicy::new(0)
            .with_rule(SkipRule::new(0x90, 0x90, 4))
            .unwrap()
            .with_rule(SkipRule::new(0x90, 0x9F, 1))
            .unwrap();

        assert_eq!(policy.skip_width(0x90), 4);
        assert_eq!(policy.skip_width(0x91), 1);
        assert_eq!(policy.skip_width(0x20), 0);

        let payload = [0x90, 1, 2, 3, 4, 0x20, 0x85, 0x19];
        let (updates, error) = collect(&payload, &policy);
        assert_eq!(updates.as_slice(), &[FieldUpdate::StateOfCharge(25)]);
        assert_eq!(error, None);
    }

    #[test]
    fn test_policy_rejects_bad_rules() {
        let mut policy = SkipPolicy::new(1);
        assert_eq!(
            policy.add_rule(SkipRule::new(0x90, 0x80, 2)),
            Err(PolicyError::InvalidRange)
        );
        for _ in 0..MAX_SKIP_RULES {
            policy.add_rule(TELEMETRY_SKIP_RULE).unwrap();
        }
        assert_eq!(
            policy.add_rule(TELEMETRY_SKIP_RULE),
            Err(PolicyError::TooManyRules)
        );
    }

    #[test]
    fn test_decode_into_always_ends_batch() {
        let policy = SkipPolicy::default();
        let mut recorder = Recorder::<8>::new();

        let summary = decode_into(&[0x85, 0x19, 0x83, 0x09], &policy, &mut recorder);
        assert_eq!(summary.updates, 1);
        assert!(summary.truncated.is_some());
        assert_eq!(recorder.updates(), &[FieldUpdate::StateOfCharge(25)]);
        assert_eq!(recorder.batches(), 1);

        let summary = decode_into(&[0x8E, 0x00, 0x00], &policy, &mut recorder);
        assert_eq!(summary.updates, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.truncated, None);
        assert_eq!(recorder.batches(), 2);
    }
}
