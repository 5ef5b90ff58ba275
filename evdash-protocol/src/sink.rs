//! Delivery of decoded updates to the display layer

use heapless::Vec;

use crate::fields::FieldUpdate;

/// Consumer of decoded field updates
///
/// For every valid frame the receiver calls [`update`](Self::update) once
/// per field in payload order, then [`end_batch`](Self::end_batch) exactly
/// once. Consumers can apply values as they arrive and defer expensive
/// work such as redrawing until the batch ends.
pub trait UpdateSink {
    /// Apply one decoded field
    fn update(&mut self, update: FieldUpdate);

    /// All fields of the current frame have been delivered
    fn end_batch(&mut self);
}

impl<S: UpdateSink + ?Sized> UpdateSink for &mut S {
    fn update(&mut self, update: FieldUpdate) {
        (**self).update(update)
    }

    fn end_batch(&mut self) {
        (**self).end_batch()
    }
}

/// Sink that records every update and counts batches
///
/// Keeps the first `N` updates; later ones are counted but not stored.
/// Handy for replaying captures and for tests.
#[derive(Debug, Clone, Default)]
pub struct Recorder<const N: usize> {
    updates: Vec<FieldUpdate, N>,
    dropped: u32,
    batches: u32,
}

impl<const N: usize> Recorder<N> {
    /// Create an empty recorder
    pub const fn new() -> Self {
        Self {
            updates: Vec::new(),
            dropped: 0,
            batches: 0,
        }
    }

    /// Recorded updates, in delivery order
    pub fn updates(&self) -> &[FieldUpdate] {
        &self.updates
    }

    /// Updates that did not fit
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Completed batches
    pub fn batches(&self) -> u32 {
        self.batches
    }

    /// Forget everything recorded so far
    pub fn clear(&mut self) {
        self.updates.clear();
        self.dropped = 0;
        self.batches = 0;
    }
}

impl<const N: usize> UpdateSink for Recorder<N> {
    fn update(&mut self, update: FieldUpdate) {
        if self.updates.push(update).is_err() {
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    fn end_batch(&mut self) {
        self.batches = self.batches.saturating_add(1);
    }
}
