//! Latest-value store for the dashboard
//!
//! The display redraws from a [`TelemetrySnapshot`] rather than reacting to
//! each update. The snapshot remembers which fields changed so that one
//! frame costs one redraw of just those widgets.

use evdash_protocol::{ArmedState, DrivingMode, FieldId, FieldUpdate, UpdateSink};

/// Set of telemetry fields, one bit per [`FieldId`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldSet(u16);

impl FieldSet {
    /// The empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every field
    pub const fn all() -> Self {
        Self((1 << FieldId::COUNT) - 1)
    }

    /// Add a field
    pub fn insert(&mut self, id: FieldId) {
        self.0 |= 1 << id.index();
    }

    /// Remove a field
    pub fn remove(&mut self, id: FieldId) {
        self.0 &= !(1 << id.index());
    }

    /// Returns true if the field is in the set
    pub fn contains(&self, id: FieldId) -> bool {
        self.0 & (1 << id.index()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Raw bitmask, bit `n` is the field with index `n`
    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Fields in the set, in display order
    pub fn iter(&self) -> impl Iterator<Item = FieldId> + '_ {
        FieldId::ALL.iter().copied().filter(|id| self.contains(*id))
    }
}

impl FromIterator<FieldId> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldId>>(iter: I) -> Self {
        let mut set = FieldSet::empty();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Most recent value of every telemetry field
///
/// Fields the controller has not reported yet read as `None`.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    values: [Option<FieldUpdate>; FieldId::COUNT],
    changed: FieldSet,
    batches: u32,
}

impl TelemetrySnapshot {
    /// Create an empty snapshot
    pub const fn new() -> Self {
        Self {
            values: [None; FieldId::COUNT],
            changed: FieldSet::empty(),
            batches: 0,
        }
    }

    /// Store an update
    ///
    /// The field is marked changed only if its value differs from the
    /// stored one.
    pub fn apply(&mut self, update: FieldUpdate) {
        let id = update.id();
        let slot = &mut self.values[id.index()];
        if *slot != Some(update) {
            *slot = Some(update);
            self.changed.insert(id);
        }
    }

    /// Last stored update for a field
    pub fn get(&self, id: FieldId) -> Option<FieldUpdate> {
        self.values[id.index()]
    }

    /// Fields changed since the last call, clearing the marks
    pub fn take_changed(&mut self) -> FieldSet {
        core::mem::take(&mut self.changed)
    }

    /// Fields changed since the last [`take_changed`](Self::take_changed)
    pub fn changed(&self) -> FieldSet {
        self.changed
    }

    /// Completed batches (valid frames) applied
    pub fn batches(&self) -> u32 {
        self.batches
    }

    /// Forget all values
    ///
    /// Every previously known field is marked changed so the display blanks it.
    pub fn clear(&mut self) {
        for id in FieldId::ALL {
            if self.values[id.index()].take().is_some() {
                self.changed.insert(id);
            }
        }
    }

    /// State of charge in percent
    pub fn soc(&self) -> Option<u8> {
        match self.get(FieldId::StateOfCharge)? {
            FieldUpdate::StateOfCharge(soc) => Some(soc),
            _ => None,
        }
    }

    /// Pack voltage in volts
    pub fn voltage(&self) -> Option<f32> {
        self.natural(FieldId::Voltage)
    }

    /// Pack current in amps, negative while regenerating
    pub fn current(&self) -> Option<f32> {
        self.natural(FieldId::Current)
    }

    /// Battery temperature in whole °C
    pub fn battery_temp_c(&self) -> Option<u16> {
        match self.get(FieldId::BatteryTemp)? {
            FieldUpdate::BatteryTemp { celsius_x10 } => Some(celsius_x10 / 10),
            _ => None,
        }
    }

    /// Ambient temperature in whole °C
    pub fn ambient_temp_c(&self) -> Option<u16> {
        match self.get(FieldId::AmbientTemp)? {
            FieldUpdate::AmbientTemp { celsius_x10 } => Some(celsius_x10 / 10),
            _ => None,
        }
    }

    /// Speed in whole km/h
    pub fn speed_kmh(&self) -> Option<u16> {
        match self.get(FieldId::Speed)? {
            FieldUpdate::Speed { kmh_x10 } => Some(kmh_x10 / 10),
            _ => None,
        }
    }

    /// Average speed in whole km/h
    pub fn avg_speed_kmh(&self) -> Option<u16> {
        match self.get(FieldId::AvgSpeed)? {
            FieldUpdate::AvgSpeed { kmh_x10 } => Some(kmh_x10 / 10),
            _ => None,
        }
    }

    /// Remaining range in whole km
    pub fn range_km(&self) -> Option<u16> {
        match self.get(FieldId::Range)? {
            FieldUpdate::Range { km_x10 } => Some(km_x10 / 10),
            _ => None,
        }
    }

    /// Trip distance in whole km
    pub fn trip_km(&self) -> Option<u16> {
        match self.get(FieldId::Trip)? {
            FieldUpdate::Trip { km_x10 } => Some(km_x10 / 10),
            _ => None,
        }
    }

    /// Odometer in whole km
    pub fn odometer_km(&self) -> Option<u32> {
        match self.get(FieldId::Odometer)? {
            FieldUpdate::Odometer { km_x10 } => Some(km_x10 / 10),
            _ => None,
        }
    }

    /// Average consumption in whole W/km
    pub fn consumption_w_per_km(&self) -> Option<u16> {
        match self.get(FieldId::Consumption)? {
            FieldUpdate::Consumption { w_per_km_x10 } => Some(w_per_km_x10 / 10),
            _ => None,
        }
    }

    pub fn mode(&self) -> Option<DrivingMode> {
        match self.get(FieldId::Mode)? {
            FieldUpdate::Mode(mode) => Some(mode),
            _ => None,
        }
    }

    pub fn armed(&self) -> Option<ArmedState> {
        match self.get(FieldId::Armed)? {
            FieldUpdate::Armed(armed) => Some(armed),
            _ => None,
        }
    }

    /// Mode label for the display ("Eco", "City", "Sport")
    pub fn mode_label(&self) -> Option<&'static str> {
        self.mode().map(DrivingMode::label)
    }

    /// Armed label for the display ("ARMED", "DISARMED")
    pub fn armed_label(&self) -> Option<&'static str> {
        self.armed().map(ArmedState::label)
    }

    fn natural(&self, id: FieldId) -> Option<f32> {
        self.get(id).map(|update| update.as_f32())
    }
}

impl UpdateSink for TelemetrySnapshot {
    fn update(&mut self, update: FieldUpdate) {
        self.apply(update);
    }

    fn end_batch(&mut self) {
        self.batches = self.batches.saturating_add(1);
    }
}
