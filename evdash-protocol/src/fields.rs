//! Telemetry field identifiers and typed field updates
//!
//! Every payload entry starts with a one-byte tag. Known tags select a fixed
//! value width and a fixed-point scale; values are kept at wire resolution
//! (`_x100` = hundredths, `_x10` = tenths) and converted to natural units on
//! demand.

// Wire format tags
pub const TAG_BATTERY_TEMP: u8 = 0x80;
pub const TAG_SPEED: u8 = 0x82;
pub const TAG_VOLTAGE: u8 = 0x83;
pub const TAG_CURRENT: u8 = 0x84;
pub const TAG_SOC: u8 = 0x85;
pub const TAG_MODE: u8 = 0x86;
pub const TAG_ARMED: u8 = 0x87;
pub const TAG_RANGE: u8 = 0x88;
pub const TAG_CONSUMPTION: u8 = 0x89;
pub const TAG_AMBIENT_TEMP: u8 = 0x8A;
pub const TAG_TRIP: u8 = 0x8B;
pub const TAG_ODOMETER: u8 = 0x8C;
pub const TAG_AVG_SPEED: u8 = 0x8D;

/// Sign bit of the sign-magnitude current encoding
const CURRENT_SIGN: u16 = 0x8000;

/// Largest value width of any known field
pub const MAX_VALUE_WIDTH: usize = 4;

/// Telemetry field identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldId {
    /// Battery state of charge
    StateOfCharge,
    /// Pack voltage
    Voltage,
    /// Pack current (negative while regenerating)
    Current,
    /// Battery temperature
    BatteryTemp,
    /// Vehicle speed
    Speed,
    /// Driving mode
    Mode,
    /// Armed/disarmed status
    Armed,
    /// Estimated remaining range
    Range,
    /// Average consumption
    Consumption,
    /// Ambient temperature, shown as motor temperature on the dashboard
    AmbientTemp,
    /// Trip distance
    Trip,
    /// Total distance
    Odometer,
    /// Average speed
    AvgSpeed,
}

impl FieldId {
    /// Number of field identifiers
    pub const COUNT: usize = 13;

    /// All identifiers, in display order
    pub const ALL: [FieldId; Self::COUNT] = [
        FieldId::Speed,
        FieldId::Range,
        FieldId::Consumption,
        FieldId::Trip,
        FieldId::Odometer,
        FieldId::AvgSpeed,
        FieldId::BatteryTemp,
        FieldId::AmbientTemp,
        FieldId::Mode,
        FieldId::Armed,
        FieldId::StateOfCharge,
        FieldId::Voltage,
        FieldId::Current,
    ];

    /// Look up the field carried by a wire tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_SOC => Some(FieldId::StateOfCharge),
            TAG_VOLTAGE => Some(FieldId::Voltage),
            TAG_CURRENT => Some(FieldId::Current),
            TAG_BATTERY_TEMP => Some(FieldId::BatteryTemp),
            TAG_SPEED => Some(FieldId::Speed),
            TAG_MODE => Some(FieldId::Mode),
            TAG_ARMED => Some(FieldId::Armed),
            TAG_RANGE => Some(FieldId::Range),
            TAG_CONSUMPTION => Some(FieldId::Consumption),
            TAG_AMBIENT_TEMP => Some(FieldId::AmbientTemp),
            TAG_TRIP => Some(FieldId::Trip),
            TAG_ODOMETER => Some(FieldId::Odometer),
            TAG_AVG_SPEED => Some(FieldId::AvgSpeed),
            _ => None,
        }
    }

    /// Wire tag for this field
    pub const fn tag(self) -> u8 {
        match self {
            FieldId::StateOfCharge => TAG_SOC,
            FieldId::Voltage => TAG_VOLTAGE,
            FieldId::Current => TAG_CURRENT,
            FieldId::BatteryTemp => TAG_BATTERY_TEMP,
            FieldId::Speed => TAG_SPEED,
            FieldId::Mode => TAG_MODE,
            FieldId::Armed => TAG_ARMED,
            FieldId::Range => TAG_RANGE,
            FieldId::Consumption => TAG_CONSUMPTION,
            FieldId::AmbientTemp => TAG_AMBIENT_TEMP,
            FieldId::Trip => TAG_TRIP,
            FieldId::Odometer => TAG_ODOMETER,
            FieldId::AvgSpeed => TAG_AVG_SPEED,
        }
    }

    /// Value width in bytes (excluding the tag byte)
    pub const fn width(self) -> usize {
        match self {
            FieldId::StateOfCharge | FieldId::Mode | FieldId::Armed => 1,
            FieldId::Odometer => 4,
            _ => 2,
        }
    }

    /// Dense index in `0..COUNT`, usable as a bit position
    pub const fn index(self) -> usize {
        match self {
            FieldId::BatteryTemp => 0,
            FieldId::Speed => 1,
            FieldId::Voltage => 2,
            FieldId::Current => 3,
            FieldId::StateOfCharge => 4,
            FieldId::Mode => 5,
            FieldId::Armed => 6,
            FieldId::Range => 7,
            FieldId::Consumption => 8,
            FieldId::AmbientTemp => 9,
            FieldId::Trip => 10,
            FieldId::Odometer => 11,
            FieldId::AvgSpeed => 12,
        }
    }
}

/// Driving mode selected on the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrivingMode {
    Eco,
    City,
    Sport,
}

// Wire format values
const MODE_ECO: u8 = 0;
const MODE_CITY: u8 = 1;
const MODE_SPORT: u8 = 2;

impl DrivingMode {
    /// Parse a mode from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            MODE_ECO => Some(DrivingMode::Eco),
            MODE_CITY => Some(DrivingMode::City),
            MODE_SPORT => Some(DrivingMode::Sport),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            DrivingMode::Eco => MODE_ECO,
            DrivingMode::City => MODE_CITY,
            DrivingMode::Sport => MODE_SPORT,
        }
    }

    /// Dashboard label
    pub fn label(self) -> &'static str {
        match self {
            DrivingMode::Eco => "Eco",
            DrivingMode::City => "City",
            DrivingMode::Sport => "Sport",
        }
    }
}

/// Armed status of the drive system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmedState {
    Disarmed,
    Armed,
}

impl ArmedState {
    /// Any nonzero byte means armed
    pub fn from_byte(byte: u8) -> Self {
        if byte == 0 {
            ArmedState::Disarmed
        } else {
            ArmedState::Armed
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            ArmedState::Disarmed => 0,
            ArmedState::Armed => 1,
        }
    }

    /// Returns true when armed
    pub fn is_armed(self) -> bool {
        matches!(self, ArmedState::Armed)
    }

    /// Dashboard label
    pub fn label(self) -> &'static str {
        match self {
            ArmedState::Disarmed => "DISARMED",
            ArmedState::Armed => "ARMED",
        }
    }
}

/// One decoded telemetry value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldUpdate {
    /// State of charge in percent
    StateOfCharge(u8),
    /// Pack voltage in 0.01 V
    Voltage { volts_x100: u16 },
    /// Pack current in 0.01 A
    Current { amps_x100: i16 },
    /// Battery temperature in 0.1 °C
    BatteryTemp { celsius_x10: u16 },
    /// Speed in 0.1 km/h
    Speed { kmh_x10: u16 },
    /// Driving mode
    Mode(DrivingMode),
    /// Armed status
    Armed(ArmedState),
    /// Remaining range in 0.1 km
    Range { km_x10: u16 },
    /// Average consumption in 0.1 W/km
    Consumption { w_per_km_x10: u16 },
    /// Ambient (motor) temperature in 0.1 °C
    AmbientTemp { celsius_x10: u16 },
    /// Trip distance in 0.1 km
    Trip { km_x10: u16 },
    /// Odometer in 0.1 km
    Odometer { km_x10: u32 },
    /// Average speed in 0.1 km/h
    AvgSpeed { kmh_x10: u16 },
}

impl FieldUpdate {
    /// Decode a value for `id` from exactly `id.width()` bytes
    ///
    /// Returns `None` if the slice has the wrong width, or if the value is
    /// not meaningful for the field (an unknown driving mode).
    pub fn decode(id: FieldId, value: &[u8]) -> Option<Self> {
        match (id, value) {
            (FieldId::StateOfCharge, &[soc]) => Some(FieldUpdate::StateOfCharge(soc)),
            (FieldId::Mode, &[mode]) => DrivingMode::from_byte(mode).map(FieldUpdate::Mode),
            (FieldId::Armed, &[armed]) => Some(FieldUpdate::Armed(ArmedState::from_byte(armed))),
            (FieldId::Odometer, &[a, b, c, d]) => Some(FieldUpdate::Odometer {
                km_x10: u32::from_be_bytes([a, b, c, d]),
            }),
            (id, &[hi, lo]) => {
                let raw = u16::from_be_bytes([hi, lo]);
                match id {
                    FieldId::Voltage => Some(FieldUpdate::Voltage { volts_x100: raw }),
                    FieldId::Current => Some(FieldUpdate::Current {
                        amps_x100: decode_current(raw),
                    }),
                    FieldId::BatteryTemp => Some(FieldUpdate::BatteryTemp { celsius_x10: raw }),
                    FieldId::Speed => Some(FieldUpdate::Speed { kmh_x10: raw }),
                    FieldId::Range => Some(FieldUpdate::Range { km_x10: raw }),
                    FieldId::Consumption => Some(FieldUpdate::Consumption { w_per_km_x10: raw }),
                    FieldId::AmbientTemp => Some(FieldUpdate::AmbientTemp { celsius_x10: raw }),
                    FieldId::Trip => Some(FieldUpdate::Trip { km_x10: raw }),
                    FieldId::AvgSpeed => Some(FieldUpdate::AvgSpeed { kmh_x10: raw }),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Field this update belongs to
    pub fn id(&self) -> FieldId {
        match self {
            FieldUpdate::StateOfCharge(_) => FieldId::StateOfCharge,
            FieldUpdate::Voltage { .. } => FieldId::Voltage,
            FieldUpdate::Current { .. } => FieldId::Current,
            FieldUpdate::BatteryTemp { .. } => FieldId::BatteryTemp,
            FieldUpdate::Speed { .. } => FieldId::Speed,
            FieldUpdate::Mode(_) => FieldId::Mode,
            FieldUpdate::Armed(_) => FieldId::Armed,
            FieldUpdate::Range { .. } => FieldId::Range,
            FieldUpdate::Consumption { .. } => FieldId::Consumption,
            FieldUpdate::AmbientTemp { .. } => FieldId::AmbientTemp,
            FieldUpdate::Trip { .. } => FieldId::Trip,
            FieldUpdate::Odometer { .. } => FieldId::Odometer,
            FieldUpdate::AvgSpeed { .. } => FieldId::AvgSpeed,
        }
    }

    /// Encode the value bytes (without tag) into `out`
    ///
    /// Returns the number of bytes written, always `self.id().width()`.
    pub fn encode_value(&self, out: &mut [u8; MAX_VALUE_WIDTH]) -> usize {
        let raw16 = match *self {
            FieldUpdate::StateOfCharge(soc) => {
                out[0] = soc;
                return 1;
            }
            FieldUpdate::Mode(mode) => {
                out[0] = mode.to_byte();
                return 1;
            }
            FieldUpdate::Armed(armed) => {
                out[0] = armed.to_byte();
                return 1;
            }
            FieldUpdate::Odometer { km_x10 } => {
                *out = km_x10.to_be_bytes();
                return 4;
            }
            FieldUpdate::Current { amps_x100 } => encode_current(amps_x100),
            FieldUpdate::Voltage { volts_x100: raw }
            | FieldUpdate::BatteryTemp { celsius_x10: raw }
            | FieldUpdate::Speed { kmh_x10: raw }
            | FieldUpdate::Range { km_x10: raw }
            | FieldUpdate::Consumption { w_per_km_x10: raw }
            | FieldUpdate::AmbientTemp { celsius_x10: raw }
            | FieldUpdate::Trip { km_x10: raw }
            | FieldUpdate::AvgSpeed { kmh_x10: raw } => raw,
        };
        out[..2].copy_from_slice(&raw16.to_be_bytes());
        2
    }

    /// Value in natural units (percent, V, A, °C, km/h, km, W/km)
    ///
    /// Mode and armed state map to their wire values.
    pub fn as_f32(&self) -> f32 {
        match *self {
            FieldUpdate::StateOfCharge(soc) => f32::from(soc),
            FieldUpdate::Voltage { volts_x100 } => f32::from(volts_x100) / 100.0,
            FieldUpdate::Current { amps_x100 } => f32::from(amps_x100) / 100.0,
            FieldUpdate::Mode(mode) => f32::from(mode.to_byte()),
            FieldUpdate::Armed(armed) => f32::from(armed.to_byte()),
            FieldUpdate::Odometer { km_x10 } => km_x10 as f32 / 10.0,
            FieldUpdate::BatteryTemp { celsius_x10: raw }
            | FieldUpdate::Speed { kmh_x10: raw }
            | FieldUpdate::Range { km_x10: raw }
            | FieldUpdate::Consumption { w_per_km_x10: raw }
            | FieldUpdate::AmbientTemp { celsius_x10: raw }
            | FieldUpdate::Trip { km_x10: raw }
            | FieldUpdate::AvgSpeed { kmh_x10: raw } => f32::from(raw) / 10.0,
        }
    }
}

/// Sign-magnitude to two's complement
fn decode_current(raw: u16) -> i16 {
    let magnitude = (raw & !CURRENT_SIGN) as i16;
    if raw & CURRENT_SIGN != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Two's complement to sign-magnitude, saturating at ±327.67 A
fn encode_current(amps_x100: i16) -> u16 {
    let magnitude = amps_x100.unsigned_abs().min(!CURRENT_SIGN);
    if amps_x100 < 0 {
        CURRENT_SIGN | magnitude
    } else {
        magnitude
    }
}
