//! The register map: base addresses, per-base offsets, and the write-masks
//! and bit positions that give registers their side-effecting semantics.
//!
//! Bit-position note (spec §9, open question 1): the device's
//! `connected_device`/`power_state`/`error_state` byte shares its bit
//! positions with the `power_sensors`/`power_actuators` write masks below.
//! This module adopts those masks verbatim (temperature at bit 0, humidity
//! at bit 4, led/fan/heater/doors at bits 0/2/4/6) rather than the
//! alternative bit0/bit2/bit4.. layout, because only this reading is
//! consistent with the worked examples in spec §8 (e.g. a `power_sensors`
//! write of `0x11` turns `0xFF` into `0xEE`). Bits 0 and 4 are therefore
//! shared between a sensor and an actuator component; that overlap is a
//! property of the source protocol, not a bug in this implementation.

/// One of the four addressable base spaces (base 0 is reserved and always
/// forbidden).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Base {
    Reserved = 0,
    Main = 1,
    Sensor = 2,
    Actuator = 3,
    Control = 4,
}

impl Base {
    #[must_use]
    pub fn from_nibble(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Reserved),
            1 => Some(Self::Main),
            2 => Some(Self::Sensor),
            3 => Some(Self::Actuator),
            4 => Some(Self::Control),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Offsets within each base space.
pub mod offset {
    pub mod main {
        pub const CONNECTED_DEVICE: u8 = 0x00;
        pub const RESERVED: u8 = 0x01;
        pub const POWER_STATE: u8 = 0x02;
        pub const ERROR_STATE: u8 = 0x03;
    }

    pub mod sensor {
        pub const TEMP_ID: u8 = 0x10;
        pub const TEMP_VALUE: u8 = 0x11;
        pub const HUMID_ID: u8 = 0x20;
        pub const HUMID_VALUE: u8 = 0x21;
    }

    pub mod actuator {
        pub const LED: u8 = 0x10;
        pub const FAN: u8 = 0x20;
        pub const HEATER: u8 = 0x30;
        pub const DOORS: u8 = 0x40;
    }

    pub mod control {
        pub const POWER_SENSORS: u8 = 0xFB;
        pub const POWER_ACTUATORS: u8 = 0xFC;
        pub const RESET_SENSORS: u8 = 0xFD;
        pub const RESET_ACTUATORS: u8 = 0xFE;
    }
}

/// Bit positions and write masks. Names match the source device firmware's
/// constants (spec §3, §9 open question 1), not the alternative table
/// layout.
pub mod mask {
    pub const TEMP_SENSOR: u8 = 0x01;
    pub const HUMID_SENSOR: u8 = 0x10;
    pub const LED: u8 = 0x01;
    pub const FAN: u8 = 0x04;
    pub const HEATER: u8 = 0x10;
    pub const DOORS: u8 = 0x40;

    /// Write-mask for `power_sensors` / `reset_sensors`.
    pub const POWER_SENSORS: u8 = TEMP_SENSOR | HUMID_SENSOR; // 0x11
    /// Write-mask for `reset_sensors`; numerically identical to
    /// [`POWER_SENSORS`] but kept as its own name (spec §9 open question 4).
    pub const RESET_SENSORS: u8 = POWER_SENSORS;

    /// Write-mask for `power_actuators` / `reset_actuators`.
    pub const POWER_ACTUATORS: u8 = LED | FAN | HEATER | DOORS; // 0x55
    /// Write-mask for `reset_actuators`; see [`POWER_ACTUATORS`].
    pub const RESET_ACTUATORS: u8 = POWER_ACTUATORS;

    /// Write-mask for the `heater` actuator register (low nibble only).
    pub const HEATER_WRITE: u8 = 0x0F;
    /// Write-mask for the `doors` actuator register; numerically identical
    /// to [`POWER_ACTUATORS`] but kept distinct (spec §9 open question 4).
    pub const DOORS_WRITE: u8 = 0x55;
}

/// The six logical subsystems a caller can power, reset, or query for
/// errors (spec GLOSSARY "Component").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Temperature,
    Humidity,
    Led,
    Fan,
    Heater,
    Doors,
}

impl Component {
    /// This component's bit within `power_state`/`power_sensors`/
    /// `power_actuators`/`error_state`/reset registers.
    #[must_use]
    pub fn bit(self) -> u8 {
        match self {
            Self::Temperature => mask::TEMP_SENSOR,
            Self::Humidity => mask::HUMID_SENSOR,
            Self::Led => mask::LED,
            Self::Fan => mask::FAN,
            Self::Heater => mask::HEATER,
            Self::Doors => mask::DOORS,
        }
    }

    /// True for sensor components (governed by `power_sensors`/
    /// `reset_sensors`), false for actuator components (governed by
    /// `power_actuators`/`reset_actuators`).
    #[must_use]
    pub fn is_sensor(self) -> bool {
        matches!(self, Self::Temperature | Self::Humidity)
    }
}

/// Maps a door id (1..=4) to its bit position in the `doors` register
/// (`2 * (id - 1)`, spec §4.4 `set_door`).
#[must_use]
pub fn door_bit(id: u8) -> Option<u8> {
    if (1..=4).contains(&id) {
        Some(1 << (2 * (id - 1)))
    } else {
        None
    }
}
