//! The driver's high-level API (spec §4.4 table): status, sensors,
//! actuators, power/reset, and error-state queries, all built on top of
//! [`crate::registers`]'s `read_register`/`write_register`.

use regctl_protocol::regmap::{offset, mask, Base, Component};

use crate::error::{Error, ErrorKind};
use crate::session::DriverSession;

/// A snapshot of device-reported status (spec §4.4 `get_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub connected: bool,
    pub sensors_powered: bool,
    pub actuators_powered: bool,
    pub has_errors: bool,
}

fn door_bit_or_err(id: u8) -> Result<u8, Error> {
    regctl_protocol::regmap::door_bit(id)
        .ok_or_else(|| Error::new(ErrorKind::InvalidParameter, format!("door id {id} is out of range 1..=4")))
}

impl DriverSession {
    /// `get_status(out)`.
    pub async fn get_status(&self) -> Result<Status, Error> {
        let connected_device = self.read_register(Base::Main, offset::main::CONNECTED_DEVICE).await?;
        let power_state = self.read_register(Base::Main, offset::main::POWER_STATE).await?;
        let error_state = self.read_register(Base::Main, offset::main::ERROR_STATE).await?;

        Ok(Status {
            connected: connected_device != 0,
            sensors_powered: power_state & (mask::TEMP_SENSOR | mask::HUMID_SENSOR) != 0,
            actuators_powered: power_state & (mask::LED | mask::FAN | mask::HEATER | mask::DOORS) != 0,
            has_errors: error_state != 0,
        })
    }

    /// `get_temperature(out)`.
    pub async fn get_temperature(&self) -> Result<u8, Error> {
        self.read_register(Base::Sensor, offset::sensor::TEMP_VALUE).await
    }

    /// `get_humidity(out)`.
    pub async fn get_humidity(&self) -> Result<u8, Error> {
        self.read_register(Base::Sensor, offset::sensor::HUMID_VALUE).await
    }

    /// `get_led(out)`.
    pub async fn get_led(&self) -> Result<u8, Error> {
        self.read_register(Base::Actuator, offset::actuator::LED).await
    }

    /// `set_led(v)`.
    pub async fn set_led(&self, value: u8) -> Result<(), Error> {
        self.write_register(Base::Actuator, offset::actuator::LED, value).await
    }

    /// `get_fan(out)`.
    pub async fn get_fan(&self) -> Result<u8, Error> {
        self.read_register(Base::Actuator, offset::actuator::FAN).await
    }

    /// `set_fan(v)`.
    pub async fn set_fan(&self, value: u8) -> Result<(), Error> {
        self.write_register(Base::Actuator, offset::actuator::FAN, value).await
    }

    /// `get_heater(out)`: masks with `0x0F` before returning.
    pub async fn get_heater(&self) -> Result<u8, Error> {
        let raw = self.read_register(Base::Actuator, offset::actuator::HEATER).await?;
        Ok(raw & mask::HEATER_WRITE)
    }

    /// `set_heater(v)`: read-modify-write preserving the upper (reserved)
    /// nibble: writes `(current & ~0x0F) | (v & 0x0F)`.
    pub async fn set_heater(&self, value: u8) -> Result<(), Error> {
        let current = self.read_register(Base::Actuator, offset::actuator::HEATER).await?;
        let next = (current & !mask::HEATER_WRITE) | (value & mask::HEATER_WRITE);
        self.write_register(Base::Actuator, offset::actuator::HEATER, next).await
    }

    /// `set_door(id, state)`: reads current doors, sets or clears the
    /// single bit for `id`, masks with `0x55`, writes back, then reads back
    /// to verify the target bit has the expected value.
    pub async fn set_door(&self, id: u8, open: bool) -> Result<(), Error> {
        let bit = door_bit_or_err(id)?;

        let current = self.read_register(Base::Actuator, offset::actuator::DOORS).await?;
        let next = if open { current | bit } else { current & !bit };
        let next = next & mask::DOORS_WRITE;
        self.write_register(Base::Actuator, offset::actuator::DOORS, next).await?;

        let verify = self.read_register(Base::Actuator, offset::actuator::DOORS).await?;
        let actual_open = verify & bit != 0;
        if actual_open != open {
            return Err(self
                .record_error(Error::new(
                    ErrorKind::DeviceError,
                    format!("door {id} verification failed: expected open={open}, device reports open={actual_open}"),
                ))
                .await);
        }
        Ok(())
    }

    /// `get_door_state(id, out)`: always reads fresh from the device.
    pub async fn get_door_state(&self, id: u8) -> Result<bool, Error> {
        let bit = door_bit_or_err(id)?;
        let doors = self.read_register(Base::Actuator, offset::actuator::DOORS).await?;
        Ok(doors & bit != 0)
    }

    /// `set_power_state(component, on)`: updates only the bit for
    /// `component` in the applicable `power_sensors`/`power_actuators`
    /// register, preserving the other bits.
    pub async fn set_power_state(&self, component: Component, on: bool) -> Result<(), Error> {
        let reg_offset = if component.is_sensor() {
            offset::control::POWER_SENSORS
        } else {
            offset::control::POWER_ACTUATORS
        };
        let current = self.read_register(Base::Control, reg_offset).await?;
        let bit = component.bit();
        let next = if on { current | bit } else { current & !bit };
        self.write_register(Base::Control, reg_offset, next).await
    }

    /// `reset_component(component)`: sets only the bit for `component` in
    /// the applicable reset register, clearing the other bits, then writes
    /// back. The device auto-clears the register after applying it.
    pub async fn reset_component(&self, component: Component) -> Result<(), Error> {
        let reg_offset = if component.is_sensor() {
            offset::control::RESET_SENSORS
        } else {
            offset::control::RESET_ACTUATORS
        };
        self.write_register(Base::Control, reg_offset, component.bit()).await
    }

    /// `get_power_state(component, out)`: reads `MAIN.power_state`,
    /// projects to `component`'s bit.
    pub async fn get_power_state(&self, component: Component) -> Result<bool, Error> {
        let power_state = self.read_register(Base::Main, offset::main::POWER_STATE).await?;
        Ok(power_state & component.bit() != 0)
    }

    /// `get_error_state(component, out)`: reads `MAIN.error_state`,
    /// projects to `component`'s bit.
    pub async fn get_error_state(&self, component: Component) -> Result<bool, Error> {
        let error_state = self.read_register(Base::Main, offset::main::ERROR_STATE).await?;
        Ok(error_state & component.bit() != 0)
    }
}
