//! Device memory and the command interpreter's side-effect engine
//! (spec §4.2).

use rand::{Rng, SeedableRng, rngs::StdRng};
use regctl_protocol::{
    ErrorCode, Message,
    regmap::{Base, Component, mask, offset},
};

/// The authoritative register bytes for one simulated device, plus the RNG
/// driving sensor simulation. One instance is owned by the server for its
/// whole lifetime and is always accessed under a single mutex (spec §4.2
/// "Concurrency").
pub struct DeviceMemory {
    connected_device: u8,
    power_state: u8,
    error_state: u8,
    reserved_main: u8,
    sensor_a_id: u8,
    sensor_b_id: u8,
    sensor_a_reading: u8,
    sensor_b_reading: u8,
    actuator_led: u8,
    actuator_fan: u8,
    actuator_heater: u8,
    actuator_doors: u8,
    power_sensors: u8,
    power_actuators: u8,
    reset_sensors: u8,
    reset_actuators: u8,
    rng: StdRng,
}

impl Default for DeviceMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceMemory {
    /// `device_init` (spec §4.2): the fixed initial register values, plus
    /// randomized sensor readings.
    #[must_use]
    pub fn new() -> Self {
        let mut rng = StdRng::from_os_rng();
        Self {
            connected_device: 0xFF,
            power_state: 0xFF,
            error_state: 0x00,
            reserved_main: 0x00,
            sensor_a_id: 0xA1,
            sensor_b_id: 0xB2,
            sensor_a_reading: rng.random(),
            sensor_b_reading: rng.random(),
            actuator_led: 0x00,
            actuator_fan: 0x00,
            actuator_heater: 0x00,
            actuator_doors: 0x00,
            power_sensors: mask::POWER_SENSORS,
            power_actuators: mask::POWER_ACTUATORS,
            reset_sensors: 0x00,
            reset_actuators: 0x00,
            rng,
        }
    }

    /// Dispatches one parsed frame and advances the sensor simulation
    /// exactly once, whether or not the command was accepted (spec §4.2
    /// "Sensor update").
    pub fn dispatch(&mut self, msg: Message) -> Message {
        let response = self.dispatch_command(msg);
        self.tick_sensors();
        response
    }

    /// Dispatches one raw wire payload, parsing it first. A payload that is
    /// not exactly six hex characters is syntactically invalid and yields
    /// `forbidden` (spec §4.2, §9 open question 2) without reaching the
    /// command interpreter proper; the sensor tick still runs exactly once,
    /// matching every other dispatched command.
    pub fn dispatch_frame(&mut self, frame: &str) -> Message {
        let response = match Message::parse(frame) {
            Ok(msg) => self.dispatch_command(msg),
            Err(_) => Message::make_error(ErrorCode::Forbidden),
        };
        self.tick_sensors();
        response
    }

    fn dispatch_command(&mut self, msg: Message) -> Message {
        let Some(base) = Base::from_nibble(msg.base) else {
            return Message::make_error(ErrorCode::Forbidden);
        };
        if base == Base::Reserved {
            return Message::make_error(ErrorCode::Forbidden);
        }
        if msg.rw != 0 && msg.rw != 1 {
            return Message::make_error(ErrorCode::Invalid);
        }
        match base {
            Base::Reserved => unreachable!("handled above"),
            Base::Main => self.dispatch_main(msg),
            Base::Sensor => self.dispatch_sensor(msg),
            Base::Actuator => self.dispatch_actuator(msg),
            Base::Control => self.dispatch_control(msg),
        }
    }

    fn dispatch_main(&self, msg: Message) -> Message {
        if msg.is_write() {
            return Message::make_error(ErrorCode::Forbidden);
        }
        let value = match msg.offset {
            offset::main::CONNECTED_DEVICE => self.connected_device,
            offset::main::RESERVED => self.reserved_main,
            offset::main::POWER_STATE => self.power_state,
            offset::main::ERROR_STATE => self.error_state,
            _ => return Message::make_error(ErrorCode::Invalid),
        };
        read_response(msg, value)
    }

    fn dispatch_sensor(&self, msg: Message) -> Message {
        if msg.is_write() {
            return Message::make_error(ErrorCode::Forbidden);
        }
        let value = match msg.offset {
            offset::sensor::TEMP_ID => self.sensor_a_id,
            offset::sensor::TEMP_VALUE => self.sensor_a_reading,
            offset::sensor::HUMID_ID => self.sensor_b_id,
            offset::sensor::HUMID_VALUE => self.sensor_b_reading,
            _ => return Message::make_error(ErrorCode::Invalid),
        };
        read_response(msg, value)
    }

    fn dispatch_actuator(&mut self, msg: Message) -> Message {
        match msg.offset {
            offset::actuator::LED => self.rw_actuator(msg, |m| &mut m.actuator_led, 0xFF),
            offset::actuator::FAN => self.rw_actuator(msg, |m| &mut m.actuator_fan, 0xFF),
            offset::actuator::HEATER => {
                self.rw_actuator(msg, |m| &mut m.actuator_heater, mask::HEATER_WRITE)
            }
            offset::actuator::DOORS => {
                self.rw_actuator(msg, |m| &mut m.actuator_doors, mask::DOORS_WRITE)
            }
            _ => Message::make_error(ErrorCode::Invalid),
        }
    }

    fn rw_actuator(
        &mut self,
        msg: Message,
        field: impl FnOnce(&mut Self) -> &mut u8,
        write_mask: u8,
    ) -> Message {
        if msg.is_write() {
            *field(self) = msg.data & write_mask;
            // Writes echo the request verbatim, not the post-mask value
            // (spec §4.2, §8 P5).
            msg
        } else {
            let value = *field(self);
            read_response(msg, value)
        }
    }

    fn dispatch_control(&mut self, msg: Message) -> Message {
        match msg.offset {
            offset::control::POWER_SENSORS => self.rw_control(msg, |m, data| {
                m.power_sensors = data & mask::POWER_SENSORS;
                m.propagate_power(mask::POWER_SENSORS, data);
            }),
            offset::control::POWER_ACTUATORS => self.rw_control(msg, |m, data| {
                m.power_actuators = data & mask::POWER_ACTUATORS;
                m.propagate_power(mask::POWER_ACTUATORS, data);
            }),
            offset::control::RESET_SENSORS => {
                self.rw_control(msg, |m, data| m.apply_reset(data, mask::RESET_SENSORS, false))
            }
            offset::control::RESET_ACTUATORS => {
                self.rw_control(msg, |m, data| m.apply_reset(data, mask::RESET_ACTUATORS, true))
            }
            _ => Message::make_error(ErrorCode::Invalid),
        }
    }

    fn rw_control(&mut self, msg: Message, apply_write: impl FnOnce(&mut Self, u8)) -> Message {
        if msg.is_write() {
            apply_write(self, msg.data);
            // Echo the request verbatim, as with any accepted write.
            msg
        } else {
            let value = match msg.offset {
                offset::control::POWER_SENSORS => self.power_sensors,
                offset::control::POWER_ACTUATORS => self.power_actuators,
                offset::control::RESET_SENSORS => self.reset_sensors,
                offset::control::RESET_ACTUATORS => self.reset_actuators,
                _ => unreachable!("offset already matched by caller"),
            };
            read_response(msg, value)
        }
    }

    /// Sets or clears `mask`'s bits in `connected_device`/`power_state`
    /// according to the corresponding bits of `data` (spec §4.2: "set both
    /// bits if the corresponding write bit is 1, clear both bits
    /// otherwise").
    fn propagate_power(&mut self, mask: u8, data: u8) {
        let set_bits = data & mask;
        let clear_bits = mask & !data;
        self.connected_device = (self.connected_device | set_bits) & !clear_bits;
        self.power_state = (self.power_state | set_bits) & !clear_bits;
    }

    /// Applies a reset-register write: clear the matching `error_state`
    /// bits, optionally zero the matching actuator register, then
    /// auto-clear the reset register itself (spec §4.2, §8 P4).
    fn apply_reset(&mut self, data: u8, mask: u8, actuators: bool) {
        let bits = data & mask;
        self.error_state &= !bits;
        if actuators {
            for component in [Component::Led, Component::Fan, Component::Heater, Component::Doors]
            {
                if bits & component.bit() != 0 {
                    *self.actuator_field_mut(component) = 0;
                }
            }
            self.reset_actuators = 0;
        } else {
            self.reset_sensors = 0;
        }
    }

    fn actuator_field_mut(&mut self, component: Component) -> &mut u8 {
        match component {
            Component::Led => &mut self.actuator_led,
            Component::Fan => &mut self.actuator_fan,
            Component::Heater => &mut self.actuator_heater,
            Component::Doors => &mut self.actuator_doors,
            Component::Temperature | Component::Humidity => {
                unreachable!("sensors have no actuator register")
            }
        }
    }

    /// Advances the sensor simulation by one tick. Only runs while the
    /// owning sensor is powered (spec §8 P8); the walk itself and the ~1%
    /// error-raise probability are not part of the observable contract
    /// (spec §4.2, §9 open question 3).
    fn tick_sensors(&mut self) {
        if self.power_state & mask::TEMP_SENSOR != 0 {
            self.sensor_a_reading = walk(self.sensor_a_reading, self.actuator_heater, &mut self.rng);
            if self.rng.random_bool(0.01) {
                self.error_state |= mask::TEMP_SENSOR;
            }
        }
        if self.power_state & mask::HUMID_SENSOR != 0 {
            self.sensor_b_reading = walk(self.sensor_b_reading, self.actuator_fan, &mut self.rng);
            if self.rng.random_bool(0.01) {
                self.error_state |= mask::HUMID_SENSOR;
            }
        }
    }

    /// Test-only hook for injecting device state that is otherwise only
    /// reachable through a long sequence of commands (spec §8 scenario 6:
    /// "Induce `error_state` bit 0... or patch it via test hook").
    pub fn set_error_state_for_test(&mut self, value: u8) {
        self.error_state = value;
    }

    #[cfg(test)]
    pub(crate) fn error_state(&self) -> u8 {
        self.error_state
    }
}

fn read_response(request: Message, value: u8) -> Message {
    Message {
        base: request.base,
        offset: request.offset,
        rw: request.rw,
        data: value,
    }
}

/// A bounded random walk, biased slightly toward the owning actuator's
/// value, clamped to the full `u8` range.
fn walk(current: u8, bias_source: u8, rng: &mut StdRng) -> u8 {
    let bias = (i32::from(bias_source) - 128) / 64; // roughly -2..=1
    let step = rng.random_range(-2..=2) + bias;
    (i32::from(current) + step).clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use regctl_protocol::regmap::Base;

    fn read(base: Base, offset: u8) -> Message {
        Message::make_read(base.as_u8(), offset)
    }

    fn write(base: Base, offset: u8, data: u8) -> Message {
        Message::make_write(base.as_u8(), offset, data)
    }

    #[test]
    fn initial_state_matches_device_init() {
        let mem = DeviceMemory::new();
        assert_eq!(mem.connected_device, 0xFF);
        assert_eq!(mem.power_state, 0xFF);
        assert_eq!(mem.error_state, 0x00);
        assert_eq!(mem.power_sensors, 0x11);
        assert_eq!(mem.power_actuators, 0x55);
    }

    #[test]
    fn base_zero_is_always_forbidden() {
        let mut mem = DeviceMemory::new();
        let resp = mem.dispatch(read(Base::Reserved, 0x00));
        assert_eq!(resp.error(), Some(ErrorCode::Forbidden));
    }

    #[test]
    fn main_write_is_forbidden() {
        let mut mem = DeviceMemory::new();
        let resp = mem.dispatch(write(Base::Main, offset::main::POWER_STATE, 0x00));
        assert_eq!(resp.error(), Some(ErrorCode::Forbidden));
    }

    #[test]
    fn main_unknown_offset_is_invalid() {
        let mut mem = DeviceMemory::new();
        let resp = mem.dispatch(read(Base::Main, 0x09));
        assert_eq!(resp.error(), Some(ErrorCode::Invalid));
    }

    #[test]
    fn invalid_rw_nibble_yields_invalid() {
        let mut mem = DeviceMemory::new();
        let msg = Message {
            base: Base::Main.as_u8(),
            offset: offset::main::POWER_STATE,
            rw: 2,
            data: 0,
        };
        assert_eq!(mem.dispatch(msg).error(), Some(ErrorCode::Invalid));
    }

    #[test]
    fn led_write_and_readback() {
        let mut mem = DeviceMemory::new();
        let resp = mem.dispatch(write(Base::Actuator, offset::actuator::LED, 0x80));
        assert_eq!(resp, write(Base::Actuator, offset::actuator::LED, 0x80));
        let resp = mem.dispatch(read(Base::Actuator, offset::actuator::LED));
        assert_eq!(resp.data, 0x80);
    }

    #[test]
    fn heater_write_is_masked_to_low_nibble() {
        let mut mem = DeviceMemory::new();
        let resp = mem.dispatch(write(Base::Actuator, offset::actuator::HEATER, 0x55));
        // write echo carries the *request* data, unmasked.
        assert_eq!(resp.data, 0x55);
        let resp = mem.dispatch(read(Base::Actuator, offset::actuator::HEATER));
        assert_eq!(resp.data, 0x05);
    }

    #[test]
    fn doors_write_is_masked_to_even_bits() {
        let mut mem = DeviceMemory::new();
        mem.dispatch(write(Base::Actuator, offset::actuator::DOORS, 0xFF));
        let resp = mem.dispatch(read(Base::Actuator, offset::actuator::DOORS));
        assert_eq!(resp.data, 0x55);
    }

    #[test]
    fn power_sensors_propagates_to_connected_device_and_power_state() {
        let mut mem = DeviceMemory::new();
        mem.dispatch(write(Base::Control, offset::control::POWER_SENSORS, 0x00));
        let power_state = mem.dispatch(read(Base::Main, offset::main::POWER_STATE));
        assert_eq!(power_state.data & 0x11, 0x00);
        let connected = mem.dispatch(read(Base::Main, offset::main::CONNECTED_DEVICE));
        assert_eq!(connected.data & 0x11, 0x00);

        mem.dispatch(write(Base::Control, offset::control::POWER_SENSORS, 0x11));
        let power_state = mem.dispatch(read(Base::Main, offset::main::POWER_STATE));
        assert_eq!(power_state.data & 0x11, 0x11);
    }

    #[test]
    fn power_actuators_propagates_with_its_own_mask() {
        let mut mem = DeviceMemory::new();
        mem.dispatch(write(Base::Control, offset::control::POWER_ACTUATORS, 0x00));
        let power_state = mem.dispatch(read(Base::Main, offset::main::POWER_STATE));
        assert_eq!(power_state.data & 0x55, 0x00);
    }

    #[test]
    fn reset_sensors_clears_error_bit_and_auto_clears() {
        let mut mem = DeviceMemory::new();
        mem.set_error_state_for_test(0x01);
        let resp = mem.dispatch(write(Base::Control, offset::control::RESET_SENSORS, 0x01));
        assert_eq!(resp.data, 0x01); // echo
        let readback = mem.dispatch(read(Base::Control, offset::control::RESET_SENSORS));
        assert_eq!(readback.data, 0x00);
        assert_eq!(mem.error_state() & 0x01, 0x00);
    }

    #[test]
    fn reset_actuators_zeroes_actuator_register() {
        let mut mem = DeviceMemory::new();
        mem.dispatch(write(Base::Actuator, offset::actuator::LED, 0xAB));
        mem.dispatch(write(Base::Control, offset::control::RESET_ACTUATORS, 0x01));
        let resp = mem.dispatch(read(Base::Actuator, offset::actuator::LED));
        assert_eq!(resp.data, 0x00);
        let readback = mem.dispatch(read(Base::Control, offset::control::RESET_ACTUATORS));
        assert_eq!(readback.data, 0x00);
    }

    #[test]
    fn sensor_reading_is_stable_while_unpowered() {
        let mut mem = DeviceMemory::new();
        mem.dispatch(write(Base::Control, offset::control::POWER_SENSORS, 0x00));
        let first = mem
            .dispatch(read(Base::Sensor, offset::sensor::TEMP_VALUE))
            .data;
        for _ in 0..64 {
            let next = mem
                .dispatch(read(Base::Sensor, offset::sensor::TEMP_VALUE))
                .data;
            assert_eq!(next, first);
        }
    }

    #[test]
    fn malformed_frame_yields_forbidden() {
        let mut mem = DeviceMemory::new();
        assert_eq!(
            mem.dispatch_frame("not6!").error(),
            Some(ErrorCode::Forbidden)
        );
        assert_eq!(
            mem.dispatch_frame("1002000").error(),
            Some(ErrorCode::Forbidden)
        );
    }

    #[test]
    fn write_echo_matches_request_exactly() {
        let mut mem = DeviceMemory::new();
        let req = write(Base::Actuator, offset::actuator::FAN, 0x42);
        let resp = mem.dispatch(req);
        assert_eq!(resp, req);
    }
}
