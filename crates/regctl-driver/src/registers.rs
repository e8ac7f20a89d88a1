//! Register read/write helpers (spec §4.4 "Register read/write helpers"):
//! the static access-permission check, single-register reads, and
//! write-verified single-register writes.

use regctl_protocol::{Base, Message};

use crate::error::{Error, ErrorKind};
use crate::session::DriverSession;

/// Mirrors the device's own access rules so bad requests fail locally with
/// a precise error code instead of round-tripping to the device (spec §4.4:
/// "This is an optimization... but it makes error codes more precise").
fn check_access(base: Base, offset: u8, is_write: bool) -> Result<(), Error> {
    if base == Base::Reserved {
        return Err(Error::new(ErrorKind::InvalidParameter, "base 0 is reserved"));
    }
    if is_write && matches!(base, Base::Main | Base::Sensor) {
        return Err(Error::new(
            ErrorKind::InvalidParameter,
            "MAIN and SENSOR registers are read-only",
        ));
    }
    if base == Base::Control {
        use regctl_protocol::regmap::offset::control;
        let known = matches!(
            offset,
            control::POWER_SENSORS | control::POWER_ACTUATORS | control::RESET_SENSORS | control::RESET_ACTUATORS
        );
        if !known {
            return Err(Error::new(ErrorKind::InvalidParameter, "unknown CONTROL offset"));
        }
    }
    Ok(())
}

impl DriverSession {
    /// `read_register(base, offset) → byte`.
    pub(crate) async fn read_register(&self, base: Base, offset: u8) -> Result<u8, Error> {
        if let Err(err) = check_access(base, offset, false) {
            return Err(self.record_error(err).await);
        }

        let request = Message::make_read(base.as_u8(), offset);
        let response = self.exchange(&request).await?;

        if let Some(code) = response.error() {
            return Err(self
                .record_error(Error::new(
                    ErrorKind::DeviceError,
                    format!("device rejected read ({code:?})"),
                ))
                .await);
        }

        Ok(response.data)
    }

    /// `write_register(base, offset, value)`. Requires that the response
    /// echoes `base`, `offset`, `rw=1`, and `data == value` (write
    /// verification); any mismatch is a device-error.
    pub(crate) async fn write_register(&self, base: Base, offset: u8, value: u8) -> Result<(), Error> {
        if let Err(err) = check_access(base, offset, true) {
            return Err(self.record_error(err).await);
        }

        let request = Message::make_write(base.as_u8(), offset, value);
        let response = self.exchange(&request).await?;

        if let Some(code) = response.error() {
            return Err(self
                .record_error(Error::new(
                    ErrorKind::DeviceError,
                    format!("device rejected write ({code:?})"),
                ))
                .await);
        }

        let verified = response.base == base.as_u8()
            && response.offset == offset
            && response.rw == 1
            && response.data == value;
        if !verified {
            return Err(self
                .record_error(Error::new(
                    ErrorKind::DeviceError,
                    format!(
                        "write verification failed: sent data={value:#04X}, echoed {response:?}"
                    ),
                ))
                .await);
        }

        Ok(())
    }
}
