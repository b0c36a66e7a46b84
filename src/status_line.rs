//! Driver for HR20 thermostats running the OpenHR20 firmware.
//!
//! The firmware answers the status request `D\n` with a single line of
//! labelled fields, for example:
//!
//! ```text
//! D: d6 17.10.26 12:00:00 A V: 45 I: 2100 S: 2250 B: 3200 Is: 00000000 X
//! ```
//!
//! Each value is taken from a fixed window behind its label (see
//! [`StatusField`]). Setters are plain commands without acknowledgement:
//! `A<step hex>\n` sets the desired temperature in 0.5°C steps and
//! `M00\n`/`M01\n` select manual/automatic mode.
use crate::{
    protocol::{decode_decimal, BatteryVoltage, Mode, Temperature, ValvePosition},
    scanner::{scan_for_marker, Field, ScanPolicy},
    transport::Transport,
    Error, Result, ThermostatControl,
};
use log::*;
use std::time::Duration;

pub const STATUS_REQUEST: &[u8] = b"D\n";
pub const MODE_MANUAL_COMMAND: &[u8] = b"\nM00\n";
pub const MODE_AUTOMATIC_COMMAND: &[u8] = b"\nM01\n";
/// Temperatures are set in steps of 0.5°C.
pub const TEMPERATURE_STEP: i16 = 5;
pub const FIELD_CAPACITY: usize = 16;

/// Location of one value within the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusField {
    /// Label preceding the value.
    pub label: &'static str,
    /// Bytes between the label and the value.
    pub skip: usize,
    /// Width of the value.
    pub len: usize,
}

/// `S: 2250` holds 22.50°C, only the first three digits are used.
pub const DESIRED_TEMPERATURE: StatusField = StatusField {
    label: "S: ",
    skip: 0,
    len: 3,
};
pub const CURRENT_TEMPERATURE: StatusField = StatusField {
    label: "I: ",
    skip: 0,
    len: 3,
};
pub const BATTERY_VOLTAGE: StatusField = StatusField {
    label: "B: ",
    skip: 0,
    len: 4,
};
pub const VALVE_POSITION: StatusField = StatusField {
    label: "V: ",
    skip: 0,
    len: 2,
};
/// The mode letter follows the weekday, date and time: `D: d6 17.10.26 12:00:00 A`.
pub const MODE: StatusField = StatusField {
    label: "D: ",
    skip: 21,
    len: 1,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StatusLineTiming {
    /// Pause between the flushing newline and draining the receive buffer.
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub settle_delay: Duration,
    /// Polling of the status line after a request.
    pub scan: ScanPolicy,
}

impl Default for StatusLineTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            scan: ScanPolicy::new(10, Duration::from_millis(10)),
        }
    }
}

/// Rounds down to the next 0.5°C step.
pub fn quantize(temperature: Temperature) -> Temperature {
    let value = temperature.as_decidegrees();
    Temperature::from_decidegrees(value - value.rem_euclid(TEMPERATURE_STEP))
}

/// Builds the `A` command for a settable temperature.
pub fn encode_temperature_command(temperature: Temperature) -> Result<String> {
    if !temperature.is_settable() {
        return Err(Error::TemperatureOutOfRange(temperature));
    }
    let step = quantize(temperature).as_decidegrees() / TEMPERATURE_STEP;
    Ok(format!("\nA{step:x}\n"))
}

pub fn decode_mode(field: &[u8]) -> Mode {
    match field.first() {
        Some(b'A') => Mode::Automatic,
        Some(b'M') => Mode::Manual,
        _ => Mode::Invalid,
    }
}

/// Driver for the status-line (OpenHR20) protocol.
#[derive(Debug)]
pub struct StatusLineDriver<T> {
    transport: T,
    timing: StatusLineTiming,
}

impl<T: Transport> StatusLineDriver<T> {
    pub fn new(transport: T) -> Self {
        Self::with_timing(transport, StatusLineTiming::default())
    }

    pub fn with_timing(transport: T, timing: StatusLineTiming) -> Self {
        Self { transport, timing }
    }

    pub fn timing(&self) -> &StatusLineTiming {
        &self.timing
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Terminates any partial command and discards pending input.
    fn flush_input(&mut self) -> Result<()> {
        self.transport.write_all(b"\n")?;
        self.transport.flush()?;
        self.transport.delay(self.timing.settle_delay);
        let dropped = self.transport.drain()?;
        if dropped > 0 {
            trace!("Discarded {dropped} buffered bytes");
        }
        Ok(())
    }

    fn send(&mut self, command: &[u8]) -> Result<()> {
        debug!("Sending {:?}", String::from_utf8_lossy(command));
        self.transport.write_all(command)?;
        self.transport.flush()?;
        Ok(())
    }

    /// Requests a status line and extracts `field` from it.
    pub fn read_field(&mut self, field: StatusField) -> Result<Field<FIELD_CAPACITY>> {
        self.flush_input()?;
        self.send(STATUS_REQUEST)?;

        let extracted =
            scan_for_marker(&mut self.transport, field.label.as_bytes(), &self.timing.scan)
                .and_then(|()| {
                    Field::read(&mut self.transport, field.skip, field.len, &self.timing.scan)
                });
        let cleanup = self.flush_input();

        let extracted = extracted?;
        cleanup?;
        debug!(
            "Field {:?} holds {:?}",
            field.label,
            String::from_utf8_lossy(extracted.as_bytes())
        );
        Ok(extracted)
    }

    fn read_number(&mut self, field: StatusField) -> Result<u32> {
        let extracted = self.read_field(field)?;
        decode_decimal(extracted.as_bytes()).ok_or(Error::ResponseMismatch)
    }

    fn read_temperature(&mut self, field: StatusField) -> Result<Temperature> {
        let value = self.read_number(field)?;
        i16::try_from(value)
            .map(Temperature::from_decidegrees)
            .map_err(|_| Error::ResponseMismatch)
    }

    /// Temperature measured by the thermostat.
    pub fn read_current_temperature(&mut self) -> Result<Temperature> {
        self.read_temperature(CURRENT_TEMPERATURE)
    }

    pub fn read_battery_voltage(&mut self) -> Result<BatteryVoltage> {
        let value = self.read_number(BATTERY_VOLTAGE)?;
        u16::try_from(value)
            .map(BatteryVoltage)
            .map_err(|_| Error::ResponseMismatch)
    }

    pub fn read_valve_position(&mut self) -> Result<ValvePosition> {
        let value = self.read_number(VALVE_POSITION)?;
        u8::try_from(value)
            .map(ValvePosition)
            .map_err(|_| Error::ResponseMismatch)
    }
}

impl<T: Transport> ThermostatControl for StatusLineDriver<T> {
    /// Rounds down to 0.5°C and sends the step. The firmware does not
    /// acknowledge, so success only means the command was transmitted.
    fn set_desired_temperature(&mut self, temperature: Temperature) -> Result<()> {
        let command = encode_temperature_command(temperature)?;
        self.send(command.as_bytes())
    }

    fn read_desired_temperature(&mut self) -> Result<Temperature> {
        self.read_temperature(DESIRED_TEMPERATURE)
    }

    fn set_mode(&mut self, mode: Mode) -> Result<()> {
        match mode {
            Mode::Manual => self.send(MODE_MANUAL_COMMAND),
            Mode::Automatic => self.send(MODE_AUTOMATIC_COMMAND),
            Mode::Invalid => Err(Error::InvalidMode(mode)),
        }
    }

    fn read_mode(&mut self) -> Result<Mode> {
        let extracted = self.read_field(MODE)?;
        Ok(decode_mode(extracted.as_bytes()))
    }
}
