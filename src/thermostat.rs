//! The control interface shared by both protocol variants and the closed set
//! of drivers implementing it.
use crate::{
    protocol::{BatteryVoltage, Mode, ProtocolVariant, Temperature, ThermostatStatus, ValvePosition},
    register::{RegisterDriver, RegisterTiming},
    status_line::{StatusLineDriver, StatusLineTiming},
    transport::Transport,
    Error, Result,
};

/// Operations every HR20 protocol variant supports.
pub trait ThermostatControl {
    /// Sets the desired temperature, which must lie within
    /// [`Temperature::MIN`]`..=`[`Temperature::MAX`].
    fn set_desired_temperature(&mut self, temperature: Temperature) -> Result<()>;

    fn read_desired_temperature(&mut self) -> Result<Temperature>;

    /// Selects [`Mode::Manual`] or [`Mode::Automatic`].
    fn set_mode(&mut self, mode: Mode) -> Result<()>;

    /// Reads the current mode. An encoding the driver does not know is
    /// reported as `Ok(Mode::Invalid)`.
    fn read_mode(&mut self) -> Result<Mode>;
}

/// A thermostat driver, selected once by [`ProtocolVariant`].
#[derive(Debug)]
pub enum Thermostat<T> {
    Register(RegisterDriver<T>),
    StatusLine(StatusLineDriver<T>),
}

impl<T: Transport> Thermostat<T> {
    /// Creates the driver for `variant` with default timing.
    pub fn new(variant: ProtocolVariant, transport: T) -> Self {
        match variant {
            ProtocolVariant::Register => Thermostat::Register(RegisterDriver::new(transport)),
            ProtocolVariant::StatusLine => {
                Thermostat::StatusLine(StatusLineDriver::new(transport))
            }
        }
    }

    pub fn with_timing(
        variant: ProtocolVariant,
        transport: T,
        register: RegisterTiming,
        status_line: StatusLineTiming,
    ) -> Self {
        match variant {
            ProtocolVariant::Register => {
                Thermostat::Register(RegisterDriver::with_timing(transport, register))
            }
            ProtocolVariant::StatusLine => {
                Thermostat::StatusLine(StatusLineDriver::with_timing(transport, status_line))
            }
        }
    }

    pub fn variant(&self) -> ProtocolVariant {
        match self {
            Thermostat::Register(_) => ProtocolVariant::Register,
            Thermostat::StatusLine(_) => ProtocolVariant::StatusLine,
        }
    }

    fn as_control(&mut self) -> &mut dyn ThermostatControl {
        match self {
            Thermostat::Register(driver) => driver,
            Thermostat::StatusLine(driver) => driver,
        }
    }

    fn status_line(&mut self, what: &'static str) -> Result<&mut StatusLineDriver<T>> {
        match self {
            Thermostat::StatusLine(driver) => Ok(driver),
            Thermostat::Register(_) => Err(Error::Unsupported(what)),
        }
    }

    pub fn read_current_temperature(&mut self) -> Result<Temperature> {
        self.status_line("Reading the current temperature")?
            .read_current_temperature()
    }

    pub fn read_battery_voltage(&mut self) -> Result<BatteryVoltage> {
        self.status_line("Reading the battery voltage")?
            .read_battery_voltage()
    }

    pub fn read_valve_position(&mut self) -> Result<ValvePosition> {
        self.status_line("Reading the valve position")?
            .read_valve_position()
    }

    /// Reads every value the variant provides, one request per value.
    pub fn read_status(&mut self) -> Result<ThermostatStatus> {
        let desired_temperature = self.read_desired_temperature()?;
        let mode = self.read_mode()?;
        let mut status = ThermostatStatus {
            desired_temperature,
            mode,
            current_temperature: None,
            battery_voltage: None,
            valve_position: None,
        };
        if let Thermostat::StatusLine(driver) = self {
            status.current_temperature = Some(driver.read_current_temperature()?);
            status.battery_voltage = Some(driver.read_battery_voltage()?);
            status.valve_position = Some(driver.read_valve_position()?);
        }
        Ok(status)
    }
}

impl<T: Transport> ThermostatControl for Thermostat<T> {
    fn set_desired_temperature(&mut self, temperature: Temperature) -> Result<()> {
        self.as_control().set_desired_temperature(temperature)
    }

    fn read_desired_temperature(&mut self) -> Result<Temperature> {
        self.as_control().read_desired_temperature()
    }

    fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.as_control().set_mode(mode)
    }

    fn read_mode(&mut self) -> Result<Mode> {
        self.as_control().read_mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        transport::mock::{open_hr20_device, register_device, MockTransport, OpenHr20State, Registers},
        ErrorKind,
    };
    use assert_matches::assert_matches;
    use std::{cell::RefCell, rc::Rc};

    fn register_thermostat() -> Thermostat<MockTransport> {
        let transport = MockTransport::new().respond_with(register_device(Registers::default()));
        Thermostat::new(ProtocolVariant::Register, transport)
    }

    fn status_line_thermostat() -> Thermostat<MockTransport> {
        let state = Rc::new(RefCell::new(OpenHr20State::default()));
        let transport = MockTransport::new().respond_with(open_hr20_device(state));
        Thermostat::new(ProtocolVariant::StatusLine, transport)
    }

    #[test]
    fn variant_selection() {
        assert_eq!(register_thermostat().variant(), ProtocolVariant::Register);
        assert_eq!(
            status_line_thermostat().variant(),
            ProtocolVariant::StatusLine
        );
    }

    #[test]
    fn mode_round_trip_for_both_variants() {
        for mut thermostat in [register_thermostat(), status_line_thermostat()] {
            thermostat.set_mode(Mode::Automatic).unwrap();
            assert_eq!(thermostat.read_mode().unwrap(), Mode::Automatic);
            thermostat.set_mode(Mode::Manual).unwrap();
            assert_eq!(thermostat.read_mode().unwrap(), Mode::Manual);
        }
    }

    #[test]
    fn temperature_round_trip_for_both_variants() {
        for mut thermostat in [register_thermostat(), status_line_thermostat()] {
            thermostat
                .set_desired_temperature(Temperature::from_decidegrees(215))
                .unwrap();
            assert_eq!(
                thermostat.read_desired_temperature().unwrap(),
                Temperature::from_decidegrees(215)
            );
        }
    }

    #[test]
    fn status_line_status() {
        let status = status_line_thermostat().read_status().unwrap();
        assert_eq!(
            status,
            ThermostatStatus {
                desired_temperature: Temperature::from_decidegrees(225),
                mode: Mode::Automatic,
                current_temperature: Some(Temperature::from_decidegrees(210)),
                battery_voltage: Some(BatteryVoltage(3200)),
                valve_position: Some(ValvePosition(45)),
            }
        );
    }

    #[test]
    fn register_status() {
        let mut thermostat = register_thermostat();
        thermostat
            .set_desired_temperature(Temperature::from_decidegrees(180))
            .unwrap();
        thermostat.set_mode(Mode::Manual).unwrap();
        let status = thermostat.read_status().unwrap();
        assert_eq!(status.desired_temperature, Temperature::from_decidegrees(180));
        assert_eq!(status.mode, Mode::Manual);
        assert_eq!(status.current_temperature, None);
        assert_eq!(status.battery_voltage, None);
        assert_eq!(status.valve_position, None);
    }

    #[test]
    fn status_line_only_values() {
        let mut thermostat = register_thermostat();
        let error = thermostat.read_battery_voltage().unwrap_err();
        assert_matches!(error, Error::Unsupported(..));
        assert_eq!(error.kind(), ErrorKind::GenericFailure);
        assert_matches!(
            thermostat.read_valve_position(),
            Err(Error::Unsupported(..))
        );
        assert_matches!(
            thermostat.read_current_temperature(),
            Err(Error::Unsupported(..))
        );
    }
}
