//! Value types shared by both HR20 protocol variants.
//!
//! All temperatures are fixed point in tenths of a degree Celsius
//! (`225` means 22.5°C), which is the unit both firmware variants use on the
//! wire.
use std::{fmt, str::FromStr};

/// Operating mode of the thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Decoded from an unknown encoding, never sent to the device.
    #[default]
    Invalid,
    /// Holds the desired temperature until changed.
    Manual,
    /// Follows the heating program stored in the thermostat.
    Automatic,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Invalid => write!(f, "invalid"),
            Mode::Manual => write!(f, "manual"),
            Mode::Automatic => write!(f, "automatic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown mode '{0}', expected 'manual' or 'auto'")]
pub struct ParseModeError(String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" | "m" => Ok(Mode::Manual),
            "auto" | "automatic" | "a" => Ok(Mode::Automatic),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Temperature in tenths of a degree Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Temperature(i16);

impl Temperature {
    /// Lowest temperature accepted by the setters (7.5°C).
    pub const MIN: Temperature = Temperature(75);
    /// Highest temperature accepted by the setters (28.0°C).
    pub const MAX: Temperature = Temperature(280);

    pub const fn from_decidegrees(value: i16) -> Self {
        Self(value)
    }

    pub const fn as_decidegrees(&self) -> i16 {
        self.0
    }

    pub fn as_degree_celsius(&self) -> f32 {
        self.0 as f32 / 10.0
    }

    /// Whether the value lies in the range both setters accept.
    pub fn is_settable(&self) -> bool {
        (Self::MIN..=Self::MAX).contains(self)
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{}°C", abs / 10, abs % 10)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseTemperatureError {
    #[error("Invalid temperature value format: {0}")]
    Format(#[from] std::num::ParseFloatError),
    #[error("Temperature {0}°C cannot be represented")]
    Range(f32),
}

impl TryFrom<f32> for Temperature {
    type Error = ParseTemperatureError;

    fn try_from(degree_celsius: f32) -> Result<Self, Self::Error> {
        let decidegrees = (degree_celsius * 10.0).round();
        if decidegrees.is_finite() && (i16::MIN as f32..=i16::MAX as f32).contains(&decidegrees)
        {
            Ok(Self(decidegrees as i16))
        } else {
            Err(ParseTemperatureError::Range(degree_celsius))
        }
    }
}

impl FromStr for Temperature {
    type Err = ParseTemperatureError;

    /// Parses degrees Celsius, e.g. `"21.5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.trim().trim_end_matches("°C").parse::<f32>()?)
    }
}

/// Battery voltage in millivolts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatteryVoltage(pub u16);

impl BatteryVoltage {
    pub fn as_millivolts(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for BatteryVoltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mV", self.0)
    }
}

/// Valve opening in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValvePosition(pub u8);

impl ValvePosition {
    pub fn as_percent(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for ValvePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// The two firmware/hardware combinations speaking different UART protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ProtocolVariant {
    /// Hardware revision 1, memory mapped hex registers.
    Register,
    /// OpenHR20 firmware, human readable status line.
    StatusLine,
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVariant::Register => write!(f, "register"),
            ProtocolVariant::StatusLine => write!(f, "status-line"),
        }
    }
}

/// Snapshot of everything readable from a thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermostatStatus {
    pub desired_temperature: Temperature,
    pub mode: Mode,
    /// Only reported by the status-line variant.
    pub current_temperature: Option<Temperature>,
    /// Only reported by the status-line variant.
    pub battery_voltage: Option<BatteryVoltage>,
    /// Only reported by the status-line variant.
    pub valve_position: Option<ValvePosition>,
}

impl fmt::Display for ThermostatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "desired: {}, mode: {}",
            self.desired_temperature, self.mode
        )?;
        if let Some(current) = self.current_temperature {
            write!(f, ", current: {current}")?;
        }
        if let Some(battery) = self.battery_voltage {
            write!(f, ", battery: {battery}")?;
        }
        if let Some(valve) = self.valve_position {
            write!(f, ", valve: {valve}")?;
        }
        Ok(())
    }
}

/// Parses the leading base-10 digits of an ASCII field.
///
/// Leading blanks are skipped and parsing stops at the first non-digit, so
/// `b"45 "` yields `45`. Returns `None` if no digit is present.
pub fn decode_decimal(field: &[u8]) -> Option<u32> {
    let digits = field
        .iter()
        .skip_while(|b| **b == b' ')
        .take_while(|b| b.is_ascii_digit());
    let mut value: Option<u32> = None;
    for digit in digits {
        value = Some(
            value
                .unwrap_or(0)
                .checked_mul(10)?
                .checked_add(u32::from(digit - b'0'))?,
        );
    }
    value
}

/// Parses an ASCII field consisting of base-16 digits only, e.g. `b"00B4"`.
///
/// Returns `None` for an empty field, any other byte in it, or a value above
/// `u16::MAX`.
pub fn decode_hex(field: &[u8]) -> Option<u16> {
    if field.is_empty() {
        return None;
    }
    field.iter().try_fold(0u16, |value, byte| {
        let nibble = (*byte as char).to_digit(16)? as u16;
        Some(value.checked_mul(16)? | nibble)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn temperature_display() {
        assert_eq!(Temperature::from_decidegrees(225).to_string(), "22.5°C");
        assert_eq!(Temperature::from_decidegrees(80).to_string(), "8.0°C");
        assert_eq!(Temperature::from_decidegrees(-5).to_string(), "-0.5°C");
        assert_eq!(Temperature::from_decidegrees(-112).to_string(), "-11.2°C");
    }

    #[test]
    fn temperature_parse() {
        assert_eq!(
            "21.5".parse::<Temperature>(),
            Ok(Temperature::from_decidegrees(215))
        );
        assert_eq!(
            "7.5°C".parse::<Temperature>(),
            Ok(Temperature::from_decidegrees(75))
        );
        assert_eq!(
            "22.04".parse::<Temperature>(),
            Ok(Temperature::from_decidegrees(220))
        );
        assert_matches!(
            "warm".parse::<Temperature>(),
            Err(ParseTemperatureError::Format(..))
        );
        assert_matches!(
            Temperature::try_from(1e9_f32),
            Err(ParseTemperatureError::Range(..))
        );
    }

    #[test]
    fn temperature_settable_range() {
        assert!(!Temperature::from_decidegrees(74).is_settable());
        assert!(Temperature::from_decidegrees(75).is_settable());
        assert!(Temperature::from_decidegrees(280).is_settable());
        assert!(!Temperature::from_decidegrees(281).is_settable());
    }

    #[test]
    fn mode_parse() {
        assert_eq!("auto".parse::<Mode>(), Ok(Mode::Automatic));
        assert_eq!("Automatic".parse::<Mode>(), Ok(Mode::Automatic));
        assert_eq!("manual".parse::<Mode>(), Ok(Mode::Manual));
        assert!("invalid".parse::<Mode>().is_err());
    }

    #[test]
    fn decimal_fields() {
        assert_eq!(decode_decimal(b"225"), Some(225));
        assert_eq!(decode_decimal(b"45"), Some(45));
        assert_eq!(decode_decimal(b"5 "), Some(5));
        assert_eq!(decode_decimal(b" 7"), Some(7));
        assert_eq!(decode_decimal(b"3200"), Some(3200));
        assert_eq!(decode_decimal(b"x12"), None);
        assert_eq!(decode_decimal(b""), None);
    }

    #[test]
    fn hex_fields() {
        assert_eq!(decode_hex(b"00B4"), Some(0xB4));
        assert_eq!(decode_hex(b"00b4"), Some(0xB4));
        assert_eq!(decode_hex(b"10DC"), Some(0x10DC));
        assert_eq!(decode_hex(b"0F\r\n"), None);
        assert_eq!(decode_hex(b"00B?"), None);
        assert_eq!(decode_hex(b"\r\n"), None);
        assert_eq!(decode_hex(b""), None);
        assert_eq!(decode_hex(b"10000"), None);
    }

    #[test]
    fn status_display() {
        let status = ThermostatStatus {
            desired_temperature: Temperature::from_decidegrees(225),
            mode: Mode::Automatic,
            current_temperature: Some(Temperature::from_decidegrees(210)),
            battery_voltage: Some(BatteryVoltage(3200)),
            valve_position: Some(ValvePosition(45)),
        };
        assert_eq!(
            status.to_string(),
            "desired: 22.5°C, mode: automatic, current: 21.0°C, battery: 3200 mV, valve: 45%"
        );
    }
}
