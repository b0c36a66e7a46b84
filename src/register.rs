//! Driver for the HR20 hardware revision 1, which exposes its memory over UART.
//!
//! Every request is an ASCII command terminated by `\r\n`:
//!
//! * `W<addr:3 hex><value:4 hex>` writes a 16-bit value, e.g. `W12B0010`.
//! * `R<addr:3 hex>` reads a 16-bit value, e.g. `R136`.
//!
//! The thermostat acknowledges by echoing the command with the leading
//! character replaced by `M`. A read echo is directly followed by the four hex
//! digits of the value. Before each request the thermostat is woken up with
//! no-op `K` commands until it answers.
//!
//! ## Example
//!
//! ```no_run
//! use hr20_lib::{protocol::Temperature, register::RegisterDriver, ThermostatControl};
//! # fn example(transport: impl hr20_lib::transport::Transport) -> hr20_lib::Result<()> {
//! let mut thermostat = RegisterDriver::new(transport);
//! thermostat.set_desired_temperature(Temperature::from_decidegrees(215))?;
//! println!("Desired: {}", thermostat.read_desired_temperature()?);
//! # Ok(())
//! # }
//! ```
use crate::{
    protocol::{decode_hex, Mode, Temperature},
    scanner::{scan_for_marker, Field, ScanPolicy},
    transport::Transport,
    Error, Result, ThermostatControl,
};
use log::*;
use std::{fmt, time::Duration};

/// Target temperature shown on the display.
pub const DISPLAY_TEMPERATURE_ADDR: u16 = 0x136;
/// Target temperature used by the motor control.
pub const MOTOR_TEMPERATURE_ADDR: u16 = 0x20C;
/// Upper byte written together with the motor target temperature.
pub const MOTOR_TEMPERATURE_FLAGS: u16 = 0x1000;
pub const MODE_ADDR: u16 = 0x12B;
pub const MODE_MANUAL_VALUE: u16 = 0x0000;
pub const MODE_AUTOMATIC_VALUE: u16 = 0x0010;
/// Position of the automatic flag within the four payload digits of [`MODE_ADDR`].
pub const MODE_FLAG_INDEX: usize = 2;
/// The thermostat stores temperatures relative to 6.0°C.
pub const TEMPERATURE_OFFSET: i16 = 60;
pub const ADDRESS_MAX: u16 = 0xFFF;
pub const PAYLOAD_LEN: usize = 4;

const WAKE_COMMAND: &[u8] = b"K\r\n";
const LINE_END: &[u8] = b"\r\n";
const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Waiting and retry parameters of the register protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegisterTiming {
    /// No-op commands sent at most while waiting for the thermostat to answer.
    pub wake_attempts: u32,
    #[cfg_attr(feature = "serde", serde(with = "humantime_serde"))]
    pub wake_interval: Duration,
    /// Polling of the echo (and the payload of reads) after each send.
    pub ack: ScanPolicy,
    /// How often a command is sent before giving up.
    pub send_retries: u32,
}

impl Default for RegisterTiming {
    fn default() -> Self {
        Self {
            wake_attempts: 20,
            wake_interval: Duration::from_millis(50),
            ack: ScanPolicy::new(100, Duration::from_millis(10)),
            send_retries: 3,
        }
    }
}

/// Encodes a settable temperature into the byte stored by the thermostat.
pub fn encode_temperature(temperature: Temperature) -> Result<u8> {
    if !temperature.is_settable() {
        return Err(Error::TemperatureOutOfRange(temperature));
    }
    // 7.5..=28.0°C is 15..=220 after removing the offset.
    Ok((temperature.as_decidegrees() - TEMPERATURE_OFFSET) as u8)
}

/// Decodes a stored temperature, `None` if `value` cannot be a temperature.
pub fn decode_temperature(value: u16) -> Option<Temperature> {
    let raw = i16::try_from(value).ok()?;
    Some(Temperature::from_decidegrees(
        raw.checked_add(TEMPERATURE_OFFSET)?,
    ))
}

pub fn decode_mode(payload: &[u8]) -> Mode {
    match payload.get(MODE_FLAG_INDEX) {
        Some(b'1') => Mode::Automatic,
        Some(b'0') => Mode::Manual,
        _ => Mode::Invalid,
    }
}

/// ASCII bytes of a command or an expected echo.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandBytes {
    bytes: [u8; 8],
    len: usize,
}

impl CommandBytes {
    fn push(&mut self, byte: u8) {
        self.bytes[self.len] = byte;
        self.len += 1;
    }

    fn push_hex(&mut self, value: u16, digits: u32) {
        for shift in (0..digits).rev() {
            self.push(HEX_DIGITS[usize::from((value >> (shift * 4)) as u8 & 0x0F)]);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl fmt::Display for CommandBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for CommandBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterCommand {
    Write { address: u16, value: u16 },
    Read { address: u16 },
}

impl RegisterCommand {
    pub fn write(address: u16, value: u16) -> Result<Self> {
        Self::check_address(address)?;
        Ok(Self::Write { address, value })
    }

    pub fn read(address: u16) -> Result<Self> {
        Self::check_address(address)?;
        Ok(Self::Read { address })
    }

    fn check_address(address: u16) -> Result<()> {
        if address > ADDRESS_MAX {
            Err(Error::AddressOutOfRange(address))
        } else {
            Ok(())
        }
    }

    pub fn encode(&self) -> CommandBytes {
        let mut command = CommandBytes {
            bytes: [0; 8],
            len: 0,
        };
        match *self {
            RegisterCommand::Write { address, value } => {
                command.push(b'W');
                command.push_hex(address, 3);
                command.push_hex(value, 4);
            }
            RegisterCommand::Read { address } => {
                command.push(b'R');
                command.push_hex(address, 3);
            }
        }
        command
    }

    /// The acknowledgement the thermostat sends for this command.
    pub fn expected_echo(&self) -> CommandBytes {
        let mut echo = self.encode();
        echo.bytes[0] = b'M';
        // The motor register echoes 0x100F ("off") as 0x1000.
        if echo.as_bytes() == b"M20C100F" {
            echo.bytes[7] = b'0';
        }
        echo
    }
}

impl fmt::Display for RegisterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Driver for the register (hardware revision 1) protocol.
#[derive(Debug)]
pub struct RegisterDriver<T> {
    transport: T,
    timing: RegisterTiming,
}

impl<T: Transport> RegisterDriver<T> {
    pub fn new(transport: T) -> Self {
        Self::with_timing(transport, RegisterTiming::default())
    }

    pub fn with_timing(transport: T, timing: RegisterTiming) -> Self {
        Self { transport, timing }
    }

    pub fn timing(&self) -> &RegisterTiming {
        &self.timing
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Sends no-op commands until the thermostat answers, then drops the answers.
    fn wake(&mut self) -> Result<()> {
        for attempt in 0..self.timing.wake_attempts {
            self.transport.write_all(WAKE_COMMAND)?;
            self.transport.flush()?;
            self.transport.delay(self.timing.wake_interval);
            if self.transport.available()? > 0 {
                trace!("Thermostat awake after {} wake commands", attempt + 1);
                break;
            }
        }
        let dropped = self.transport.drain()?;
        trace!("Dropped {dropped} bytes of wake responses");
        Ok(())
    }

    /// Sends `command` until its echo is seen, leaving the stream right after the echo.
    fn transact(&mut self, command: &RegisterCommand) -> Result<()> {
        let encoded = command.encode();
        let echo = command.expected_echo();
        self.wake()?;

        let mut result = Err(Error::ResponseTimeout);
        for attempt in 1..=self.timing.send_retries {
            debug!("Sending {encoded} (attempt {attempt}), expecting {echo}");
            self.transport.write_all(encoded.as_bytes())?;
            self.transport.write_all(LINE_END)?;
            self.transport.flush()?;

            result = scan_for_marker(&mut self.transport, echo.as_bytes(), &self.timing.ack);
            if result.is_ok() {
                break;
            }
        }
        if let Err(error) = &result {
            warn!(
                "No acknowledgement for {encoded} after {} attempts: {error}",
                self.timing.send_retries
            );
        }
        result
    }

    /// Writes a 16-bit value to the thermostat memory.
    ///
    /// A lost acknowledgement makes the command to be sent again, so a write
    /// the thermostat already applied can be applied a second time.
    pub fn write_register(&mut self, address: u16, value: u16) -> Result<()> {
        self.transact(&RegisterCommand::write(address, value)?)
    }

    fn read_payload(&mut self, address: u16) -> Result<Field<PAYLOAD_LEN>> {
        self.transact(&RegisterCommand::read(address)?)?;
        let payload = Field::read(&mut self.transport, 0, PAYLOAD_LEN, &self.timing.ack)?;
        debug!(
            "Register {address:#05X} holds {:?}",
            String::from_utf8_lossy(payload.as_bytes())
        );
        if !payload.as_bytes().iter().all(u8::is_ascii_hexdigit) {
            warn!("Register {address:#05X} answered with a non-hex payload");
            return Err(Error::ResponseMismatch);
        }
        Ok(payload)
    }

    /// Reads a 16-bit value from the thermostat memory.
    pub fn read_register(&mut self, address: u16) -> Result<u16> {
        let payload = self.read_payload(address)?;
        decode_hex(payload.as_bytes()).ok_or(Error::ResponseMismatch)
    }
}

impl<T: Transport> ThermostatControl for RegisterDriver<T> {
    /// Writes the display and the motor target. Both must be acknowledged; a
    /// failure of either is reported without undoing the other write.
    fn set_desired_temperature(&mut self, temperature: Temperature) -> Result<()> {
        let value = u16::from(encode_temperature(temperature)?);
        let display = self.write_register(DISPLAY_TEMPERATURE_ADDR, value);
        let motor = self.write_register(MOTOR_TEMPERATURE_ADDR, MOTOR_TEMPERATURE_FLAGS | value);
        display.and(motor)
    }

    fn read_desired_temperature(&mut self) -> Result<Temperature> {
        decode_temperature(self.read_register(DISPLAY_TEMPERATURE_ADDR)?)
            .ok_or(Error::ResponseMismatch)
    }

    fn set_mode(&mut self, mode: Mode) -> Result<()> {
        let value = match mode {
            Mode::Manual => MODE_MANUAL_VALUE,
            Mode::Automatic => MODE_AUTOMATIC_VALUE,
            Mode::Invalid => return Err(Error::InvalidMode(mode)),
        };
        self.write_register(MODE_ADDR, value)
    }

    fn read_mode(&mut self) -> Result<Mode> {
        let payload = self.read_payload(MODE_ADDR)?;
        Ok(decode_mode(payload.as_bytes()))
    }
}
