//! Serial port transport based on `tokio-serial`'s blocking port builder.
//!
//! The two protocol variants use different line settings: the hardware
//! revision 1 talks 2400 baud 8E1, the OpenHR20 firmware 9600 baud 8N1.
use crate::{protocol::ProtocolVariant, transport::Transport};
use std::{
    io::{self, Read, Write},
    time::Duration,
};

/// The number of data bits used for serial communication.
pub const DATA_BITS: &tokio_serial::DataBits = &tokio_serial::DataBits::Eight;
/// The number of stop bits used for serial communication.
pub const STOP_BITS: &tokio_serial::StopBits = &tokio_serial::StopBits::One;
/// Timeout of a single blocking read or write on the port.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/// Default baud rate of a protocol variant.
pub fn default_baud_rate(variant: ProtocolVariant) -> u32 {
    match variant {
        ProtocolVariant::Register => 2400,
        ProtocolVariant::StatusLine => 9600,
    }
}

pub fn parity(variant: ProtocolVariant) -> tokio_serial::Parity {
    match variant {
        ProtocolVariant::Register => tokio_serial::Parity::Even,
        ProtocolVariant::StatusLine => tokio_serial::Parity::None,
    }
}

/// Creates a `tokio_serial::SerialPortBuilder` with the line settings of `variant`.
///
/// # Arguments
///
/// * `device` - The path to the serial port device (e.g., `/dev/ttyUSB0`).
/// * `variant` - The protocol spoken by the thermostat.
/// * `baud_rate` - Overrides the default baud rate of the variant.
pub fn serial_port_builder(
    device: &str,
    variant: ProtocolVariant,
    baud_rate: Option<u32>,
) -> tokio_serial::SerialPortBuilder {
    tokio_serial::new(device, baud_rate.unwrap_or_else(|| default_baud_rate(variant)))
        .parity(parity(variant))
        .stop_bits(*STOP_BITS)
        .data_bits(*DATA_BITS)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(DEFAULT_TIMEOUT)
}

/// [`Transport`] over an opened serial port.
pub struct SerialTransport {
    port: Box<dyn tokio_serial::SerialPort>,
}

impl SerialTransport {
    pub fn open(builder: tokio_serial::SerialPortBuilder) -> io::Result<Self> {
        let port = builder.open()?;
        log::debug!("Opened serial port {:?}", port.name());
        Ok(Self { port })
    }

    pub fn from_port(port: Box<dyn tokio_serial::SerialPort>) -> Self {
        Self { port }
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.port.name())
            .finish()
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.port)
    }

    fn available(&mut self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.available()? == 0 {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        match Read::read(&mut self.port, &mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(error) if error.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_settings() {
        assert_eq!(default_baud_rate(ProtocolVariant::Register), 2400);
        assert_eq!(default_baud_rate(ProtocolVariant::StatusLine), 9600);
        assert_eq!(
            parity(ProtocolVariant::Register),
            tokio_serial::Parity::Even
        );
        assert_eq!(
            parity(ProtocolVariant::StatusLine),
            tokio_serial::Parity::None
        );
    }
}
