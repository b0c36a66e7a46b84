//! A library for controlling the Honeywell HR20 radiator thermostat over its UART.
//!
//! Two firmware/hardware combinations are supported, each with its own driver:
//!
//! 1.  **Register protocol** (hardware revision 1): the thermostat memory is
//!     read and written with hex commands that the device echoes back. See
//!     [`register::RegisterDriver`].
//!
//! 2.  **Status-line protocol** (OpenHR20 firmware): a status request is
//!     answered with one line of labelled fields. See
//!     [`status_line::StatusLineDriver`].
//!
//! Both implement [`ThermostatControl`]. [`Thermostat`] wraps either of them
//! when the variant is only known at runtime, e.g. from a configuration file.
//!
//! ## Features
//!
//! - **Shared scanner**: bounded polling for markers in the inbound stream with
//!   a timeout/mismatch classification of failures, see [`scanner`].
//! - **Pluggable transport**: drivers work on anything implementing
//!   [`transport::Transport`]; a serial port implementation is available with
//!   the `serial` feature.
//! - **Strongly-Typed API**: temperatures, battery voltage and valve position
//!   are newtypes with their units attached.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hr20_lib::{
//!     protocol::{Mode, ProtocolVariant, Temperature},
//!     serial::{serial_port_builder, SerialTransport},
//!     Thermostat, ThermostatControl,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let variant = ProtocolVariant::StatusLine;
//!     let transport = SerialTransport::open(serial_port_builder("/dev/ttyUSB0", variant, None))?;
//!     let mut thermostat = Thermostat::new(variant, transport);
//!
//!     thermostat.set_mode(Mode::Manual)?;
//!     thermostat.set_desired_temperature(Temperature::from_decidegrees(215))?;
//!     println!("{}", thermostat.read_status()?);
//!
//!     Ok(())
//! }
//! ```

mod error;
pub mod protocol;
pub mod register;
pub mod scanner;
pub mod status_line;
mod thermostat;
pub mod transport;

#[cfg_attr(docsrs, doc(cfg(feature = "serial")))]
#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Error, ErrorKind, Result};
pub use thermostat::{Thermostat, ThermostatControl};
