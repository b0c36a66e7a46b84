use crate::config::Config;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use hr20_lib::{protocol as proto, register};
use std::time::Duration;

fn default_device_name() -> String {
    if cfg!(target_os = "windows") {
        String::from("COM1") // Common default for Windows, though may vary.
    } else {
        String::from("/dev/ttyUSB0") // Common default for USB-to-serial adapters on Linux.
    }
}

fn parse_temperature(s: &str) -> Result<proto::Temperature, String> {
    let temperature = s.parse::<proto::Temperature>().map_err(|e| e.to_string())?;
    if temperature.is_settable() {
        Ok(temperature)
    } else {
        Err(format!(
            "Temperature {temperature} is outside {}..={}",
            proto::Temperature::MIN,
            proto::Temperature::MAX
        ))
    }
}

fn parse_mode(s: &str) -> Result<proto::Mode, String> {
    s.parse::<proto::Mode>().map_err(|e| e.to_string())
}

fn parse_register_address(s: &str) -> Result<u16, String> {
    let address =
        clap_num::maybe_hex::<u16>(s).map_err(|e| format!("Invalid address format: {e}"))?;
    if address > register::ADDRESS_MAX {
        return Err(format!(
            "Address {address:#X} is above {:#X}",
            register::ADDRESS_MAX
        ));
    }
    Ok(address)
}

fn parse_register_value(s: &str) -> Result<u16, String> {
    clap_num::maybe_hex::<u16>(s).map_err(|e| format!("Invalid register value format: {e}"))
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliConnection {
    /// Connect to a hardware revision 1 thermostat (register protocol, 2400 baud 8E1).
    Register {
        /// Serial port device name.
        /// Examples: "/dev/ttyUSB0" (Linux), "COM3" (Windows).
        #[arg(short, long, default_value_t = default_device_name(), verbatim_doc_comment)]
        device: String,

        /// Overrides the baud rate of 2400.
        #[arg(long)]
        baud_rate: Option<u32>,

        /// Command to execute.
        #[command(subcommand)]
        command: CliCommands,
    },
    /// Connect to a thermostat running the OpenHR20 firmware (status-line protocol, 9600 baud 8N1).
    StatusLine {
        /// Serial port device name.
        /// Examples: "/dev/ttyUSB0" (Linux), "COM3" (Windows).
        #[arg(short, long, default_value_t = default_device_name(), verbatim_doc_comment)]
        device: String,

        /// Overrides the baud rate of 9600.
        #[arg(long)]
        baud_rate: Option<u32>,

        /// Command to execute.
        #[command(subcommand)]
        command: CliCommands,
    },
    /// Take protocol variant, device and timing from a YAML configuration file.
    Config {
        /// The configuration file.
        #[arg(short, long, default_value_t = Config::DEFAULT_CONFIG_FILE.to_string())]
        file: String,

        /// Command to execute.
        #[command(subcommand)]
        command: CliCommands,
    },
}

impl CliConnection {
    pub fn command(&self) -> &CliCommands {
        match self {
            CliConnection::Register { command, .. }
            | CliConnection::StatusLine { command, .. }
            | CliConnection::Config { command, .. } => command,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Run in daemon mode: continuously poll the thermostat status and print it.
    /// Failed polls are logged and polling continues.
    #[clap(verbatim_doc_comment)]
    Daemon {
        /// Interval for polling the status (e.g., "30s", "5m")
        #[arg(value_parser = humantime::parse_duration, short, long, default_value = "1min")]
        poll_interval: Duration,
    },

    /// Read and display every value the thermostat provides.
    Status,

    /// Read the desired temperature.
    GetTemperature,

    /// Set the desired temperature in degrees Celsius (7.5 to 28.0).
    /// The OpenHR20 firmware rounds down to 0.5°C steps.
    #[clap(verbatim_doc_comment)]
    SetTemperature {
        /// Desired temperature, e.g. "21.5".
        #[arg(value_parser = parse_temperature)]
        temperature: proto::Temperature,
    },

    /// Read the operating mode.
    GetMode,

    /// Set the operating mode.
    SetMode {
        /// "manual" or "auto".
        #[arg(value_parser = parse_mode)]
        mode: proto::Mode,
    },

    /// Read the measured temperature (status-line protocol only).
    CurrentTemperature,

    /// Read the battery voltage (status-line protocol only).
    Battery,

    /// Read the valve position (status-line protocol only).
    Valve,

    /// Read a raw 16-bit register (register protocol only).
    ReadRegister {
        /// Register address, e.g. "0x136".
        #[arg(value_parser = parse_register_address)]
        address: u16,
    },

    /// Write a raw 16-bit register (register protocol only).
    /// **Warning:** Writing arbitrary memory can leave the thermostat in an undefined state.
    #[clap(verbatim_doc_comment)]
    WriteRegister {
        /// Register address, e.g. "0x12B".
        #[arg(value_parser = parse_register_address)]
        address: u16,
        /// Value, decimal or hexadecimal (e.g. "0x0010").
        #[arg(value_parser = parse_register_value)]
        value: u16,
        /// Do not ask for confirmation.
        #[arg(long)]
        yes: bool,
    },
}

const fn about_text() -> &'static str {
    "HR20 thermostat CLI - Control Honeywell HR20 radiator thermostats over their UART."
}

#[derive(Parser, Debug)]
#[command(name="hr20ctl", author, version, about=about_text(), long_about = None, propagate_version = true)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -v for info, -vv for debug, -vvv for trace. Default is warn.
    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    /// Specifies the protocol variant and the command.
    #[command(subcommand)]
    pub connection: CliConnection,

    /// Serial I/O timeout for a single read or write.
    /// Examples: "1s", "500ms".
    #[arg(global = true, long, default_value = "200ms", value_parser = humantime::parse_duration, verbatim_doc_comment)]
    pub timeout: Duration,
}
