//! HR20 thermostat CLI
//!
//! A command-line interface (CLI) application for controlling Honeywell HR20
//! radiator thermostats attached to a serial port.
//!
//! This tool allows users to:
//! - Read and set the desired temperature and the operating mode.
//! - Read the measured temperature, battery voltage and valve position of
//!   thermostats running the OpenHR20 firmware.
//! - Read and write raw registers of hardware revision 1 thermostats.
//! - Run in a continuous daemon mode printing the thermostat status.
//!
//! The CLI leverages the `hr20_lib` crate for the protocol drivers.

use anyhow::{bail, Context, Result};
use clap::Parser;
use dialoguer::Confirm;
use flexi_logger::{Logger, LoggerHandle};
use hr20_lib::{
    protocol::ProtocolVariant,
    register::{RegisterTiming, RegisterDriver},
    serial::{serial_port_builder, SerialTransport},
    status_line::StatusLineTiming,
    Thermostat, ThermostatControl,
};
use log::*;
use std::{panic, time::Duration};

mod commandline;
mod config;

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line()))
            .unwrap_or(("<unknown_file>", 0));

        let cause = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(
            target: "panic",
            "Thread '{}' panicked at {}:{}: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            cause
        );
    }));
    log_handle
}

macro_rules! print_value {
    ($label:expr, $read:expr) => {
        let value = $read.with_context(|| format!("Cannot read {}", $label))?;
        println!("{}: {}", $label, value);
    };
}

struct ConnectionSettings {
    variant: ProtocolVariant,
    device: String,
    baud_rate: Option<u32>,
    register: RegisterTiming,
    status_line: StatusLineTiming,
}

fn connection_settings(connection: &commandline::CliConnection) -> Result<ConnectionSettings> {
    let settings = match connection {
        commandline::CliConnection::Register {
            device, baud_rate, ..
        } => ConnectionSettings {
            variant: ProtocolVariant::Register,
            device: device.clone(),
            baud_rate: *baud_rate,
            register: RegisterTiming::default(),
            status_line: StatusLineTiming::default(),
        },
        commandline::CliConnection::StatusLine {
            device, baud_rate, ..
        } => ConnectionSettings {
            variant: ProtocolVariant::StatusLine,
            device: device.clone(),
            baud_rate: *baud_rate,
            register: RegisterTiming::default(),
            status_line: StatusLineTiming::default(),
        },
        commandline::CliConnection::Config { file, .. } => {
            let config = config::Config::load(file)?;
            ConnectionSettings {
                variant: config.variant,
                device: config.device,
                baud_rate: config.baud_rate,
                register: config.register,
                status_line: config.status_line,
            }
        }
    };
    Ok(settings)
}

/// Opens the serial port and creates the driver for the configured protocol variant.
fn create_thermostat(
    connection: &commandline::CliConnection,
    timeout: Duration,
) -> Result<Thermostat<SerialTransport>> {
    let settings = connection_settings(connection)?;
    info!(
        "Opening {} with the {} protocol (baud rate: {})...",
        settings.device,
        settings.variant,
        settings
            .baud_rate
            .map_or_else(|| "default".to_string(), |rate| rate.to_string())
    );
    let builder = serial_port_builder(&settings.device, settings.variant, settings.baud_rate)
        .timeout(timeout);
    let transport = SerialTransport::open(builder)
        .with_context(|| format!("Cannot open serial port {}", settings.device))?;
    Ok(Thermostat::with_timing(
        settings.variant,
        transport,
        settings.register,
        settings.status_line,
    ))
}

fn register_driver(
    thermostat: &mut Thermostat<SerialTransport>,
) -> Result<&mut RegisterDriver<SerialTransport>> {
    match thermostat {
        Thermostat::Register(driver) => Ok(driver),
        Thermostat::StatusLine(_) => {
            bail!("Raw register access is only available with the register protocol")
        }
    }
}

/// Prompts the user before poking arbitrary thermostat memory.
fn confirm_register_write(address: u16, value: u16) -> Result<bool> {
    println!(
        "WARNING: Writing {value:#06X} to register {address:#05X} changes the thermostat memory directly."
    );
    println!("A wrong address or value can leave the thermostat in an undefined state.");
    Confirm::new()
        .with_prompt("Do you want to continue?")
        .default(false)
        .show_default(true)
        .interact()
        .context("Failed to get user confirmation.")
}

fn run_daemon(thermostat: &mut Thermostat<SerialTransport>, poll_interval: Duration) -> ! {
    info!("Starting daemon mode: interval={poll_interval:?}");
    loop {
        debug!("Daemon: Reading status...");
        match thermostat.read_status() {
            Ok(status) => println!("{status}"),
            Err(error) => warn!("Cannot read status: {error} ({:?})", error.kind()),
        }
        std::thread::sleep(poll_interval);
    }
}

fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());
    info!(
        "HR20 CLI started. Log level: {}",
        args.verbose.log_level_filter()
    );

    let mut thermostat = create_thermostat(&args.connection, args.timeout)?;

    match args.connection.command() {
        commandline::CliCommands::Daemon { poll_interval } => {
            run_daemon(&mut thermostat, *poll_interval);
        }
        commandline::CliCommands::Status => {
            info!("Executing: Read Status");
            print_value!("Status", thermostat.read_status());
        }
        commandline::CliCommands::GetTemperature => {
            info!("Executing: Read Desired Temperature");
            print_value!("Desired temperature", thermostat.read_desired_temperature());
        }
        commandline::CliCommands::SetTemperature { temperature } => {
            info!("Executing: Set Desired Temperature to {temperature}");
            thermostat
                .set_desired_temperature(*temperature)
                .with_context(|| format!("Failed to set desired temperature to {temperature}"))?;
            println!("Desired temperature set to {temperature}.");
        }
        commandline::CliCommands::GetMode => {
            info!("Executing: Read Mode");
            print_value!("Mode", thermostat.read_mode());
        }
        commandline::CliCommands::SetMode { mode } => {
            info!("Executing: Set Mode to {mode}");
            thermostat
                .set_mode(*mode)
                .with_context(|| format!("Failed to set mode to {mode}"))?;
            println!("Mode set to {mode}.");
        }
        commandline::CliCommands::CurrentTemperature => {
            info!("Executing: Read Current Temperature");
            print_value!("Current temperature", thermostat.read_current_temperature());
        }
        commandline::CliCommands::Battery => {
            info!("Executing: Read Battery Voltage");
            print_value!("Battery voltage", thermostat.read_battery_voltage());
        }
        commandline::CliCommands::Valve => {
            info!("Executing: Read Valve Position");
            print_value!("Valve position", thermostat.read_valve_position());
        }
        commandline::CliCommands::ReadRegister { address } => {
            info!("Executing: Read Register {address:#05X}");
            let value = register_driver(&mut thermostat)?
                .read_register(*address)
                .with_context(|| format!("Cannot read register {address:#05X}"))?;
            println!("Register {address:#05X}: {value:#06X}");
        }
        commandline::CliCommands::WriteRegister {
            address,
            value,
            yes,
        } => {
            info!("Executing: Write {value:#06X} to Register {address:#05X}");
            let driver = register_driver(&mut thermostat)?;
            if !*yes && !confirm_register_write(*address, *value)? {
                info!("Register write aborted by user.");
                return Ok(());
            }
            driver
                .write_register(*address, *value)
                .with_context(|| format!("Failed to write register {address:#05X}"))?;
            println!("Register {address:#05X} set to {value:#06X}.");
        }
    }

    Ok(())
}
