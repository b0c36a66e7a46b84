//! YAML configuration of the `config` connection.
//!
//! ```yaml
//! variant: register          # or status-line
//! device: /dev/ttyUSB0
//! baud_rate: 2400            # optional, defaults to the variant's rate
//! register:                  # optional timing overrides
//!   wake_attempts: 20
//!   wake_interval: 50ms
//!   ack:
//!     attempts: 100
//!     interval: 10ms
//!   send_retries: 3
//! status_line:
//!   settle_delay: 100ms
//!   scan:
//!     attempts: 10
//!     interval: 10ms
//! ```
use anyhow::{ensure, Context, Result};
use hr20_lib::{protocol::ProtocolVariant, register::RegisterTiming, status_line::StatusLineTiming};
use serde::Deserialize;
use std::{fs::File, path::Path};

fn default_device() -> String {
    String::from("/dev/ttyUSB0")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    pub variant: ProtocolVariant,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub baud_rate: Option<u32>,
    #[serde(default)]
    pub register: RegisterTiming,
    #[serde(default)]
    pub status_line: StatusLineTiming,
}

impl Config {
    pub const DEFAULT_CONFIG_FILE: &'static str = "hr20ctl.yml";

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading config file from {path:?}");
        let file = File::open(path)
            .with_context(|| format!("Cannot open config file {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("Cannot parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Rejects timing that would never send a command or never look for an answer.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.register.send_retries > 0,
            "register.send_retries must be at least 1"
        );
        ensure!(
            self.register.ack.attempts > 0,
            "register.ack.attempts must be at least 1"
        );
        ensure!(
            self.status_line.scan.attempts > 0,
            "status_line.scan.attempts must be at least 1"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hr20_lib::scanner::ScanPolicy;
    use std::time::Duration;

    #[test]
    fn minimal_config() {
        let config: Config = serde_yaml::from_str("variant: status-line").unwrap();
        assert_eq!(config.variant, ProtocolVariant::StatusLine);
        assert_eq!(config.device, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, None);
        assert_eq!(config.register, RegisterTiming::default());
        assert_eq!(config.status_line, StatusLineTiming::default());
    }

    #[test]
    fn timing_overrides() {
        let yaml = r#"
variant: register
device: /dev/ttyAMA0
baud_rate: 4800
register:
  wake_interval: 80ms
  ack:
    attempts: 50
    interval: 20ms
status_line:
  settle_delay: 250ms
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.variant, ProtocolVariant::Register);
        assert_eq!(config.device, "/dev/ttyAMA0");
        assert_eq!(config.baud_rate, Some(4800));
        assert_eq!(
            config.register,
            RegisterTiming {
                wake_interval: Duration::from_millis(80),
                ack: ScanPolicy::new(50, Duration::from_millis(20)),
                ..RegisterTiming::default()
            }
        );
        assert_eq!(config.status_line.settle_delay, Duration::from_millis(250));
        assert_eq!(
            config.status_line.scan,
            StatusLineTiming::default().scan
        );
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let config: Config = serde_yaml::from_str("variant: register").unwrap();
        assert!(config.validate().is_ok());

        for yaml in [
            "variant: register\nregister:\n  send_retries: 0",
            "variant: register\nregister:\n  ack:\n    attempts: 0\n    interval: 10ms",
            "variant: status-line\nstatus_line:\n  scan:\n    attempts: 0\n    interval: 10ms",
        ] {
            let config: Config = serde_yaml::from_str(yaml).unwrap();
            assert!(config.validate().is_err(), "{yaml}");
        }
    }

    #[test]
    fn load_validates() {
        let path = std::env::temp_dir().join(format!("hr20ctl-{}.yml", std::process::id()));
        std::fs::write(&path, "variant: register\nregister:\n  send_retries: 0\n").unwrap();
        let error = Config::load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(format!("{error:#}").contains("send_retries"));
    }

    #[test]
    fn unknown_variant_is_rejected() {
        assert!(serde_yaml::from_str::<Config>("variant: modbus").is_err());
    }
}
