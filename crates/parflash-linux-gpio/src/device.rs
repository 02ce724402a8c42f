//! Linux GPIO character device backend
//!
//! All lines of the board are requested once, when the device is opened:
//! the shift register and control lines as outputs, the data lines as
//! pull-up inputs. Direction changes of the data bus are then applied with
//! a reconfigure of the whole request.
//!
//! Pin numbers in the [`HardwareConfig`] are line offsets on the chosen
//! gpiochip.

use std::time::{Duration, Instant};

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Bias, Value};
use gpiocdev::request::{Config, Request};

use parflash_core::config::HardwareConfig;
use parflash_core::gpio::{Gpio, PinId, PinMode};

/// Delays below this are busy-waited; sleeping overshoots by tens of microseconds
const SPIN_THRESHOLD_US: u32 = 100;

/// Configuration for opening a Linux GPIO device
#[derive(Debug, Clone, Default)]
pub struct LinuxGpioConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Line consumer label
    pub consumer: Option<String>,
}

impl LinuxGpioConfig {
    /// Create a configuration for the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            consumer: None,
        }
    }
}

/// Parallel flash lines on a Linux gpiochip
pub struct LinuxGpio {
    /// GPIO line request handle
    request: Request,
    /// Full line configuration, kept in sync with the request
    config: Config,
}

impl LinuxGpio {
    /// Request every line used by `wiring`
    ///
    /// Outputs start low, except the active-low control lines which start
    /// high so the chip stays deselected.
    pub fn open(config: &LinuxGpioConfig, wiring: &HardwareConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }
        wiring.validate().map_err(LinuxGpioError::InvalidWiring)?;

        log::debug!("linux_gpio: Opening device {}", config.device);

        let mut req_config = Config::default();
        for offset in wiring.address.all() {
            req_config.with_line(offset).as_output(Value::Inactive);
        }
        for offset in wiring.control.all() {
            req_config.with_line(offset).as_output(Value::Active);
        }
        for offset in wiring.data.swapped {
            req_config
                .with_line(offset)
                .as_input()
                .with_bias(Bias::PullUp);
        }

        let request = Request::from_config(req_config.clone())
            .on_chip(&config.device)
            .with_consumer(config.consumer.as_deref().unwrap_or("parflash"))
            .request()
            .map_err(|source| LinuxGpioError::LineRequestFailed {
                path: config.device.clone(),
                source,
            })?;

        log::info!(
            "linux_gpio: Opened {} (ser={}, srclk={}, rclk={}, ce={}, oe={}, we={})",
            config.device,
            wiring.address.ser,
            wiring.address.srclk,
            wiring.address.rclk,
            wiring.control.ce,
            wiring.control.oe,
            wiring.control.we
        );

        Ok(Self {
            request,
            config: req_config,
        })
    }
}

fn value_of(high: bool) -> Value {
    if high {
        Value::Active
    } else {
        Value::Inactive
    }
}

impl Gpio for LinuxGpio {
    fn configure(&mut self, pins: &[PinId], mode: PinMode) {
        for &pin in pins {
            let line = self.config.with_line(pin);
            match mode {
                PinMode::Output => {
                    line.as_output(Value::Inactive);
                }
                PinMode::InputPullUp => {
                    line.as_input().with_bias(Bias::PullUp);
                }
            }
        }
        if let Err(e) = self.request.reconfigure(&self.config) {
            log::error!("Failed to configure lines as {:?}: {}", mode, e);
        }
    }

    fn set_pin(&mut self, pin: PinId, high: bool) {
        if let Err(e) = self.request.set_value(pin, value_of(high)) {
            log::error!("Failed to set line {}: {}", pin, e);
        }
    }

    fn get_pin(&self, pin: PinId) -> bool {
        match self.request.value(pin) {
            Ok(Value::Active) => true,
            Ok(Value::Inactive) => false,
            Err(e) => {
                log::error!("Failed to get line {}: {}", pin, e);
                false
            }
        }
    }

    fn delay_us(&mut self, us: u32) {
        let duration = Duration::from_micros(u64::from(us));
        if us < SPIN_THRESHOLD_US {
            let start = Instant::now();
            while start.elapsed() < duration {
                std::hint::spin_loop();
            }
        } else {
            std::thread::sleep(duration);
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Parse programmer options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (required, or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `consumer=NAME` - line consumer label (optional, default "parflash")
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxGpioConfig, String> {
    let mut config = LinuxGpioConfig::default();
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "gpiochip" => {
                gpiochip = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid gpiochip value: {}", value))?,
                );
            }
            "consumer" => {
                config.consumer = Some(value.to_string());
            }
            _ => {
                log::warn!("linux_gpio: Unknown option: {}={}", key, value);
            }
        }
    }

    // Handle dev vs gpiochip
    if config.device.is_empty() {
        if let Some(n) = gpiochip {
            config.device = format!("/dev/gpiochip{}", n);
        } else {
            return Err("Either 'dev' or 'gpiochip' must be specified.\n\
                 e.g. linux_gpio:dev=/dev/gpiochip0"
                .to_string());
        }
    } else if gpiochip.is_some() {
        return Err("Only one of 'dev' or 'gpiochip' can be specified".to_string());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dev() {
        let config = parse_options(&[("dev", "/dev/gpiochip2")]).unwrap();
        assert_eq!(config.device, "/dev/gpiochip2");
        assert!(config.consumer.is_none());
    }

    #[test]
    fn test_parse_gpiochip_number() {
        let config = parse_options(&[("gpiochip", "1"), ("consumer", "flash")]).unwrap();
        assert_eq!(config.device, "/dev/gpiochip1");
        assert_eq!(config.consumer.as_deref(), Some("flash"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_options(&[]).is_err());
        assert!(parse_options(&[("gpiochip", "x")]).is_err());
        assert!(parse_options(&[("dev", "/dev/gpiochip0"), ("gpiochip", "0")]).is_err());
    }

    #[test]
    fn test_open_without_device() {
        let result = LinuxGpio::open(&LinuxGpioConfig::default(), &HardwareConfig::default());
        assert!(matches!(result, Err(LinuxGpioError::NoDevice)));
    }
}
