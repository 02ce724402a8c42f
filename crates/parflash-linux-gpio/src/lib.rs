//! parflash-linux-gpio - Linux GPIO backend for parflash
//!
//! This crate drives the programmer board from a Linux host through the GPIO
//! character device interface (gpiocdev), e.g. on a Raspberry Pi wired to
//! the shift registers and the flash chip.
//!
//! # Example
//!
//! ```no_run
//! use parflash_core::config::HardwareConfig;
//! use parflash_core::nor::NorFlash;
//! use parflash_linux_gpio::{LinuxGpio, LinuxGpioConfig};
//!
//! let wiring = HardwareConfig::default();
//! let gpio = LinuxGpio::open(&LinuxGpioConfig::new("/dev/gpiochip0"), &wiring)?;
//! let mut flash = NorFlash::new(gpio, &wiring)?;
//! flash.init();
//! println!("word 0: {:04X}", flash.read_at(0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with parflash CLI
//!
//! ```bash
//! # Device path, wiring from a TOML file (pin numbers are line offsets)
//! parflash --config board.toml dump -p linux_gpio:dev=/dev/gpiochip0 --storage /mnt/sd
//!
//! # Using gpiochip number instead of device path
//! parflash erase -p linux_gpio:gpiochip=0
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel 5.5+ with GPIO character device support (bias needs the v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxGpio, LinuxGpioConfig};
pub use error::{LinuxGpioError, Result};

use parflash_core::config::HardwareConfig;
use parflash_core::gpio::Gpio;

/// Open a Linux GPIO device and return a boxed Gpio
///
/// This is a convenience function for use in the CLI programmer dispatch.
///
/// # Example Options
///
/// - `dev=/dev/gpiochip0` - GPIO chip device path (or use gpiochip=N)
/// - `gpiochip=0` - GPIO chip number (alternative to dev)
/// - `consumer=parflash` - line consumer label
pub fn open_linux_gpio(
    options: &[(&str, &str)],
    wiring: &HardwareConfig,
) -> std::result::Result<Box<dyn Gpio>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let gpio = LinuxGpio::open(&config, wiring)?;
    Ok(Box::new(gpio))
}
