//! Hardware configuration
//!
//! The board wiring is described once, as an immutable [`HardwareConfig`],
//! and each bus component takes only the pins it drives. The default is the
//! reference board: an ESP32-S3 wired to three 74HC595 shift registers and an
//! S29GL064N in word mode.

#[cfg(feature = "std")]
mod toml;

#[cfg(feature = "std")]
pub use self::toml::ConfigFileError;

use crate::error::{Error, Result};
use crate::gpio::PinId;

/// Number of data lines
pub const DATA_WIDTH: usize = 16;

/// Shift register chain driving the address lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct AddressPins {
    /// Serial data input of the first register (SER)
    pub ser: PinId,
    /// Shift clock shared by the chain (SRCLK)
    pub srclk: PinId,
    /// Storage register clock shared by the chain (RCLK)
    pub rclk: PinId,
}

impl Default for AddressPins {
    fn default() -> Self {
        Self {
            ser: 45,
            srclk: 41,
            rclk: 42,
        }
    }
}

impl AddressPins {
    /// All three lines, for direction setup
    pub fn all(&self) -> [PinId; 3] {
        [self.ser, self.srclk, self.rclk]
    }
}

/// The two orderings of the 16 data lines
///
/// `swapped[i]` carries logical bit `15 - i` of data words as the chip stores
/// them on this board. `sequential[i]` is the chip's real DQ`i` line and
/// carries bit `i` of command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct DataPins {
    /// Pin table used for data words (reads and payload writes)
    pub swapped: [PinId; DATA_WIDTH],
    /// Pin table used for command opcodes, DQ0 first
    pub sequential: [PinId; DATA_WIDTH],
}

impl Default for DataPins {
    fn default() -> Self {
        Self {
            swapped: [33, 34, 35, 36, 37, 2, 3, 40, 8, 7, 6, 5, 4, 39, 38, 1],
            sequential: [40, 39, 38, 37, 36, 35, 34, 33, 1, 2, 3, 4, 5, 6, 7, 8],
        }
    }
}

impl DataPins {
    /// Check that both tables are permutations of the same 16 distinct pins
    pub fn validate(&self) -> Result<()> {
        let mut swapped = self.swapped;
        let mut sequential = self.sequential;
        swapped.sort_unstable();
        sequential.sort_unstable();

        if swapped.windows(2).any(|w| w[0] == w[1]) || swapped != sequential {
            return Err(Error::InvalidPinMapping);
        }
        Ok(())
    }
}

/// Active-low chip control lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct ControlPins {
    /// Chip enable (CE#)
    pub ce: PinId,
    /// Output enable (OE#)
    pub oe: PinId,
    /// Write enable (WE#)
    pub we: PinId,
}

impl Default for ControlPins {
    fn default() -> Self {
        Self {
            ce: 18,
            oe: 20,
            we: 19,
        }
    }
}

impl ControlPins {
    /// All three lines, for direction setup
    pub fn all(&self) -> [PinId; 3] {
        [self.ce, self.oe, self.we]
    }
}

/// Complete board wiring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct HardwareConfig {
    /// Address shift register chain
    pub address: AddressPins,
    /// Data bus tables
    pub data: DataPins,
    /// Control lines
    pub control: ControlPins,
}

impl HardwareConfig {
    /// Validate the configuration
    ///
    /// Besides the data tables, no pin may be used for two functions.
    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;

        let mut pins = [0 as PinId; DATA_WIDTH + 6];
        pins[..DATA_WIDTH].copy_from_slice(&self.data.sequential);
        pins[DATA_WIDTH..DATA_WIDTH + 3].copy_from_slice(&self.address.all());
        pins[DATA_WIDTH + 3..].copy_from_slice(&self.control.all());
        pins.sort_unstable();
        if pins.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::ConfigError);
        }
        Ok(())
    }
}
