//! Bidirectional 16-bit data bus
//!
//! The flash chip's DQ lines are wired to the controller out of order. Words
//! stored in the chip are therefore read and written through the *swapped*
//! pin table, which undoes the board wiring, while command opcodes are
//! written through the *sequential* table so that the chip sees the real
//! opcode on DQ0..DQ15.

use crate::config::{DataPins, DATA_WIDTH};
use crate::error::Result;
use crate::gpio::{Gpio, PinId, PinMode};

/// Bit order used when driving or sampling the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMapping {
    /// Board wiring order: table index `i` carries bit `15 - i`
    ///
    /// Used for every data word exchanged with the chip.
    Swapped,
    /// Chip DQ order: table index `i` carries bit `i`
    ///
    /// Used only for command opcodes.
    Sequential,
}

impl PinMapping {
    /// Logical bit carried by the pin at `index` of this mapping's table
    #[inline]
    pub const fn bit_for_index(self, index: usize) -> usize {
        match self {
            Self::Swapped => DATA_WIDTH - 1 - index,
            Self::Sequential => index,
        }
    }
}

/// Current direction of the data lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDirection {
    /// Pull-up biased inputs, chip may drive the bus
    Input,
    /// Controller drives the bus
    Output,
}

/// The 16 data lines shared with the flash chip
#[derive(Debug, Clone)]
pub struct DataBus {
    pins: DataPins,
    /// OE# of the chip, released before the controller starts driving
    oe: PinId,
    direction: BusDirection,
}

impl DataBus {
    /// Create a data bus after validating the pin tables
    ///
    /// The lines are not touched until [`DataBus::set_direction`] is called.
    pub fn new(pins: DataPins, oe: PinId) -> Result<Self> {
        pins.validate()?;
        Ok(Self {
            pins,
            oe,
            direction: BusDirection::Input,
        })
    }

    /// Last direction the lines were configured for
    pub fn direction(&self) -> BusDirection {
        self.direction
    }

    /// Pin table for a mapping
    pub fn table(&self, mapping: PinMapping) -> &[PinId; DATA_WIDTH] {
        match mapping {
            PinMapping::Swapped => &self.pins.swapped,
            PinMapping::Sequential => &self.pins.sequential,
        }
    }

    /// Reconfigure all 16 lines
    ///
    /// Switching to output first deasserts OE# so the chip and the controller
    /// never drive the bus at the same time.
    pub fn set_direction<G: Gpio + ?Sized>(&mut self, gpio: &mut G, direction: BusDirection) {
        let mode = match direction {
            BusDirection::Output => {
                gpio.set_pin(self.oe, true);
                PinMode::Output
            }
            BusDirection::Input => PinMode::InputPullUp,
        };
        gpio.configure(&self.pins.swapped, mode);
        self.direction = direction;
    }

    /// Sample a full word through the swapped mapping
    pub fn read_word<G: Gpio + ?Sized>(&self, gpio: &G) -> u16 {
        debug_assert_eq!(self.direction, BusDirection::Input);
        self.pins
            .swapped
            .iter()
            .fold(0u16, |word, &pin| (word << 1) | gpio.get_pin(pin) as u16)
    }

    /// Sample eight lines of the swapped table, MSB first
    ///
    /// `high` selects table entries 8..16, otherwise entries 0..8.
    pub fn read_half<G: Gpio + ?Sized>(&self, gpio: &G, high: bool) -> u8 {
        debug_assert_eq!(self.direction, BusDirection::Input);
        let start = if high { 8 } else { 0 };
        self.pins.swapped[start..start + 8]
            .iter()
            .fold(0u8, |byte, &pin| (byte << 1) | gpio.get_pin(pin) as u8)
    }

    /// Drive `value` onto the bus using `mapping`
    pub fn write_word<G: Gpio + ?Sized>(&self, gpio: &mut G, value: u16, mapping: PinMapping) {
        debug_assert_eq!(self.direction, BusDirection::Output);
        for (index, &pin) in self.table(mapping).iter().enumerate() {
            let bit = mapping.bit_for_index(index);
            gpio.set_pin(pin, (value >> bit) & 1 != 0);
        }
    }
}
