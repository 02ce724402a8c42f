//! Address bus driven through a shift register chain
//!
//! Three daisy-chained 74HC595s turn three controller pins into 24 stable
//! address lines. Bits are shifted MSB first so that, after 24 shift clocks,
//! bit 23 sits at the far end of the chain. A single storage clock pulse then
//! presents the new address on all outputs at once.

use crate::config::AddressPins;
use crate::gpio::{Gpio, PinId};

/// Width of the shift register chain in bits
pub const ADDRESS_BITS: u32 = 24;

/// Serial-to-parallel address bus
#[derive(Debug, Clone, Copy)]
pub struct AddressBus {
    pins: AddressPins,
}

impl AddressBus {
    /// Create an address bus on the given pins
    pub fn new(pins: AddressPins) -> Self {
        Self { pins }
    }

    /// Lines that must be configured as outputs
    pub fn output_pins(&self) -> [PinId; 3] {
        self.pins.all()
    }

    /// Shift `addr` into the chain and latch it onto the address lines
    ///
    /// Only the low 24 bits are used. Both clocks are left low.
    pub fn set_address<G: Gpio + ?Sized>(&self, gpio: &mut G, addr: u32) {
        let AddressPins { ser, srclk, rclk } = self.pins;

        gpio.set_pin(srclk, false);
        gpio.set_pin(ser, false);
        gpio.set_pin(rclk, false);

        for bit in (0..ADDRESS_BITS).rev() {
            gpio.set_pin(ser, (addr >> bit) & 1 != 0);
            gpio.set_pin(srclk, true);
            gpio.set_pin(srclk, false);
        }

        gpio.set_pin(rclk, true);
        gpio.set_pin(rclk, false);
    }
}
