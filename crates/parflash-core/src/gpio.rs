//! GPIO backend trait for bitbang programmers
//!
//! Everything above this layer is expressed as pin writes, pin reads and
//! fixed delays. A backend only has to move individual lines; the bus cycles
//! and chip protocol live in [`crate::address`], [`crate::data`] and
//! [`crate::nor`].
//!
//! ## Implementations
//!
//! - `parflash-linux-gpio` - Linux GPIO character device (gpiocdev)
//! - `parflash-dummy` - simulated board with an emulated flash chip
//!
//! Backends should not panic when a line operation fails. Log the failure
//! with `log::error!` and carry on, like a microcontroller port register
//! write that cannot fail.

/// Identifier of a physical line (GPIO number or line offset)
pub type PinId = u32;

/// Electrical configuration of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Push-pull output
    Output,
    /// Floating input biased by a pull-up
    InputPullUp,
}

/// Trait for low-level pin operations
pub trait Gpio {
    /// Configure every pin in `pins` to `mode`
    fn configure(&mut self, pins: &[PinId], mode: PinMode);

    /// Drive an output pin high or low
    fn set_pin(&mut self, pin: PinId, high: bool);

    /// Sample the current level of a pin
    fn get_pin(&self, pin: PinId) -> bool;

    /// Busy-wait or sleep for `us` microseconds
    fn delay_us(&mut self, us: u32);

    /// Sleep for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }
}

impl<G: Gpio + ?Sized> Gpio for &mut G {
    fn configure(&mut self, pins: &[PinId], mode: PinMode) {
        (**self).configure(pins, mode)
    }

    fn set_pin(&mut self, pin: PinId, high: bool) {
        (**self).set_pin(pin, high)
    }

    fn get_pin(&self, pin: PinId) -> bool {
        (**self).get_pin(pin)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

#[cfg(feature = "alloc")]
impl<G: Gpio + ?Sized> Gpio for alloc::boxed::Box<G> {
    fn configure(&mut self, pins: &[PinId], mode: PinMode) {
        (**self).configure(pins, mode)
    }

    fn set_pin(&mut self, pin: PinId, high: bool) {
        (**self).set_pin(pin, high)
    }

    fn get_pin(&self, pin: PinId) -> bool {
        (**self).get_pin(pin)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}
