//! Parallel NOR flash command protocol
//!
//! [`NorFlash`] owns the GPIO backend and sequences bus cycles on top of the
//! address and data buses:
//!
//! - a read cycle asserts CE# and OE# and samples the data bus
//! - a write cycle drives the bus, pulses CE# and WE# and releases the bus
//!
//! Command sequences (unlock, write-buffer program, chip erase, reset) follow
//! the AMD/Spansion command set used by the S29GL family in word mode.

use bitflags::bitflags;

use crate::address::AddressBus;
use crate::config::{ControlPins, HardwareConfig};
use crate::data::{BusDirection, DataBus, PinMapping};
use crate::error::Result;
use crate::gpio::{Gpio, PinMode};
use crate::poll::{self, PollObserver, PollOutcome};

/// Number of addressable words (22 address bits)
pub const FLASH_WORDS: u32 = 0x40_0000;

/// Low address bits selecting a word within a sector
pub const SECTOR_MASK: u32 = 0x7F;

/// Words committed per write-buffer program
pub const WRITE_BUFFER_WORDS: usize = 16;

/// Word polled during chip erase (byte address 0xA5000)
pub const ERASE_SENTINEL: u32 = 0xA5000 / 2;

/// Interval between chip erase polls
pub const ERASE_POLL_INTERVAL_MS: u32 = 500;

/// Wait between asserting OE# and sampling the bus
pub const READ_ACCESS_DELAY_US: u32 = 1;

/// First unlock cycle address
pub const UNLOCK_ADDR1: u32 = 0x555;
/// Second unlock cycle address
pub const UNLOCK_ADDR2: u32 = 0x2AA;

/// Command opcodes
pub mod opcodes {
    /// First unlock cycle data
    pub const UNLOCK1: u16 = 0xAA;
    /// Second unlock cycle data
    pub const UNLOCK2: u16 = 0x55;
    /// Write to buffer
    pub const WRITE_BUFFER_LOAD: u16 = 0x25;
    /// Program buffer to flash
    pub const WRITE_BUFFER_CONFIRM: u16 = 0x29;
    /// Erase setup
    pub const ERASE_SETUP: u16 = 0x80;
    /// Chip erase
    pub const CHIP_ERASE: u16 = 0x10;
    /// Return to read-array mode
    pub const RESET: u16 = 0xF0;
}

bitflags! {
    /// Active-low chip control lines
    ///
    /// Iteration order is CE#, OE#, WE#, which is also the order lines are
    /// asserted and released in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlLines: u8 {
        /// Chip enable
        const CE = 1 << 0;
        /// Output enable
        const OE = 1 << 1;
        /// Write enable
        const WE = 1 << 2;
    }
}

/// Base address of the 128-word sector containing `addr`
#[inline]
pub const fn sector_base(addr: u32) -> u32 {
    addr & !SECTOR_MASK
}

/// Parallel NOR flash attached through shift registers and GPIO
pub struct NorFlash<G> {
    gpio: G,
    address: AddressBus,
    data: DataBus,
    control: ControlPins,
}

impl<G: Gpio> NorFlash<G> {
    /// Create a flash device on `gpio` wired as described by `config`
    ///
    /// No lines are touched until [`NorFlash::init`] is called.
    pub fn new(gpio: G, config: &HardwareConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            gpio,
            address: AddressBus::new(config.address),
            data: DataBus::new(config.data, config.control.oe)?,
            control: config.control,
        })
    }

    /// Bring up the lines: address and control pins as outputs with every
    /// control line deasserted, data bus as pull-up inputs
    pub fn init(&mut self) {
        log::debug!("nor: configuring bus lines");
        self.gpio
            .configure(&self.address.output_pins(), PinMode::Output);
        self.gpio.configure(&self.control.all(), PinMode::Output);
        self.release(ControlLines::all());
        self.data.set_direction(&mut self.gpio, BusDirection::Input);
    }

    /// Access the GPIO backend
    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    /// Mutable access to the GPIO backend
    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }

    /// Consume the device and return the GPIO backend
    pub fn into_inner(self) -> G {
        self.gpio
    }

    fn drive(&mut self, lines: ControlLines, asserted: bool) {
        for line in lines.iter() {
            let pin = if line == ControlLines::CE {
                self.control.ce
            } else if line == ControlLines::OE {
                self.control.oe
            } else {
                self.control.we
            };
            // Active low
            self.gpio.set_pin(pin, !asserted);
        }
    }

    fn assert(&mut self, lines: ControlLines) {
        self.drive(lines, true);
    }

    fn release(&mut self, lines: ControlLines) {
        self.drive(lines, false);
    }

    fn start_read(&mut self, addr: u32) {
        self.address.set_address(&mut self.gpio, addr);
        self.assert(ControlLines::CE | ControlLines::OE);
        self.gpio.delay_us(READ_ACCESS_DELAY_US);
    }

    /// Read one word
    pub fn read_at(&mut self, addr: u32) -> u16 {
        self.start_read(addr);
        let word = self.data.read_word(&self.gpio);
        self.release(ControlLines::CE | ControlLines::OE);
        word
    }

    /// Read eight lines of one word, see [`DataBus::read_half`]
    pub fn read_half_at(&mut self, addr: u32, high: bool) -> u8 {
        self.start_read(addr);
        let byte = self.data.read_half(&self.gpio, high);
        self.release(ControlLines::CE | ControlLines::OE);
        byte
    }

    /// Perform one write cycle
    ///
    /// WE# is toggled while CE# is held low; the chip latches the data on the
    /// first rising edge. The bus is returned to input afterwards.
    pub fn write_cycle(&mut self, addr: u32, value: u16, mapping: PinMapping) {
        self.address.set_address(&mut self.gpio, addr);
        self.data.set_direction(&mut self.gpio, BusDirection::Output);
        self.data.write_word(&mut self.gpio, value, mapping);
        self.assert(ControlLines::CE | ControlLines::WE);
        self.release(ControlLines::CE | ControlLines::WE);
        self.data.set_direction(&mut self.gpio, BusDirection::Input);
    }

    /// Write a command opcode to a command register
    pub fn write_command(&mut self, addr: u32, opcode: u16) {
        self.write_cycle(addr, opcode, PinMapping::Sequential);
    }

    /// Write a data word to the flash array
    pub fn write_payload(&mut self, addr: u32, word: u16) {
        self.write_cycle(addr, word, PinMapping::Swapped);
    }

    /// Issue the two-cycle unlock sequence
    pub fn unlock(&mut self) {
        self.write_command(UNLOCK_ADDR1, opcodes::UNLOCK1);
        self.write_command(UNLOCK_ADDR2, opcodes::UNLOCK2);
    }

    /// Return the chip to read-array mode
    pub fn reset(&mut self) {
        log::debug!("nor: reset to read-array mode");
        self.write_command(0, opcodes::RESET);
    }

    /// Load and commit one 16-word write buffer starting at `addr`
    ///
    /// The buffer is bound to the sector containing `addr`; all words must
    /// lie in that sector. Returns the address of the last word written.
    /// The program algorithm is still running when this returns; see
    /// [`NorFlash::wait_for_data`].
    pub fn write_buffer(&mut self, addr: u32, words: &[u16; WRITE_BUFFER_WORDS]) -> u32 {
        let sector = sector_base(addr);
        debug_assert_eq!(
            sector,
            sector_base(addr + WRITE_BUFFER_WORDS as u32 - 1),
            "write buffer crosses a sector boundary"
        );
        log::trace!("nor: write buffer at 0x{:06X} (sector 0x{:06X})", addr, sector);

        self.unlock();
        self.write_command(sector, opcodes::WRITE_BUFFER_LOAD);
        self.write_command(sector, WRITE_BUFFER_WORDS as u16 - 1);
        for (offset, &word) in words.iter().enumerate() {
            self.write_payload(addr + offset as u32, word);
        }
        self.write_command(sector, opcodes::WRITE_BUFFER_CONFIRM);

        addr + WRITE_BUFFER_WORDS as u32 - 1
    }

    /// Poll `addr` until it reads back `expected`
    ///
    /// There is no timeout: the only other way out is the observer asking to
    /// cancel, which is checked after every read that has not converged.
    pub fn wait_for_data<O: PollObserver + ?Sized>(
        &mut self,
        addr: u32,
        expected: u16,
        observer: &mut O,
    ) -> PollOutcome {
        loop {
            let read = self.read_at(addr);
            if poll::program_complete(read, expected) {
                return PollOutcome::Complete;
            }
            if observer.cancel_requested() {
                log::debug!(
                    "nor: data polling at 0x{:06X} cancelled (read 0x{:04X}, want 0x{:04X})",
                    addr,
                    read,
                    expected
                );
                return PollOutcome::Cancelled;
            }
        }
    }

    /// Erase the whole chip and wait for the sentinel word to read erased
    ///
    /// The sentinel is sampled every [`ERASE_POLL_INTERVAL_MS`] and each value
    /// is handed to the observer before the cancel check.
    pub fn chip_erase<O: PollObserver + ?Sized>(&mut self, observer: &mut O) -> PollOutcome {
        log::info!("nor: chip erase started");
        self.unlock();
        self.write_command(UNLOCK_ADDR1, opcodes::ERASE_SETUP);
        self.unlock();
        self.write_command(UNLOCK_ADDR1, opcodes::CHIP_ERASE);

        loop {
            self.gpio.delay_ms(ERASE_POLL_INTERVAL_MS);
            let read = self.read_at(ERASE_SENTINEL);
            observer.erase_poll(read);
            if poll::erase_complete(read) {
                log::info!("nor: chip erase complete");
                return PollOutcome::Complete;
            }
            if observer.cancel_requested() {
                log::warn!("nor: chip erase cancelled, chip may still be busy");
                return PollOutcome::Cancelled;
            }
        }
    }
}
