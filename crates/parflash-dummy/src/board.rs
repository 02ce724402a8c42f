//! Pin-level model of the reference board
//!
//! [`SimBoard`] implements [`Gpio`] and reacts to line changes the way the
//! real hardware does: the 74HC595 chain shifts on SRCLK and latches on RCLK,
//! the flash drives the data lines while CE# and OE# are low, and a write is
//! captured on the first rising edge of CE# or WE# that ends a write cycle.
//! The flash sees the data lines in DQ order, i.e. through the sequential
//! table, so payload written through the swapped table is stored garbled and
//! reads back intact.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use parflash_core::config::{HardwareConfig, DATA_WIDTH};
use parflash_core::error::{Error, Result};
use parflash_core::gpio::{Gpio, PinId, PinMode};
use parflash_core::nor::FLASH_WORDS;

use crate::chip::SimChip;

/// Simulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// Size of the flash array in words, a power of two
    pub words: u32,
    /// Status reads returned after each write-buffer commit
    pub program_busy_reads: u32,
    /// Status reads returned after a chip erase command
    pub erase_busy_polls: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            words: FLASH_WORDS,
            program_busy_reads: 2,
            erase_busy_polls: 3,
        }
    }
}

/// Simulated board: shift register chain, control lines and a flash chip
#[derive(Debug, Clone)]
pub struct SimBoard {
    wiring: HardwareConfig,
    levels: BTreeMap<PinId, bool>,
    modes: BTreeMap<PinId, PinMode>,
    /// DQ line number of each data pin
    dq: BTreeMap<PinId, usize>,
    shift: u32,
    latched: u32,
    chip: SimChip,
    /// Raw DQ word while the chip drives the bus
    driven: Option<u16>,
    output_cycle: bool,
    write_cycle: bool,
    elapsed_us: u64,
    read_cycles: u64,
    write_cycles: u64,
    /// Chip address and raw DQ word of the most recent write cycle
    last_write: Option<(u32, u16)>,
}

impl SimBoard {
    /// Board wired as `wiring`, with an erased chip
    ///
    /// # Errors
    /// * `InvalidPinMapping` / `ConfigError` - invalid wiring
    /// * `AddressOutOfBounds` - `words` is not a power of two or exceeds 24 bits
    pub fn new(wiring: &HardwareConfig, sim: SimConfig) -> Result<Self> {
        wiring.validate()?;
        if !sim.words.is_power_of_two() || sim.words > 1 << 24 {
            return Err(Error::AddressOutOfBounds);
        }
        Ok(Self::build(wiring, sim))
    }

    /// Reference board wiring with default simulation parameters
    pub fn reference() -> Self {
        Self::build(&HardwareConfig::default(), SimConfig::default())
    }

    fn build(wiring: &HardwareConfig, sim: SimConfig) -> Self {
        let dq = wiring
            .data
            .sequential
            .iter()
            .enumerate()
            .map(|(line, &pin)| (pin, line))
            .collect();

        // Control lines idle high until configured
        let levels = wiring.control.all().iter().map(|&pin| (pin, true)).collect();

        Self {
            wiring: *wiring,
            levels,
            modes: BTreeMap::new(),
            dq,
            shift: 0,
            latched: 0,
            chip: SimChip::new(sim.words, sim.program_busy_reads, sim.erase_busy_polls),
            driven: None,
            output_cycle: false,
            write_cycle: false,
            elapsed_us: 0,
            read_cycles: 0,
            write_cycles: 0,
            last_write: None,
        }
    }

    /// Address currently presented by the shift register outputs
    pub fn latched_address(&self) -> u32 {
        self.latched
    }

    /// The emulated flash chip
    pub fn chip(&self) -> &SimChip {
        &self.chip
    }

    /// Mutable access to the emulated flash chip
    pub fn chip_mut(&mut self) -> &mut SimChip {
        &mut self.chip
    }

    /// Total time spent in `delay_us`/`delay_ms`
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    /// Number of completed read cycles
    pub fn read_cycles(&self) -> u64 {
        self.read_cycles
    }

    /// Number of completed write cycles
    pub fn write_cycles(&self) -> u64 {
        self.write_cycles
    }

    /// Chip address and DQ word of the most recent write cycle
    ///
    /// Recorded even when the chip ignores the write.
    pub fn last_write(&self) -> Option<(u32, u16)> {
        self.last_write
    }

    /// Convert a word as the controller sees it into chip DQ order
    pub fn to_chip(&self, word: u16) -> u16 {
        self.wiring
            .data
            .swapped
            .iter()
            .enumerate()
            .filter(|&(i, _)| word >> (DATA_WIDTH - 1 - i) & 1 != 0)
            .fold(0, |raw, (_, pin)| raw | 1u16 << self.dq[pin])
    }

    /// Convert a chip DQ word into the value the controller reads
    pub fn from_chip(&self, raw: u16) -> u16 {
        self.wiring
            .data
            .swapped
            .iter()
            .fold(0, |word, pin| word << 1 | (raw >> self.dq[pin] & 1))
    }

    /// Word at `addr` as the controller would read it
    pub fn word(&self, addr: u32) -> u16 {
        let memory = self.chip.memory();
        self.from_chip(memory[addr as usize & (memory.len() - 1)])
    }

    /// Words `start..start + len` as the controller would read them
    pub fn words(&self, start: u32, len: u32) -> Vec<u16> {
        (start..start + len).map(|addr| self.word(addr)).collect()
    }

    /// Store `words` at `start` as if programmed through the controller
    pub fn load(&mut self, start: u32, words: &[u16]) {
        for (offset, &word) in words.iter().enumerate() {
            let raw = self.to_chip(word);
            let memory = self.chip.memory_mut();
            let index = (start as usize + offset) & (memory.len() - 1);
            memory[index] = raw;
        }
    }

    fn level(&self, pin: PinId) -> bool {
        self.levels.get(&pin).copied().unwrap_or(false)
    }

    fn on_edge(&mut self, pin: PinId, rising: bool) {
        let address = self.wiring.address;
        if rising && pin == address.srclk {
            self.shift = (self.shift << 1 | self.level(address.ser) as u32) & 0xFF_FFFF;
        } else if rising && pin == address.rclk {
            self.latched = self.shift;
        }

        let control = self.wiring.control;
        if pin != control.ce && pin != control.oe && pin != control.we {
            return;
        }

        let ce = !self.level(control.ce);
        let oe = !self.level(control.oe);
        let we = !self.level(control.we);

        let output = ce && oe && !we;
        if output && !self.output_cycle {
            let raw = self.chip.read(self.latched);
            log::trace!("sim: read 0x{:06X} -> 0x{:04X}", self.latched, raw);
            self.driven = Some(raw);
            self.read_cycles += 1;
        } else if !output {
            self.driven = None;
        }
        self.output_cycle = output;

        let write = ce && we;
        if self.write_cycle && !write {
            let raw = self.sample_dq();
            log::trace!("sim: write 0x{:06X} <- 0x{:04X}", self.latched, raw);
            self.chip.write(self.latched, raw);
            self.write_cycles += 1;
            self.last_write = Some((self.latched, raw));
        }
        self.write_cycle = write;
    }

    /// Controller-driven level of every DQ line
    fn sample_dq(&self) -> u16 {
        self.wiring
            .data
            .sequential
            .iter()
            .enumerate()
            .fold(0, |raw, (line, &pin)| raw | (self.level(pin) as u16) << line)
    }
}

impl Gpio for SimBoard {
    fn configure(&mut self, pins: &[PinId], mode: PinMode) {
        for &pin in pins {
            self.modes.insert(pin, mode);
        }
    }

    fn set_pin(&mut self, pin: PinId, high: bool) {
        if self.modes.get(&pin) == Some(&PinMode::InputPullUp) {
            log::warn!("sim: write to input pin {}", pin);
        }
        let previous = self.levels.insert(pin, high).unwrap_or(false);
        if previous != high {
            self.on_edge(pin, high);
        }
    }

    fn get_pin(&self, pin: PinId) -> bool {
        match self.dq.get(&pin) {
            Some(&line) if self.modes.get(&pin) != Some(&PinMode::Output) => match self.driven {
                Some(raw) => raw >> line & 1 != 0,
                // Pulled up
                None => true,
            },
            _ => self.level(pin),
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += u64::from(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_us += u64::from(ms) * 1000;
    }
}
