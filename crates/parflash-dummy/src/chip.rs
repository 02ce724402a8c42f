//! S29GL064N-style command state machine
//!
//! Works purely in chip terms: addresses are word addresses as seen on
//! A0..A21 and values are raw DQ0..DQ15 words. Wiring is the board's job.

use alloc::vec;
use alloc::vec::Vec;

use parflash_core::nor::{opcodes, sector_base, UNLOCK_ADDR1, UNLOCK_ADDR2, WRITE_BUFFER_WORDS};
use parflash_core::poll::ERASED_WORD;

/// Command address bits compared by the chip in word mode (A10..A0)
const COMMAND_ADDR_MASK: u32 = 0x7FF;

/// DQ7: data polling bit
const DQ7: u16 = 1 << 7;
/// DQ6: toggle bit
const DQ6: u16 = 1 << 6;

/// Where the chip is in a command sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipState {
    /// Read-array mode
    Read,
    /// First unlock cycle seen
    Unlock1,
    /// Both unlock cycles seen
    Unlocked,
    /// Write-to-buffer accepted, waiting for the word count
    BufferCount {
        /// Sector the buffer is bound to
        sector: u32,
    },
    /// Loading buffer words
    BufferLoad {
        /// Sector the buffer is bound to
        sector: u32,
        /// Words still expected
        remaining: u16,
    },
    /// Buffer full, waiting for the confirm
    BufferReady {
        /// Sector the buffer is bound to
        sector: u32,
    },
    /// Erase setup accepted
    EraseSetup,
    /// First erase unlock cycle seen
    EraseUnlock1,
    /// Second erase unlock cycle seen
    EraseUnlock2,
}

#[derive(Debug, Clone, Copy)]
enum Busy {
    Program { data: u16, remaining: u32 },
    Erase { remaining: u32 },
}

/// Word-addressed NOR flash array with an embedded algorithm model
#[derive(Debug, Clone)]
pub struct SimChip {
    memory: Vec<u16>,
    mask: u32,
    state: ChipState,
    buffer: Vec<(u32, u16)>,
    busy: Option<Busy>,
    toggle: bool,
    program_busy_reads: u32,
    erase_busy_polls: u32,
    programs: u32,
    erases: u32,
    resets: u32,
}

impl SimChip {
    /// Erased chip of `words` words (a power of two); higher addresses alias
    pub fn new(words: u32, program_busy_reads: u32, erase_busy_polls: u32) -> Self {
        debug_assert!(words.is_power_of_two());
        Self {
            memory: vec![ERASED_WORD; words as usize],
            mask: words - 1,
            state: ChipState::Read,
            buffer: Vec::with_capacity(WRITE_BUFFER_WORDS),
            busy: None,
            toggle: false,
            program_busy_reads,
            erase_busy_polls,
            programs: 0,
            erases: 0,
            resets: 0,
        }
    }

    /// Current command state
    pub fn state(&self) -> ChipState {
        self.state
    }

    /// True while an embedded program or erase algorithm runs
    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    /// Raw array contents
    pub fn memory(&self) -> &[u16] {
        &self.memory
    }

    /// Mutable raw array contents
    pub fn memory_mut(&mut self) -> &mut [u16] {
        &mut self.memory
    }

    /// Write buffers committed so far
    pub fn programs(&self) -> u32 {
        self.programs
    }

    /// Chip erases started so far
    pub fn erases(&self) -> u32 {
        self.erases
    }

    /// Reset commands accepted so far
    pub fn resets(&self) -> u32 {
        self.resets
    }

    fn index(&self, addr: u32) -> usize {
        (addr & self.mask) as usize
    }

    /// Read cycle
    ///
    /// While busy the chip returns status: DQ7 is the complement of the last
    /// programmed bit 7 (0 during erase) and DQ6 toggles on every read.
    pub fn read(&mut self, addr: u32) -> u16 {
        self.settle();
        match self.busy {
            Some(Busy::Program { data, remaining }) => {
                self.busy = Some(Busy::Program {
                    data,
                    remaining: remaining - 1,
                });
                self.status(!data & DQ7)
            }
            Some(Busy::Erase { remaining }) => {
                self.busy = Some(Busy::Erase {
                    remaining: remaining - 1,
                });
                self.status(0)
            }
            None => self.memory[self.index(addr)],
        }
    }

    /// Finish an embedded algorithm whose busy time has run out
    ///
    /// Runs at the start of every bus cycle, so `busy` only ever holds a
    /// nonzero count afterwards.
    fn settle(&mut self) {
        match self.busy {
            Some(Busy::Program { remaining: 0, .. }) => self.busy = None,
            Some(Busy::Erase { remaining: 0 }) => {
                self.memory.fill(ERASED_WORD);
                self.busy = None;
            }
            _ => {}
        }
    }

    fn status(&mut self, dq7: u16) -> u16 {
        self.toggle = !self.toggle;
        dq7 | if self.toggle { DQ6 } else { 0 }
    }

    /// Write cycle
    pub fn write(&mut self, addr: u32, data: u16) {
        self.settle();
        if self.busy.is_some() {
            log::trace!("sim: write 0x{:04X} at 0x{:06X} ignored while busy", data, addr);
            return;
        }

        if data == opcodes::RESET && !matches!(self.state, ChipState::BufferLoad { .. }) {
            self.resets += 1;
            self.state = ChipState::Read;
            return;
        }

        let cmd = addr & COMMAND_ADDR_MASK;
        self.state = match self.state {
            ChipState::BufferLoad { sector, remaining } => {
                if sector_base(addr) != sector {
                    log::debug!("sim: buffer word outside sector 0x{:06X}, abort", sector);
                    ChipState::Read
                } else {
                    self.buffer.push((addr, data));
                    if remaining == 1 {
                        ChipState::BufferReady { sector }
                    } else {
                        ChipState::BufferLoad {
                            sector,
                            remaining: remaining - 1,
                        }
                    }
                }
            }
            ChipState::Read if cmd == UNLOCK_ADDR1 && data == opcodes::UNLOCK1 => {
                ChipState::Unlock1
            }
            ChipState::Unlock1 if cmd == UNLOCK_ADDR2 && data == opcodes::UNLOCK2 => {
                ChipState::Unlocked
            }
            ChipState::Unlocked if data == opcodes::WRITE_BUFFER_LOAD => ChipState::BufferCount {
                sector: sector_base(addr),
            },
            ChipState::Unlocked if cmd == UNLOCK_ADDR1 && data == opcodes::ERASE_SETUP => {
                ChipState::EraseSetup
            }
            ChipState::BufferCount { sector }
                if sector_base(addr) == sector && usize::from(data) < WRITE_BUFFER_WORDS =>
            {
                self.buffer.clear();
                ChipState::BufferLoad {
                    sector,
                    remaining: data + 1,
                }
            }
            ChipState::BufferReady { sector }
                if sector_base(addr) == sector && data == opcodes::WRITE_BUFFER_CONFIRM =>
            {
                self.commit_buffer();
                ChipState::Read
            }
            ChipState::EraseSetup if cmd == UNLOCK_ADDR1 && data == opcodes::UNLOCK1 => {
                ChipState::EraseUnlock1
            }
            ChipState::EraseUnlock1 if cmd == UNLOCK_ADDR2 && data == opcodes::UNLOCK2 => {
                ChipState::EraseUnlock2
            }
            ChipState::EraseUnlock2 if cmd == UNLOCK_ADDR1 && data == opcodes::CHIP_ERASE => {
                log::debug!("sim: chip erase started");
                self.erases += 1;
                self.busy = Some(Busy::Erase {
                    remaining: self.erase_busy_polls,
                });
                ChipState::Read
            }
            state => {
                log::debug!(
                    "sim: unexpected write 0x{:04X} at 0x{:06X} in {:?}",
                    data,
                    addr,
                    state
                );
                ChipState::Read
            }
        };
    }

    fn commit_buffer(&mut self) {
        let mut last = None;
        for i in 0..self.buffer.len() {
            let (addr, data) = self.buffer[i];
            let index = self.index(addr);
            // Programming only clears bits
            self.memory[index] &= data;
            last = Some(data);
        }
        self.buffer.clear();
        self.programs += 1;
        if let Some(data) = last {
            self.busy = Some(Busy::Program {
                data,
                remaining: self.program_busy_reads,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlock(chip: &mut SimChip) {
        chip.write(UNLOCK_ADDR1, opcodes::UNLOCK1);
        chip.write(UNLOCK_ADDR2, opcodes::UNLOCK2);
    }

    fn program(chip: &mut SimChip, addr: u32, words: &[u16]) {
        let sector = sector_base(addr);
        unlock(chip);
        chip.write(sector, opcodes::WRITE_BUFFER_LOAD);
        chip.write(sector, words.len() as u16 - 1);
        for (i, &w) in words.iter().enumerate() {
            chip.write(addr + i as u32, w);
        }
        chip.write(sector, opcodes::WRITE_BUFFER_CONFIRM);
    }

    #[test]
    fn test_write_buffer_program() {
        let mut chip = SimChip::new(0x1000, 0, 0);
        program(&mut chip, 0x110, &[0x1234, 0xABCD]);
        assert_eq!(chip.programs(), 1);
        assert_eq!(chip.read(0x110), 0x1234);
        assert_eq!(chip.read(0x111), 0xABCD);
        assert_eq!(chip.read(0x112), ERASED_WORD);
        assert_eq!(chip.state(), ChipState::Read);
    }

    #[test]
    fn test_program_only_clears_bits() {
        let mut chip = SimChip::new(0x1000, 0, 0);
        program(&mut chip, 0, &[0xFF00]);
        program(&mut chip, 0, &[0x0FF0]);
        assert_eq!(chip.read(0), 0x0F00);
    }

    #[test]
    fn test_program_busy_status() {
        let mut chip = SimChip::new(0x1000, 3, 0);
        program(&mut chip, 0x20, &[0x0080]);
        assert!(chip.is_busy());

        let first = chip.read(0x20);
        let second = chip.read(0x20);
        let third = chip.read(0x20);
        for status in [first, second, third] {
            // DQ7 inverted
            assert_eq!(status & DQ7, 0);
        }
        assert_ne!(first & DQ6, second & DQ6);
        assert_ne!(second & DQ6, third & DQ6);

        assert_eq!(chip.read(0x20), 0x0080);
        assert!(!chip.is_busy());
    }

    #[test]
    fn test_chip_erase() {
        let mut chip = SimChip::new(0x1000, 0, 2);
        chip.memory_mut().fill(0);
        unlock(&mut chip);
        chip.write(UNLOCK_ADDR1, opcodes::ERASE_SETUP);
        unlock(&mut chip);
        chip.write(UNLOCK_ADDR1, opcodes::CHIP_ERASE);
        assert!(chip.is_busy());
        assert_eq!(chip.erases(), 1);

        assert_ne!(chip.read(0x800), ERASED_WORD);
        assert_ne!(chip.read(0x800), ERASED_WORD);
        assert_eq!(chip.read(0x800), ERASED_WORD);
        assert!(chip.memory().iter().all(|&w| w == ERASED_WORD));
    }

    #[test]
    fn test_zero_busy_time_settles_on_next_cycle() {
        let mut chip = SimChip::new(0x1000, 0, 0);
        chip.memory_mut().fill(0x1234);
        unlock(&mut chip);
        chip.write(UNLOCK_ADDR1, opcodes::ERASE_SETUP);
        unlock(&mut chip);
        chip.write(UNLOCK_ADDR1, opcodes::CHIP_ERASE);

        // Program straight after the erase, no status read in between
        program(&mut chip, 0x40, &[0x00FF]);
        assert_eq!(chip.programs(), 1);
        program(&mut chip, 0x41, &[0xFF00]);
        assert_eq!(chip.programs(), 2);
        assert_eq!(chip.read(0x40), 0x00FF);
        assert_eq!(chip.read(0x41), 0xFF00);
        assert_eq!(chip.read(0x42), ERASED_WORD);
        assert!(!chip.is_busy());
    }

    #[test]
    fn test_writes_ignored_while_busy() {
        let mut chip = SimChip::new(0x1000, 2, 0);
        program(&mut chip, 0, &[0x0F0F]);
        chip.write(0, opcodes::RESET);
        assert_eq!(chip.resets(), 0);

        chip.read(0);
        chip.read(0);
        chip.write(0, opcodes::RESET);
        assert_eq!(chip.resets(), 1);
        assert_eq!(chip.read(0), 0x0F0F);
    }

    #[test]
    fn test_command_addresses_use_low_bits() {
        let mut chip = SimChip::new(0x1000, 0, 0);
        chip.write(0x10_0555, opcodes::UNLOCK1);
        assert_eq!(chip.state(), ChipState::Unlock1);
        chip.write(0x2AA | 0x800, opcodes::UNLOCK2);
        assert_eq!(chip.state(), ChipState::Unlocked);
    }

    #[test]
    fn test_bad_sequence_returns_to_read() {
        let mut chip = SimChip::new(0x1000, 0, 0);
        chip.write(UNLOCK_ADDR1, opcodes::UNLOCK1);
        chip.write(UNLOCK_ADDR1, opcodes::UNLOCK2);
        assert_eq!(chip.state(), ChipState::Read);

        // Buffer word outside the bound sector aborts
        unlock(&mut chip);
        chip.write(0x80, opcodes::WRITE_BUFFER_LOAD);
        chip.write(0x80, 1);
        chip.write(0x100, 0);
        assert_eq!(chip.state(), ChipState::Read);
        assert_eq!(chip.programs(), 0);
    }

    #[test]
    fn test_reset_returns_to_read() {
        let mut chip = SimChip::new(0x1000, 0, 0);
        unlock(&mut chip);
        chip.write(UNLOCK_ADDR1, opcodes::ERASE_SETUP);
        assert_eq!(chip.state(), ChipState::EraseSetup);
        chip.write(0, opcodes::RESET);
        assert_eq!(chip.state(), ChipState::Read);
        assert_eq!(chip.resets(), 1);
    }

    #[test]
    fn test_reset_is_data_while_loading_buffer() {
        let mut chip = SimChip::new(0x1000, 0, 0);
        program(&mut chip, 0, &[opcodes::RESET, 0x1111]);
        assert_eq!(chip.resets(), 0);
        assert_eq!(chip.read(0), opcodes::RESET);
        assert_eq!(chip.read(1), 0x1111);
    }

    #[test]
    fn test_addresses_alias() {
        let mut chip = SimChip::new(0x1000, 0, 0);
        program(&mut chip, 0x10, &[0x5555]);
        assert_eq!(chip.read(0x1010), 0x5555);
    }
}
