//! Whole-chip bulk operations
//!
//! [`TransferEngine`] streams words between the flash and a storage file:
//!
//! - **dump**: every word, high byte first, to [`DUMP_PATH`]
//! - **program**: 16-word write buffers from [`PROGRAM_PATH`]
//! - **erase**: chip erase with sentinel polling
//!
//! The engine never talks to the operator directly. Progress, erase
//! readbacks and cancel sampling all go through a [`TransferObserver`].

use core::fmt;

use embedded_io::{Read, ReadExactError, Write};

use crate::error::{Error, Result};
use crate::gpio::Gpio;
use crate::nor::{NorFlash, FLASH_WORDS, WRITE_BUFFER_WORDS};
use crate::poll::{PollObserver, PollOutcome};
use crate::storage::{OpenMode, Storage, StorageFile, DUMP_PATH, PROGRAM_PATH};

/// Addresses between progress reports and cancel checks
pub const PROGRESS_INTERVAL: u32 = 0x1000;

const MS_PER_MINUTE: u64 = 60_000;

/// Millisecond time source
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin
    fn millis(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn millis(&self) -> u64 {
        (**self).millis()
    }
}

/// Half-open word address range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRange {
    /// First word address
    pub start: u32,
    /// One past the last word address
    pub end: u32,
}

impl TransferRange {
    /// The whole chip
    pub const fn full() -> Self {
        Self {
            start: 0,
            end: FLASH_WORDS,
        }
    }

    /// `len` words starting at `start`
    ///
    /// # Errors
    /// * `AddressOutOfBounds` - empty, or not contained in the chip
    pub fn new(start: u32, len: u32) -> Result<Self> {
        let end = start.checked_add(len).ok_or(Error::AddressOutOfBounds)?;
        if len == 0 || end > FLASH_WORDS {
            return Err(Error::AddressOutOfBounds);
        }
        Ok(Self { start, end })
    }

    /// Number of words in the range
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Always false for ranges built through [`TransferRange::new`]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    fn is_buffer_aligned(&self) -> bool {
        let mask = WRITE_BUFFER_WORDS as u32 - 1;
        self.start & mask == 0 && self.len() & mask == 0
    }
}

impl Default for TransferRange {
    fn default() -> Self {
        Self::full()
    }
}

/// Estimated time to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Eta {
    millis: u64,
}

impl Eta {
    /// Linear extrapolation: `(total - done) * elapsed / done`
    ///
    /// Returns `None` before any work has been done.
    pub fn estimate(total: u32, done: u32, elapsed_ms: u64) -> Option<Self> {
        if done == 0 {
            return None;
        }
        let remaining = u64::from(total.saturating_sub(done));
        Some(Self {
            millis: remaining * elapsed_ms / u64::from(done),
        })
    }

    /// Remaining time in milliseconds
    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    /// Whole minutes remaining
    pub fn minutes(&self) -> u64 {
        self.millis / MS_PER_MINUTE
    }

    /// Seconds past the whole minutes, always below 60
    pub fn seconds(&self) -> u64 {
        self.millis % MS_PER_MINUTE / 1000
    }
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes(), self.seconds())
    }
}

/// Periodic progress of a dump or program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressReport {
    /// Next address to be transferred
    pub address: u32,
    /// Words transferred so far
    pub done: u32,
    /// Words in the whole range
    pub total: u32,
    /// Time left at the current rate
    pub eta: Option<Eta>,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X} ETA: ", self.address / PROGRESS_INTERVAL)?;
        match self.eta {
            Some(eta) => write!(f, "{}", eta),
            None => write!(f, "-:--"),
        }
    }
}

/// Bulk operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Flash to storage
    Dump,
    /// Storage to flash
    Program,
    /// Chip erase
    Erase,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dump => write!(f, "dump"),
            Self::Program => write!(f, "program"),
            Self::Erase => write!(f, "erase"),
        }
    }
}

/// How a bulk operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Ran to the end of the range (or the chip reported erased)
    Completed,
    /// Stopped on an operator cancel
    Cancelled,
}

/// Summary of a finished operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Completion or cancel
    pub status: TransferStatus,
    /// Words read or programmed
    pub words: u32,
    /// Wall time spent in the operation
    pub elapsed_ms: u64,
}

impl TransferOutcome {
    /// True if the operation stopped on a cancel
    pub fn is_cancelled(&self) -> bool {
        self.status == TransferStatus::Cancelled
    }
}

/// Reporting and cancel sampling for bulk operations
pub trait TransferObserver {
    /// Consume one pending operator byte and return true if it asks to cancel
    fn cancel_requested(&mut self) -> bool;

    /// Check for a pending cancel without consuming it
    ///
    /// Used inside completion polling so that the following per-block check
    /// still sees the request.
    fn cancel_pending(&mut self) -> bool {
        self.cancel_requested()
    }

    /// An operation is starting
    fn started(&mut self, _operation: Operation, _range: &TransferRange) {}

    /// Emitted every [`PROGRESS_INTERVAL`] addresses
    fn progress(&mut self, _report: &ProgressReport) {}

    /// Sentinel readback during chip erase
    fn erase_poll(&mut self, _value: u16) {}

    /// An operation ended without a storage error
    fn finished(&mut self, _operation: Operation, _outcome: &TransferOutcome) {}
}

impl<O: TransferObserver + ?Sized> TransferObserver for &mut O {
    fn cancel_requested(&mut self) -> bool {
        (**self).cancel_requested()
    }

    fn cancel_pending(&mut self) -> bool {
        (**self).cancel_pending()
    }

    fn started(&mut self, operation: Operation, range: &TransferRange) {
        (**self).started(operation, range)
    }

    fn progress(&mut self, report: &ProgressReport) {
        (**self).progress(report)
    }

    fn erase_poll(&mut self, value: u16) {
        (**self).erase_poll(value)
    }

    fn finished(&mut self, operation: Operation, outcome: &TransferOutcome) {
        (**self).finished(operation, outcome)
    }
}

/// Observer that reports nothing and never cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl TransferObserver for NoProgress {
    fn cancel_requested(&mut self) -> bool {
        false
    }
}

/// Completion polling after a write buffer: peek, never consume
struct ProgramPoll<'o, O: ?Sized>(&'o mut O);

impl<O: TransferObserver + ?Sized> PollObserver for ProgramPoll<'_, O> {
    fn cancel_requested(&mut self) -> bool {
        self.0.cancel_pending()
    }
}

/// Chip erase polling: forward readbacks, consume cancel bytes
struct ErasePoll<'o, O: ?Sized>(&'o mut O);

impl<O: TransferObserver + ?Sized> PollObserver for ErasePoll<'_, O> {
    fn cancel_requested(&mut self) -> bool {
        self.0.cancel_requested()
    }

    fn erase_poll(&mut self, value: u16) {
        self.0.erase_poll(value)
    }
}

/// Runs dump, program and erase over a range of the chip
pub struct TransferEngine<'a, G, C> {
    flash: &'a mut NorFlash<G>,
    clock: &'a C,
    range: TransferRange,
}

impl<'a, G: Gpio, C: Clock> TransferEngine<'a, G, C> {
    /// Engine over the whole chip
    pub fn new(flash: &'a mut NorFlash<G>, clock: &'a C) -> Self {
        Self {
            flash,
            clock,
            range: TransferRange::full(),
        }
    }

    /// Restrict dump and program to `range`
    pub fn with_range(mut self, range: TransferRange) -> Self {
        self.range = range;
        self
    }

    /// Range used by dump and program
    pub fn range(&self) -> TransferRange {
        self.range
    }

    fn report(&self, address: u32, start_ms: u64) -> ProgressReport {
        let done = address - self.range.start;
        let total = self.range.len();
        ProgressReport {
            address,
            done,
            total,
            eta: Eta::estimate(total, done, self.clock.millis().saturating_sub(start_ms)),
        }
    }

    /// Read the range into [`DUMP_PATH`], two bytes per word, big-endian
    ///
    /// Cancel is sampled every [`PROGRESS_INTERVAL`] addresses; a cancelled
    /// dump keeps what was written so far. The file is closed on every path.
    ///
    /// # Errors
    /// * `StorageOpen` - the dump file could not be created
    /// * `StorageWrite` - writing or closing failed
    pub fn dump<S, O>(&mut self, storage: &mut S, observer: &mut O) -> Result<TransferOutcome>
    where
        S: Storage + ?Sized,
        O: TransferObserver + ?Sized,
    {
        let mut file = storage.open(DUMP_PATH, OpenMode::Write)?;
        log::info!(
            "transfer: dump 0x{:06X}..0x{:06X} to {}",
            self.range.start,
            self.range.end,
            DUMP_PATH
        );
        observer.started(Operation::Dump, &self.range);

        let result = self.dump_words(&mut file, observer);
        let closed = file.close();
        let outcome = result?;
        closed?;

        observer.finished(Operation::Dump, &outcome);
        Ok(outcome)
    }

    fn dump_words<F, O>(&mut self, file: &mut F, observer: &mut O) -> Result<TransferOutcome>
    where
        F: Write + ?Sized,
        O: TransferObserver + ?Sized,
    {
        let start_ms = self.clock.millis();
        let mut status = TransferStatus::Completed;
        let mut addr = self.range.start;

        while addr < self.range.end {
            let word = self.flash.read_at(addr);
            file.write_all(&word.to_be_bytes()).map_err(|_| Error::StorageWrite)?;
            addr += 1;

            if addr % PROGRESS_INTERVAL == 0 {
                observer.progress(&self.report(addr, start_ms));
                if observer.cancel_requested() {
                    log::info!("transfer: dump cancelled at 0x{:06X}", addr);
                    status = TransferStatus::Cancelled;
                    break;
                }
            }
        }

        Ok(TransferOutcome {
            status,
            words: addr - self.range.start,
            elapsed_ms: self.clock.millis().saturating_sub(start_ms),
        })
    }

    /// Program [`PROGRAM_PATH`] into the range, 16 words per write buffer
    ///
    /// The chip must have been erased beforehand; programming can only clear
    /// bits. Completion polling peeks for a cancel, and a consuming check
    /// follows every block. The file is closed on every path.
    ///
    /// # Errors
    /// * `InvalidAlignment` - range start or length not a multiple of 16
    /// * `StorageOpen` - the image could not be opened
    /// * `UnexpectedEof` - the image is shorter than the range
    /// * `StorageRead` - reading the image failed
    pub fn program<S, O>(&mut self, storage: &mut S, observer: &mut O) -> Result<TransferOutcome>
    where
        S: Storage + ?Sized,
        O: TransferObserver + ?Sized,
    {
        if !self.range.is_buffer_aligned() {
            return Err(Error::InvalidAlignment);
        }

        let mut file = storage.open(PROGRAM_PATH, OpenMode::Read)?;
        log::info!(
            "transfer: program 0x{:06X}..0x{:06X} from {}",
            self.range.start,
            self.range.end,
            PROGRAM_PATH
        );
        observer.started(Operation::Program, &self.range);

        let result = self.program_blocks(&mut file, observer);
        let closed = file.close();
        let outcome = result?;
        closed?;

        observer.finished(Operation::Program, &outcome);
        Ok(outcome)
    }

    fn program_blocks<F, O>(&mut self, file: &mut F, observer: &mut O) -> Result<TransferOutcome>
    where
        F: Read + ?Sized,
        O: TransferObserver + ?Sized,
    {
        let start_ms = self.clock.millis();
        let mut status = TransferStatus::Completed;
        let mut addr = self.range.start;
        let mut bytes = [0u8; WRITE_BUFFER_WORDS * 2];

        while addr < self.range.end {
            file.read_exact(&mut bytes).map_err(|e| match e {
                ReadExactError::UnexpectedEof => Error::UnexpectedEof,
                ReadExactError::Other(_) => Error::StorageRead,
            })?;
            let words: [u16; WRITE_BUFFER_WORDS] =
                core::array::from_fn(|i| u16::from_be_bytes([bytes[2 * i], bytes[2 * i + 1]]));

            let last = self.flash.write_buffer(addr, &words);
            let expected = words[WRITE_BUFFER_WORDS - 1];
            let polled = self
                .flash
                .wait_for_data(last, expected, &mut ProgramPoll(&mut *observer));
            addr += WRITE_BUFFER_WORDS as u32;

            if addr % PROGRESS_INTERVAL == 0 {
                observer.progress(&self.report(addr, start_ms));
            }
            // Always consume, so a cancel seen by the poll is not left behind
            let cancel = observer.cancel_requested();
            if cancel || polled == PollOutcome::Cancelled {
                log::info!("transfer: program cancelled at 0x{:06X}", addr);
                status = TransferStatus::Cancelled;
                break;
            }
        }

        Ok(TransferOutcome {
            status,
            words: addr - self.range.start,
            elapsed_ms: self.clock.millis().saturating_sub(start_ms),
        })
    }

    /// Erase the whole chip, reporting every sentinel readback
    ///
    /// Erase ignores the configured range: the chip only supports erasing
    /// everything.
    pub fn erase<O>(&mut self, observer: &mut O) -> TransferOutcome
    where
        O: TransferObserver + ?Sized,
    {
        let full = TransferRange::full();
        observer.started(Operation::Erase, &full);
        let start_ms = self.clock.millis();

        let status = match self.flash.chip_erase(&mut ErasePoll(&mut *observer)) {
            PollOutcome::Complete => TransferStatus::Completed,
            PollOutcome::Cancelled => TransferStatus::Cancelled,
        };
        let outcome = TransferOutcome {
            status,
            words: match status {
                TransferStatus::Completed => full.len(),
                TransferStatus::Cancelled => 0,
            },
            elapsed_ms: self.clock.millis().saturating_sub(start_ms),
        };

        observer.finished(Operation::Erase, &outcome);
        outcome
    }
}
