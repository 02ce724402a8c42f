//! Operator command channel
//!
//! The programmer is driven by single bytes from a host link (a serial
//! console on the reference board): `d` dumps, `e` erases, `p` programs and
//! anything else prints [`USAGE`]. While an operation runs, a `c` on the same
//! link cancels it.

use core::fmt::Write as _;

use crate::error::Error;
use crate::gpio::Gpio;
use crate::nor::NorFlash;
use crate::storage::{Storage, DUMP_PATH, PROGRAM_PATH};
use crate::transfer::{
    Clock, Operation, ProgressReport, TransferEngine, TransferObserver, TransferOutcome,
    TransferRange, TransferStatus,
};

/// Byte that cancels a running operation
pub const CANCEL_BYTE: u8 = b'c';

/// Wait between polls of an idle host link
pub const IDLE_POLL_MS: u32 = 100;

/// Printed for any unrecognized command byte
pub const USAGE: &str = "press (d) to dump flash to sd/sdrom.bin\n\
press (e) to erase flash\n\
press (p) to program sd/newrom.bin to flash (MAKE SURE TO ERASE FIRST!)\n\
press (c) during any operation to cancel";

/// Printed by the storage adapter when the card cannot be mounted
pub const STORAGE_UNAVAILABLE: &str = "cannot connect to SD card";

/// Non-blocking byte link to the operator
pub trait HostChannel {
    /// Take the next pending byte, if any
    fn read_byte(&mut self) -> Option<u8>;

    /// Look at the next pending byte without taking it
    fn peek_byte(&mut self) -> Option<u8>;

    /// Send text to the operator
    fn print(&mut self, text: &str);

    /// Send a line of text
    fn println(&mut self, text: &str) {
        self.print(text);
        self.print("\n");
    }
}

impl<H: HostChannel + ?Sized> HostChannel for &mut H {
    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn peek_byte(&mut self) -> Option<u8> {
        (**self).peek_byte()
    }

    fn print(&mut self, text: &str) {
        (**self).print(text)
    }

    fn println(&mut self, text: &str) {
        (**self).println(text)
    }
}

/// Operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `d`: dump the chip to storage
    Dump,
    /// `e`: erase the whole chip
    Erase,
    /// `p`: program the chip from storage
    Program,
    /// Anything else
    Help,
}

impl Command {
    /// Decode a command byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'd' => Self::Dump,
            b'e' => Self::Erase,
            b'p' => Self::Program,
            _ => Self::Help,
        }
    }
}

/// Reports operations as the original serial text and samples `c` for cancel
pub struct HostObserver<'h, H: ?Sized> {
    host: &'h mut H,
}

impl<'h, H: HostChannel + ?Sized> HostObserver<'h, H> {
    /// Observer printing to `host`
    pub fn new(host: &'h mut H) -> Self {
        Self { host }
    }

    /// Print a formatted line, truncated to 80 characters
    fn line(&mut self, args: core::fmt::Arguments<'_>) {
        let mut text = heapless::String::<80>::new();
        // Overflow only truncates operator text
        let _ = text.write_fmt(args);
        self.host.println(&text);
    }
}

impl<H: HostChannel + ?Sized> TransferObserver for HostObserver<'_, H> {
    fn cancel_requested(&mut self) -> bool {
        self.host.read_byte() == Some(CANCEL_BYTE)
    }

    fn cancel_pending(&mut self) -> bool {
        self.host.peek_byte() == Some(CANCEL_BYTE)
    }

    fn started(&mut self, operation: Operation, _range: &TransferRange) {
        if operation == Operation::Erase {
            self.host.println("Erasing...");
        }
    }

    fn progress(&mut self, report: &ProgressReport) {
        self.line(format_args!("{}", report));
    }

    fn erase_poll(&mut self, value: u16) {
        self.line(format_args!("0xA5000: {:X}", value));
    }

    fn finished(&mut self, operation: Operation, outcome: &TransferOutcome) {
        if outcome.status == TransferStatus::Cancelled {
            self.host.println("cancelled");
        }
        match (operation, outcome.status) {
            (Operation::Erase, TransferStatus::Completed) => self.host.println("Erase done!"),
            (Operation::Erase, TransferStatus::Cancelled) => {}
            _ => self.host.println("done"),
        }
    }
}

/// Single-byte command loop over one flash chip and one storage backend
pub struct Console<G, S, C> {
    flash: NorFlash<G>,
    storage: S,
    clock: C,
    range: TransferRange,
}

impl<G: Gpio, S: Storage, C: Clock> Console<G, S, C> {
    /// Console over an initialized flash device
    pub fn new(flash: NorFlash<G>, storage: S, clock: C) -> Self {
        Self {
            flash,
            storage,
            clock,
            range: TransferRange::full(),
        }
    }

    /// Restrict dump and program to `range`
    pub fn with_range(mut self, range: TransferRange) -> Self {
        self.range = range;
        self
    }

    /// Access the flash device
    pub fn flash_mut(&mut self) -> &mut NorFlash<G> {
        &mut self.flash
    }

    /// Access the storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Tear down the console
    pub fn into_parts(self) -> (NorFlash<G>, S, C) {
        (self.flash, self.storage, self.clock)
    }

    /// Take one byte from `host` and run it, or idle briefly if none is pending
    pub fn poll<H: HostChannel + ?Sized>(&mut self, host: &mut H) -> Option<Command> {
        match host.read_byte() {
            Some(byte) => Some(self.handle_byte(host, byte)),
            None => {
                self.flash.gpio_mut().delay_ms(IDLE_POLL_MS);
                None
            }
        }
    }

    /// Run the command for `byte` to completion
    ///
    /// Always returns to the idle state: storage failures are reported to the
    /// operator and logged, never propagated.
    pub fn handle_byte<H: HostChannel + ?Sized>(&mut self, host: &mut H, byte: u8) -> Command {
        let command = Command::from_byte(byte);
        log::debug!("console: byte 0x{:02X} -> {:?}", byte, command);

        match command {
            Command::Dump => self.dump(host),
            Command::Program => self.program(host),
            Command::Erase => self.erase(host),
            Command::Help => host.println(USAGE),
        }
        command
    }

    fn dump<H: HostChannel + ?Sized>(&mut self, host: &mut H) {
        let mut observer = HostObserver::new(&mut *host);
        let result = TransferEngine::new(&mut self.flash, &self.clock)
            .with_range(self.range)
            .dump(&mut self.storage, &mut observer);

        match result {
            Ok(_) => {}
            Err(Error::StorageOpen) => {
                log::error!("console: cannot create {}", DUMP_PATH);
                host.println("Cannot open /sdrom.bin for writing");
            }
            Err(e) => report_failure(host, Operation::Dump, e),
        }
    }

    fn program<H: HostChannel + ?Sized>(&mut self, host: &mut H) {
        let mut observer = HostObserver::new(&mut *host);
        let result = TransferEngine::new(&mut self.flash, &self.clock)
            .with_range(self.range)
            .program(&mut self.storage, &mut observer);

        match result {
            Ok(outcome) if outcome.is_cancelled() => self.flash.reset(),
            Ok(_) => {}
            Err(Error::StorageOpen) => {
                log::error!("console: cannot open {}", PROGRAM_PATH);
                host.println("Cannot open /newrom.bin for reading");
            }
            Err(e) => {
                // A write buffer may have been left half loaded
                self.flash.reset();
                report_failure(host, Operation::Program, e);
            }
        }
    }

    fn erase<H: HostChannel + ?Sized>(&mut self, host: &mut H) {
        let mut observer = HostObserver::new(&mut *host);
        let outcome = TransferEngine::new(&mut self.flash, &self.clock).erase(&mut observer);
        if outcome.is_cancelled() {
            self.flash.reset();
        }
    }
}

fn report_failure<H: HostChannel + ?Sized>(host: &mut H, operation: Operation, error: Error) {
    log::error!("console: {} failed: {}", operation, error);
    let mut text = heapless::String::<80>::new();
    let _ = write!(text, "{} failed: {}", operation, error);
    host.println(&text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;

    #[derive(Default)]
    struct Script {
        input: heapless::Deque<u8, 16>,
        output: String,
    }

    impl HostChannel for Script {
        fn read_byte(&mut self) -> Option<u8> {
            self.input.pop_front()
        }

        fn peek_byte(&mut self) -> Option<u8> {
            self.input.front().copied()
        }

        fn print(&mut self, text: &str) {
            self.output.push_str(text);
        }
    }

    #[test]
    fn test_command_from_byte() {
        assert_eq!(Command::from_byte(b'd'), Command::Dump);
        assert_eq!(Command::from_byte(b'e'), Command::Erase);
        assert_eq!(Command::from_byte(b'p'), Command::Program);
        assert_eq!(Command::from_byte(b'c'), Command::Help);
        assert_eq!(Command::from_byte(b'D'), Command::Help);
        assert_eq!(Command::from_byte(b'\n'), Command::Help);
    }

    #[test]
    fn test_usage_lines() {
        let lines: std::vec::Vec<&str> = USAGE.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "press (d) to dump flash to sd/sdrom.bin");
        assert_eq!(lines[3], "press (c) during any operation to cancel");
    }

    #[test]
    fn test_cancel_peek_does_not_consume() {
        let mut host = Script::default();
        host.input.push_back(CANCEL_BYTE).unwrap();
        let mut observer = HostObserver::new(&mut host);

        assert!(observer.cancel_pending());
        assert!(observer.cancel_pending());
        assert!(observer.cancel_requested());
        assert!(!observer.cancel_pending());
        assert!(!observer.cancel_requested());
    }

    #[test]
    fn test_other_bytes_are_consumed_without_cancel() {
        let mut host = Script::default();
        host.input.push_back(b'x').unwrap();
        host.input.push_back(CANCEL_BYTE).unwrap();
        let mut observer = HostObserver::new(&mut host);

        assert!(!observer.cancel_pending());
        assert!(!observer.cancel_requested());
        assert!(observer.cancel_requested());
    }

    #[test]
    fn test_observer_text() {
        let mut host = Script::default();
        let mut observer = HostObserver::new(&mut host);
        let range = TransferRange::full();

        observer.started(Operation::Erase, &range);
        observer.erase_poll(0x1234);
        observer.erase_poll(0xFFFF);
        observer.finished(
            Operation::Erase,
            &TransferOutcome {
                status: TransferStatus::Completed,
                words: range.len(),
                elapsed_ms: 0,
            },
        );
        observer.finished(
            Operation::Dump,
            &TransferOutcome {
                status: TransferStatus::Cancelled,
                words: 0x1000,
                elapsed_ms: 0,
            },
        );

        assert_eq!(
            host.output,
            "Erasing...\n0xA5000: 1234\n0xA5000: FFFF\nErase done!\ncancelled\ndone\n"
        );
    }
}
