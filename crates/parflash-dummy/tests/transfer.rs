//! Dump, program and erase against the simulated board

use parflash_core::config::HardwareConfig;
use parflash_core::error::Error;
use parflash_core::host::{Command, Console, USAGE};
use parflash_core::nor::{opcodes, NorFlash};
use parflash_core::poll::ERASED_WORD;
use parflash_core::storage::{DUMP_PATH, PROGRAM_PATH};
use parflash_core::transfer::{
    NoProgress, Operation, ProgressReport, TransferEngine, TransferObserver, TransferOutcome,
    TransferRange, TransferStatus,
};
use parflash_dummy::{ManualClock, MemStorage, ScriptedHost, SimBoard, SimConfig};

fn flash(sim: SimConfig) -> NorFlash<SimBoard> {
    let config = HardwareConfig::default();
    let board = SimBoard::new(&config, sim).unwrap();
    let mut flash = NorFlash::new(board, &config).unwrap();
    flash.init();
    flash
}

fn small() -> SimConfig {
    SimConfig {
        words: 0x1_0000,
        program_busy_reads: 2,
        erase_busy_polls: 3,
    }
}

fn be_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Records everything and cancels on the n-th consuming check
#[derive(Default)]
struct Recorder {
    reports: Vec<ProgressReport>,
    polls: Vec<u16>,
    cancel_on: Option<usize>,
    checks: usize,
    started: Vec<Operation>,
    finished: Vec<(Operation, TransferOutcome)>,
}

impl Recorder {
    fn cancel_on(check: usize) -> Self {
        Self {
            cancel_on: Some(check),
            ..Self::default()
        }
    }
}

impl TransferObserver for Recorder {
    fn cancel_requested(&mut self) -> bool {
        self.checks += 1;
        self.cancel_on == Some(self.checks)
    }

    fn cancel_pending(&mut self) -> bool {
        false
    }

    fn started(&mut self, operation: Operation, _range: &TransferRange) {
        self.started.push(operation);
    }

    fn progress(&mut self, report: &ProgressReport) {
        self.reports.push(*report);
    }

    fn erase_poll(&mut self, value: u16) {
        self.polls.push(value);
    }

    fn finished(&mut self, operation: Operation, outcome: &TransferOutcome) {
        self.finished.push((operation, *outcome));
    }
}

#[test]
fn test_dump_pattern_big_endian() {
    let mut flash = flash(small());
    let pattern: Vec<u16> = (0..0x2000u32).map(|a| a as u16).collect();
    flash.gpio_mut().load(0, &pattern);

    let clock = ManualClock::new(1);
    let mut storage = MemStorage::new();
    let range = TransferRange::new(0, 0x2000).unwrap();
    let outcome = TransferEngine::new(&mut flash, &clock)
        .with_range(range)
        .dump(&mut storage, &mut NoProgress)
        .unwrap();

    assert_eq!(outcome.status, TransferStatus::Completed);
    assert_eq!(outcome.words, 0x2000);
    let file = storage.file(DUMP_PATH).unwrap();
    assert_eq!(file.len(), 2 * 0x2000);
    assert_eq!(file, be_bytes(&pattern));
    assert_eq!(&file[2..4], &[0x00, 0x01]);
    assert_eq!(&file[0x200..0x202], &[0x01, 0x00]);
}

#[test]
fn test_dump_offset_range() {
    let mut flash = flash(small());
    let pattern: Vec<u16> = (0..0x400u32).map(|a| 0xA000 | a as u16).collect();
    flash.gpio_mut().load(0x800, &pattern);

    let clock = ManualClock::new(1);
    let mut storage = MemStorage::new();
    TransferEngine::new(&mut flash, &clock)
        .with_range(TransferRange::new(0x800, 0x400).unwrap())
        .dump(&mut storage, &mut NoProgress)
        .unwrap();

    assert_eq!(storage.file(DUMP_PATH).unwrap(), be_bytes(&pattern));
}

#[test]
fn test_dump_progress_and_eta() {
    let mut flash = flash(small());
    let clock = ManualClock::new(1000);
    let mut storage = MemStorage::new();
    let mut recorder = Recorder::default();
    TransferEngine::new(&mut flash, &clock)
        .with_range(TransferRange::new(0, 0x3000).unwrap())
        .dump(&mut storage, &mut recorder)
        .unwrap();

    let addresses: Vec<u32> = recorder.reports.iter().map(|r| r.address).collect();
    assert_eq!(addresses, [0x1000, 0x2000, 0x3000]);
    let lines: Vec<String> = recorder.reports.iter().map(|r| r.to_string()).collect();
    assert_eq!(lines, ["1 ETA: 0:02", "2 ETA: 0:01", "3 ETA: 0:00"]);
    assert_eq!(recorder.started, [Operation::Dump]);
    assert_eq!(recorder.finished.len(), 1);
}

#[test]
fn test_program_then_dump_round_trips() {
    let mut flash = flash(small());
    let image: Vec<u8> = (0..0x2000u32).map(|i| (i * 7 + 3) as u8).collect();
    let mut storage = MemStorage::new();
    storage.insert(PROGRAM_PATH, image.clone());

    let clock = ManualClock::new(1);
    let range = TransferRange::new(0, 0x1000).unwrap();
    let outcome = TransferEngine::new(&mut flash, &clock)
        .with_range(range)
        .program(&mut storage, &mut NoProgress)
        .unwrap();
    assert_eq!(outcome.status, TransferStatus::Completed);
    assert_eq!(outcome.words, 0x1000);
    assert_eq!(flash.gpio().chip().programs(), 0x1000 / 16);

    TransferEngine::new(&mut flash, &clock)
        .with_range(range)
        .dump(&mut storage, &mut NoProgress)
        .unwrap();
    assert_eq!(storage.file(DUMP_PATH).unwrap(), image);
}

#[test]
fn test_program_progress_cadence() {
    let mut flash = flash(small());
    let mut storage = MemStorage::new();
    storage.insert(PROGRAM_PATH, vec![0u8; 0x4000]);

    let clock = ManualClock::new(1);
    let mut recorder = Recorder::default();
    TransferEngine::new(&mut flash, &clock)
        .with_range(TransferRange::new(0, 0x2000).unwrap())
        .program(&mut storage, &mut recorder)
        .unwrap();

    assert_eq!(recorder.reports.len(), 2);
    // One consuming check per 16-word block
    assert_eq!(recorder.checks, 0x2000 / 16);
}

#[test]
fn test_program_rejects_unaligned_range() {
    let mut flash = flash(small());
    let clock = ManualClock::new(1);
    let mut storage = MemStorage::new();
    let result = TransferEngine::new(&mut flash, &clock)
        .with_range(TransferRange::new(8, 16).unwrap())
        .program(&mut storage, &mut NoProgress);
    assert_eq!(result.unwrap_err(), Error::InvalidAlignment);
    assert_eq!(flash.gpio().write_cycles(), 0);
}

#[test]
fn test_program_short_image() {
    let mut flash = flash(small());
    let mut storage = MemStorage::new();
    storage.insert(PROGRAM_PATH, vec![0x55u8; 0x100]);

    let clock = ManualClock::new(1);
    let result = TransferEngine::new(&mut flash, &clock)
        .with_range(TransferRange::new(0, 0x1000).unwrap())
        .program(&mut storage, &mut NoProgress);
    assert_eq!(result.unwrap_err(), Error::UnexpectedEof);
    // Everything that was available got programmed
    assert_eq!(flash.gpio().chip().programs(), 0x100 / 32);
    assert_eq!(flash.gpio().word(0x7F), 0x5555);
    assert_eq!(flash.gpio().word(0x80), ERASED_WORD);
}

#[test]
fn test_cancel_mid_dump_keeps_partial_file() {
    let mut flash = flash(small());
    let clock = ManualClock::new(1);
    let mut storage = MemStorage::new();
    let mut recorder = Recorder::cancel_on(2);
    let outcome = TransferEngine::new(&mut flash, &clock)
        .with_range(TransferRange::new(0, 0x4000).unwrap())
        .dump(&mut storage, &mut recorder)
        .unwrap();

    let k = 0x2000;
    assert_eq!(outcome.status, TransferStatus::Cancelled);
    assert_eq!(outcome.words, k);
    assert_eq!(storage.file(DUMP_PATH).unwrap().len(), 2 * k as usize);
    assert_eq!(flash.gpio().read_cycles(), u64::from(k));
}

#[test]
fn test_dump_write_failure_still_closes() {
    let mut flash = flash(small());
    let clock = ManualClock::new(1);
    let mut storage = MemStorage::new().with_write_limit(100);
    let mut recorder = Recorder::default();
    let result = TransferEngine::new(&mut flash, &clock)
        .with_range(TransferRange::new(0, 0x1000).unwrap())
        .dump(&mut storage, &mut recorder);

    assert_eq!(result.unwrap_err(), Error::StorageWrite);
    assert_eq!(storage.file(DUMP_PATH).unwrap().len(), 100);
    assert!(recorder.finished.is_empty());
}

#[test]
fn test_erase_stops_on_erased_sentinel() {
    let mut flash = flash(small());
    flash.gpio_mut().load(0, &[0x0000; 0x100]);

    let clock = ManualClock::new(1);
    let mut recorder = Recorder::default();
    let outcome = TransferEngine::new(&mut flash, &clock).erase(&mut recorder);

    assert_eq!(outcome.status, TransferStatus::Completed);
    assert_eq!(recorder.polls.len(), 4);
    assert!(recorder.polls[..3].iter().all(|&v| v != ERASED_WORD));
    assert_eq!(recorder.polls[3], ERASED_WORD);
    assert_eq!(recorder.checks, 3);
    assert_eq!(flash.gpio().word(0), ERASED_WORD);
    // One 500 ms wait per poll
    assert!(flash.gpio().elapsed_us() >= 4 * 500_000);
}

#[test]
fn test_erase_cancel() {
    let mut flash = flash(SimConfig {
        erase_busy_polls: 100,
        ..small()
    });
    let clock = ManualClock::new(1);
    let mut recorder = Recorder::cancel_on(2);
    let outcome = TransferEngine::new(&mut flash, &clock).erase(&mut recorder);

    assert_eq!(outcome.status, TransferStatus::Cancelled);
    assert_eq!(recorder.polls.len(), 2);
    assert!(flash.gpio().chip().is_busy());
}

fn console(
    sim: SimConfig,
    storage: MemStorage,
    range: TransferRange,
) -> Console<SimBoard, MemStorage, ManualClock> {
    Console::new(flash(sim), storage, ManualClock::new(1000)).with_range(range)
}

#[test]
fn test_console_cancel_dump_then_accepts_commands() {
    let storage = MemStorage::new();
    let mut console = console(small(), storage.clone(), TransferRange::new(0, 0x4000).unwrap());
    // 'x' is consumed by the first check, 'c' by the second
    let mut host = ScriptedHost::new(b"dxc");

    assert_eq!(console.poll(&mut host), Some(Command::Dump));
    assert_eq!(storage.file(DUMP_PATH).unwrap().len(), 2 * 0x2000);
    let lines: Vec<&str> = host.lines().collect();
    assert_eq!(lines, ["1 ETA: 0:03", "2 ETA: 0:02", "cancelled", "done"]);

    assert_eq!(console.poll(&mut host), None);
    host.push(b"?");
    assert_eq!(console.poll(&mut host), Some(Command::Help));
    assert!(host.output().ends_with(&format!("{}\n", USAGE)));
}

#[test]
fn test_console_program_cancel_resets_chip() {
    let storage = MemStorage::new();
    storage.insert(PROGRAM_PATH, vec![0u8; 0x200]);
    let sim = SimConfig {
        program_busy_reads: 0,
        ..small()
    };
    let mut console = console(sim, storage, TransferRange::new(0, 0x100).unwrap());
    let mut host = ScriptedHost::new(b"pc");

    assert_eq!(console.poll(&mut host), Some(Command::Program));
    assert_eq!(host.output(), "cancelled\ndone\n");
    assert_eq!(host.pending(), 0);

    let (flash, _, _) = console.into_parts();
    let board = flash.gpio();
    assert_eq!(board.chip().programs(), 1);
    // 21 cycles for the first block, then the reset
    assert_eq!(board.write_cycles(), 22);
    assert_eq!(board.last_write(), Some((0, opcodes::RESET)));
    assert_eq!(board.chip().resets(), 1);
}

#[test]
fn test_console_program_cancel_while_busy_sends_reset() {
    let storage = MemStorage::new();
    storage.insert(PROGRAM_PATH, vec![0u8; 0x200]);
    let mut console = console(small(), storage, TransferRange::new(0, 0x100).unwrap());
    let mut host = ScriptedHost::new(b"pc");

    assert_eq!(console.poll(&mut host), Some(Command::Program));
    assert_eq!(host.output(), "cancelled\ndone\n");

    let (flash, _, _) = console.into_parts();
    let board = flash.gpio();
    assert_eq!(board.write_cycles(), 22);
    assert_eq!(board.last_write(), Some((0, opcodes::RESET)));
    // The chip ignores commands until its embedded algorithm finishes
    assert!(board.chip().is_busy());
    assert_eq!(board.chip().resets(), 0);
}

#[test]
fn test_console_erase_cancel_resets_chip() {
    let mut console = console(small(), MemStorage::new(), TransferRange::full());
    let mut host = ScriptedHost::new(b"ec");

    assert_eq!(console.poll(&mut host), Some(Command::Erase));
    let lines: Vec<&str> = host.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Erasing...");
    assert!(lines[1].starts_with("0xA5000: "));
    assert_eq!(lines[2], "cancelled");

    let (cancelled, _, _) = console.into_parts();
    let board = cancelled.gpio();
    // 6 erase command cycles, then the reset
    assert_eq!(board.write_cycles(), 7);
    assert_eq!(board.last_write(), Some((0, opcodes::RESET)));
    assert!(board.chip().is_busy());

    // Erase finished on the last busy poll: the reset is accepted
    let mut console = Console::new(
        flash(SimConfig {
            erase_busy_polls: 1,
            ..small()
        }),
        MemStorage::new(),
        ManualClock::new(1000),
    );
    let mut host = ScriptedHost::new(b"ec");
    assert_eq!(console.poll(&mut host), Some(Command::Erase));
    assert!(host.output().ends_with("cancelled\n"));

    let (flash, _, _) = console.into_parts();
    assert_eq!(flash.gpio().chip().resets(), 1);
    assert!(!flash.gpio().chip().is_busy());
    assert_eq!(flash.gpio().word(0x1234), ERASED_WORD);
}

#[test]
fn test_console_erase_text() {
    let mut console = console(small(), MemStorage::new(), TransferRange::full());
    let mut host = ScriptedHost::new(b"e");

    assert_eq!(console.poll(&mut host), Some(Command::Erase));
    let lines: Vec<&str> = host.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "Erasing...");
    assert!(lines[1..5].iter().all(|l| l.starts_with("0xA5000: ")));
    assert_eq!(lines[4], "0xA5000: FFFF");
    assert_eq!(lines[5], "Erase done!");
}

#[test]
fn test_console_storage_open_failures() {
    let mut console = console(small(), MemStorage::unavailable(), TransferRange::full());
    let mut host = ScriptedHost::new(b"dp");

    assert_eq!(console.poll(&mut host), Some(Command::Dump));
    assert_eq!(console.poll(&mut host), Some(Command::Program));
    assert_eq!(
        host.output(),
        "Cannot open /sdrom.bin for writing\nCannot open /newrom.bin for reading\n"
    );
    // Nothing was sent to the chip
    let (flash, _, _) = console.into_parts();
    assert_eq!(flash.gpio().write_cycles(), 0);
}

#[test]
fn test_console_short_image_reports_failure() {
    let storage = MemStorage::new();
    storage.insert(PROGRAM_PATH, vec![0u8; 0x10]);
    let mut console = console(small(), storage, TransferRange::full());
    let mut host = ScriptedHost::new(b"p");

    assert_eq!(console.poll(&mut host), Some(Command::Program));
    assert_eq!(
        host.output(),
        "program failed: program source is shorter than the target range\n"
    );
}
