//! Dump, program and erase from the command line

use parflash_core::gpio::Gpio;
use parflash_core::nor::NorFlash;
use parflash_core::storage::{DUMP_PATH, PROGRAM_PATH};
use parflash_core::transfer::{TransferEngine, TransferRange};

use super::progress::IndicatifProgress;
use crate::host::SystemClock;
use crate::storage::DirStorage;

/// Run the dump command
pub fn run_dump<G: Gpio>(
    flash: &mut NorFlash<G>,
    storage: &mut DirStorage,
    range: TransferRange,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = SystemClock::new();
    let mut progress = IndicatifProgress::new()?;

    let outcome = TransferEngine::new(flash, &clock)
        .with_range(range)
        .dump(storage, &mut progress)?;

    println!(
        "Wrote {} words ({} bytes) to {}",
        outcome.words,
        u64::from(outcome.words) * 2,
        storage.resolve(DUMP_PATH).display()
    );
    Ok(())
}

/// Run the program command
///
/// The target range must have been erased beforehand: programming can only
/// clear bits.
pub fn run_program<G: Gpio>(
    flash: &mut NorFlash<G>,
    storage: &mut DirStorage,
    range: TransferRange,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = SystemClock::new();
    let mut progress = IndicatifProgress::new()?;

    let result = TransferEngine::new(flash, &clock)
        .with_range(range)
        .program(storage, &mut progress);

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            // Leave the chip in read-array mode even if a buffer was half loaded
            flash.reset();
            return Err(e.into());
        }
    };

    println!(
        "Programmed {} words from {}",
        outcome.words,
        storage.resolve(PROGRAM_PATH).display()
    );
    Ok(())
}

/// Run the erase command
pub fn run_erase<G: Gpio>(flash: &mut NorFlash<G>) -> Result<(), Box<dyn std::error::Error>> {
    let clock = SystemClock::new();
    let mut progress = IndicatifProgress::new()?;

    let outcome = TransferEngine::new(flash, &clock).erase(&mut progress);

    println!(
        "Erase finished in {}.{:03} s",
        outcome.elapsed_ms / 1000,
        outcome.elapsed_ms % 1000
    );
    Ok(())
}
