//! Interactive console command
//!
//! Runs the single-key command loop of the board firmware against the
//! terminal: `d` dumps, `e` erases, `p` programs and `c` cancels the running
//! operation. Any other key prints the usage text.

use std::path::Path;
use std::thread;
use std::time::Duration;

use parflash_core::gpio::Gpio;
use parflash_core::host::{Console, HostChannel, IDLE_POLL_MS, STORAGE_UNAVAILABLE, USAGE};
use parflash_core::nor::NorFlash;
use parflash_core::storage::Storage;
use parflash_core::transfer::{Clock, TransferRange};

use crate::host::{StdinChannel, SystemClock};
use crate::storage::DirStorage;

/// Interval between attempts to reach the storage root
const STORAGE_RETRY: Duration = Duration::from_secs(10);

/// Run the console until stdin is closed
pub fn run_console<G: Gpio>(
    flash: NorFlash<G>,
    storage_root: &Path,
    range: TransferRange,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut host = StdinChannel::spawn()?;
    let Some(storage) = wait_for_storage(&mut host, storage_root) else {
        return Ok(());
    };

    let mut console = Console::new(flash, storage, SystemClock::new()).with_range(range);
    host.println(USAGE);

    serve(&mut console, &mut host);
    log::info!("console: input closed, leaving");
    Ok(())
}

/// Run commands as bytes arrive until `host` is closed
///
/// The idle wait happens on the channel, so a key is handled as soon as it
/// is typed.
fn serve<G, S, C>(console: &mut Console<G, S, C>, host: &mut StdinChannel)
where
    G: Gpio,
    S: Storage,
    C: Clock,
{
    let idle = Duration::from_millis(u64::from(IDLE_POLL_MS));
    while !host.is_closed() {
        if !host.wait_for_input(idle) {
            continue;
        }
        if let Some(byte) = host.read_byte() {
            let command = console.handle_byte(host, byte);
            log::debug!("console: {:?} finished", command);
        }
    }
}

/// Retry until the storage root appears, like a card being inserted
///
/// Returns `None` if stdin closes first.
fn wait_for_storage(host: &mut StdinChannel, root: &Path) -> Option<DirStorage> {
    loop {
        match DirStorage::new(root) {
            Ok(storage) => return Some(storage),
            Err(e) => {
                log::warn!("{}", e);
                host.println(STORAGE_UNAVAILABLE);
            }
        }
        thread::sleep(STORAGE_RETRY);
        host.peek_byte();
        if host.is_closed() {
            return None;
        }
    }
}
