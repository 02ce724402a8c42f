//! parflash - parallel NOR flash programmer
//!
//! Dumps, erases and programs a 16-bit parallel NOR flash chip (S29GL064N
//! class) that sits behind a shift-register address bus and a bit-banged
//! data bus.
//!
//! # Architecture
//!
//! The protocol engine lives in `parflash-core` and talks to the board only
//! through the `Gpio` trait. This binary picks a backend at runtime:
//! - **dummy** - simulated board and chip, for trying things out
//! - **linux_gpio** - real hardware on a Linux gpiochip
//!
//! A host directory takes the place of the board's SD card.

mod cli;
mod commands;
mod host;
mod programmers;
mod storage;

use clap::Parser;
use cli::{Cli, Commands};
use parflash_core::config::HardwareConfig;
use std::path::Path;
use storage::DirStorage;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let wiring = match load_wiring(cli.config.as_deref()) {
        Ok(wiring) => wiring,
        Err(e) => {
            eprintln!("Failed to load board configuration: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Dump { transfer } => {
            let range = transfer.range()?;
            let mut storage = DirStorage::new(&transfer.storage)?;
            let mut flash = programmers::open_flash(&transfer.programmer, &wiring)?;
            commands::run_dump(&mut flash, &mut storage, range)
        }
        Commands::Program { transfer } => {
            let range = transfer.range()?;
            let mut storage = DirStorage::new(&transfer.storage)?;
            let mut flash = programmers::open_flash(&transfer.programmer, &wiring)?;
            commands::run_program(&mut flash, &mut storage, range)
        }
        Commands::Erase { programmer } => {
            let mut flash = programmers::open_flash(&programmer, &wiring)?;
            commands::run_erase(&mut flash)
        }
        Commands::Console { transfer } => {
            let range = transfer.range()?;
            let flash = programmers::open_flash(&transfer.programmer, &wiring)?;
            commands::run_console(flash, &transfer.storage, range)
        }
        Commands::Peek {
            programmer,
            address,
        } => {
            let mut flash = programmers::open_flash(&programmer, &wiring)?;
            commands::run_peek(&mut flash, address)
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    }
}

/// Load the board wiring from `path`, or use the reference board
fn load_wiring(path: Option<&Path>) -> Result<HardwareConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let wiring = HardwareConfig::from_toml_file(path)?;
            log::info!("Loaded board wiring from {}", path.display());
            Ok(wiring)
        }
        None => {
            log::debug!("Using reference board wiring");
            Ok(HardwareConfig::default())
        }
    }
}
