//! CLI command implementations
//!
//! Every command works on a [`NorFlash`](parflash_core::nor::NorFlash) opened
//! through [`crate::programmers`], so the same code drives the simulated
//! board and real GPIO hardware.
//!
//! - `transfer` - dump, program and erase with a progress bar
//! - `console` - the interactive single-key loop
//! - `peek` - one word read for bring-up

mod console;
mod list;
mod peek;
mod progress;
mod transfer;

pub use console::run_console;
pub use list::list_programmers;
pub use peek::run_peek;
pub use transfer::{run_dump, run_erase, run_program};
