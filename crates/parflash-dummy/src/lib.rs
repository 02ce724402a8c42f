//! parflash-dummy - Simulated programmer board for testing
//!
//! This crate provides a pin-level emulation of the reference board: three
//! chained 74HC595 shift registers on the address bus and an S29GL064N-style
//! flash chip behind a scrambled data bus. It implements the same
//! [`Gpio`](parflash_core::gpio::Gpio) trait as the real backends, so the
//! whole protocol engine can run without hardware. In-memory storage, a
//! scripted host link and a manual clock complete the set of collaborators.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
mod board;
#[cfg(feature = "alloc")]
pub mod chip;
#[cfg(feature = "alloc")]
mod host;
#[cfg(feature = "alloc")]
mod storage;

#[cfg(feature = "alloc")]
pub use board::{SimBoard, SimConfig};
#[cfg(feature = "alloc")]
pub use host::{ManualClock, ScriptedHost};
#[cfg(feature = "alloc")]
pub use storage::{MemFile, MemStorage};
