//! parflash-core - Protocol engine for bit-banged parallel NOR flash programming
//!
//! This crate drives a word-oriented parallel NOR flash chip (S29GL064N class)
//! through plain GPIO lines: a daisy-chain of three 8-bit shift registers
//! provides the address bus, sixteen bidirectional lines form the data bus and
//! three active-low lines (CE#, OE#, WE#) sequence the bus cycles. It is
//! designed to be `no_std` compatible so the same engine can run on a
//! microcontroller or on a Linux host with GPIO access.
//!
//! # Layers
//!
//! - [`address::AddressBus`] - serializes addresses into the shift register chain
//! - [`data::DataBus`] - drives and samples the 16-bit data bus in either pin order
//! - [`nor::NorFlash`] - bus cycles and the chip's command sequences
//! - [`transfer::TransferEngine`] - dump, program and erase of the whole chip
//! - [`host::Console`] - single-byte operator command loop
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), TOML
//!   hardware configuration files
//! - `alloc` - Enable heap allocation (boxed GPIO backends)
//!
//! # Example
//!
//! ```ignore
//! use parflash_core::config::HardwareConfig;
//! use parflash_core::nor::NorFlash;
//!
//! fn first_word<G: parflash_core::gpio::Gpio>(gpio: G) -> parflash_core::Result<u16> {
//!     let mut flash = NorFlash::new(gpio, &HardwareConfig::default())?;
//!     flash.init();
//!     Ok(flash.read_at(0))
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod address;
pub mod config;
pub mod data;
pub mod error;
pub mod gpio;
pub mod host;
pub mod nor;
pub mod poll;
pub mod storage;
pub mod transfer;

pub use error::{Error, Result};
