//! Error types for parflash-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.
//!
//! The flash protocol itself has no failure signal: a chip that never finishes
//! an embedded algorithm is indistinguishable from a slow one, so
//! non-convergence is not an error here. Only storage and configuration
//! problems are.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Storage errors
    /// Storage backend could not open the requested file
    StorageOpen,
    /// Reading from a storage file failed
    StorageRead,
    /// Writing to a storage file failed
    StorageWrite,
    /// Program source ended before the requested range was covered
    UnexpectedEof,

    // Configuration errors
    /// Data pin tables are not permutations of the same 16 pins
    InvalidPinMapping,
    /// Hardware configuration could not be loaded
    ConfigError,

    // Address errors
    /// Address range is empty or extends beyond the chip
    AddressOutOfBounds,
    /// Range is not aligned to the write buffer size
    InvalidAlignment,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageOpen => write!(f, "cannot open storage file"),
            Self::StorageRead => write!(f, "storage read failed"),
            Self::StorageWrite => write!(f, "storage write failed"),
            Self::UnexpectedEof => write!(f, "program source is shorter than the target range"),
            Self::InvalidPinMapping => {
                write!(f, "data pin tables must be permutations of the same 16 pins")
            }
            Self::ConfigError => write!(f, "invalid hardware configuration"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
            Self::InvalidAlignment => write!(f, "invalid alignment"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
