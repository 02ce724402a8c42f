//! Storage backend abstraction
//!
//! Bulk data lives on an external file store (an SD card on the reference
//! board). The engine only needs to open a file by path, stream bytes in or
//! out with `embedded-io`, and close it.

use embedded_io::{Read, Write};

use crate::error::Result;

/// Destination of a chip dump
pub const DUMP_PATH: &str = "/sdrom.bin";

/// Source image for programming
pub const PROGRAM_PATH: &str = "/newrom.bin";

/// How a storage file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read only
    Read,
    /// Create or truncate, write only
    Write,
}

/// An open file on the storage backend
pub trait StorageFile: Read + Write {
    /// Flush and release the file
    fn close(self) -> Result<()>;
}

/// A file store addressed by absolute paths
pub trait Storage {
    /// File handle type
    type File: StorageFile;

    /// Open `path`
    ///
    /// # Errors
    /// * `StorageOpen` - the file does not exist or cannot be created
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Self::File>;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    type File = S::File;

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Self::File> {
        (**self).open(path, mode)
    }
}
