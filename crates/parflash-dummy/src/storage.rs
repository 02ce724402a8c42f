//! In-memory storage backend
//!
//! Files live in a shared map so that a test can keep a handle to the
//! storage, hand a clone to the engine, and inspect the result afterwards.
//! Written files become visible when they are closed.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use embedded_io::{ErrorKind, ErrorType, Read, Write};

use parflash_core::error::{Error, Result};
use parflash_core::storage::{OpenMode, Storage, StorageFile};

type Files = Rc<RefCell<BTreeMap<String, Vec<u8>>>>;

/// Map of paths to file contents
#[derive(Debug, Clone)]
pub struct MemStorage {
    files: Files,
    available: bool,
    write_limit: Option<usize>,
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStorage {
    /// Empty, mounted storage
    pub fn new() -> Self {
        Self {
            files: Rc::default(),
            available: true,
            write_limit: None,
        }
    }

    /// Storage on which every open fails, like a missing card
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Fail writes once a file holds `bytes` bytes
    pub fn with_write_limit(mut self, bytes: usize) -> Self {
        self.write_limit = Some(bytes);
        self
    }

    /// Create or replace a file
    pub fn insert(&self, path: &str, data: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(path.to_string(), data.into());
    }

    /// Contents of a closed file
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    /// Whether a file exists
    pub fn contains(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }
}

impl Storage for MemStorage {
    type File = MemFile;

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<MemFile> {
        if !self.available {
            return Err(Error::StorageOpen);
        }
        let data = match mode {
            OpenMode::Read => self.file(path).ok_or(Error::StorageOpen)?,
            OpenMode::Write => Vec::new(),
        };
        log::debug!("mem: open {} ({:?}, {} bytes)", path, mode, data.len());
        Ok(MemFile {
            files: Rc::clone(&self.files),
            path: path.to_string(),
            mode,
            data,
            pos: 0,
            write_limit: self.write_limit,
        })
    }
}

/// Open file of a [`MemStorage`]
#[derive(Debug)]
pub struct MemFile {
    files: Files,
    path: String,
    mode: OpenMode,
    data: Vec<u8>,
    pos: usize,
    write_limit: Option<usize>,
}

impl ErrorType for MemFile {
    type Error = ErrorKind;
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, ErrorKind> {
        if self.mode != OpenMode::Read {
            return Err(ErrorKind::Unsupported);
        }
        let available = &self.data[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, ErrorKind> {
        if self.mode != OpenMode::Write {
            return Err(ErrorKind::Unsupported);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let n = match self.write_limit {
            Some(limit) if self.data.len() >= limit => return Err(ErrorKind::Other),
            Some(limit) => buf.len().min(limit - self.data.len()),
            None => buf.len(),
        };
        self.data.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> core::result::Result<(), ErrorKind> {
        Ok(())
    }
}

impl StorageFile for MemFile {
    fn close(self) -> Result<()> {
        if self.mode == OpenMode::Write {
            log::debug!("mem: close {} ({} bytes)", self.path, self.data.len());
            self.files.borrow_mut().insert(self.path, self.data);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_file_visible_after_close() {
        let mut storage = MemStorage::new();
        let mut file = storage.open("/a.bin", OpenMode::Write).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        assert!(!storage.contains("/a.bin"));
        file.close().unwrap();
        assert_eq!(storage.file("/a.bin").unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_write_truncates() {
        let mut storage = MemStorage::new();
        storage.insert("/a.bin", [9u8; 8]);
        let file = storage.open("/a.bin", OpenMode::Write).unwrap();
        file.close().unwrap();
        assert_eq!(storage.file("/a.bin").unwrap().len(), 0);
    }

    #[test]
    fn test_read_missing_file() {
        let mut storage = MemStorage::new();
        assert_eq!(
            storage.open("/missing.bin", OpenMode::Read).unwrap_err(),
            Error::StorageOpen
        );
    }

    #[test]
    fn test_read_to_end() {
        let mut storage = MemStorage::new();
        storage.insert("/a.bin", [1u8, 2, 3, 4, 5]);
        let mut file = storage.open("/a.bin", OpenMode::Read).unwrap();
        let mut buf = [0u8; 4];
        file.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
        assert!(file.read_exact(&mut buf).is_err());
    }

    #[test]
    fn test_unavailable() {
        let mut storage = MemStorage::unavailable();
        assert!(storage.open("/a.bin", OpenMode::Write).is_err());
    }

    #[test]
    fn test_write_limit() {
        let mut storage = MemStorage::new().with_write_limit(3);
        let mut file = storage.open("/a.bin", OpenMode::Write).unwrap();
        assert_eq!(file.write(&[1, 2]).unwrap(), 2);
        assert_eq!(file.write(&[3, 4]).unwrap(), 1);
        assert!(file.write(&[5]).is_err());
    }
}
