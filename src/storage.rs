//! Directory-backed storage
//!
//! A host directory stands in for the SD card: `/sdrom.bin` and
//! `/newrom.bin` resolve to files directly below it.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read as _, Write as _};
use std::path::{Path, PathBuf};

use embedded_io::{ErrorKind, ErrorType, Read, Write};
use parflash_core::host::STORAGE_UNAVAILABLE;
use parflash_core::storage::{OpenMode, Storage, StorageFile};
use thiserror::Error;

/// Errors of the directory-backed storage
#[derive(Debug, Error)]
pub enum FsError {
    /// The storage root does not exist
    #[error("{}: {} is not a directory", STORAGE_UNAVAILABLE, .0.display())]
    NotMounted(PathBuf),

    /// I/O on a file failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Read on a file opened for writing, or the reverse
    #[error("{} is not open for {op}", .path.display())]
    WrongMode { path: PathBuf, op: &'static str },
}

impl embedded_io::Error for FsError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotMounted(_) => ErrorKind::NotFound,
            Self::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
                std::io::ErrorKind::Interrupted => ErrorKind::Interrupted,
                _ => ErrorKind::Other,
            },
            Self::WrongMode { .. } => ErrorKind::Unsupported,
        }
    }
}

/// Storage rooted at a host directory
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Use `root` as the card root; it must already exist
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FsError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(FsError::NotMounted(root));
        }
        Ok(Self { root })
    }

    /// Host path of a storage path
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Storage for DirStorage {
    type File = FsFile;

    fn open(&mut self, path: &str, mode: OpenMode) -> parflash_core::Result<FsFile> {
        let host_path = self.resolve(path);
        let file = match mode {
            OpenMode::Read => File::open(&host_path),
            OpenMode::Write => File::create(&host_path),
        };
        let file = file.map_err(|e| {
            log::error!("storage: cannot open {}: {}", host_path.display(), e);
            parflash_core::Error::StorageOpen
        })?;
        log::debug!("storage: opened {} ({:?})", host_path.display(), mode);

        let handle = match mode {
            OpenMode::Read => Handle::Reader(BufReader::new(file)),
            OpenMode::Write => Handle::Writer(BufWriter::new(file)),
        };
        Ok(FsFile {
            path: host_path,
            handle,
        })
    }
}

enum Handle {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

/// Open file of a [`DirStorage`], buffered in its direction
pub struct FsFile {
    path: PathBuf,
    handle: Handle,
}

impl FsFile {
    fn io_error(&self, source: std::io::Error) -> FsError {
        FsError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn wrong_mode(&self, op: &'static str) -> FsError {
        FsError::WrongMode {
            path: self.path.clone(),
            op,
        }
    }

    /// Host path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ErrorType for FsFile {
    type Error = FsError;
}

impl Read for FsFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        let Handle::Reader(reader) = &mut self.handle else {
            return Err(self.wrong_mode("reading"));
        };
        let result = reader.read(buf);
        result.map_err(|e| self.io_error(e))
    }
}

impl Write for FsFile {
    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        let Handle::Writer(writer) = &mut self.handle else {
            return Err(self.wrong_mode("writing"));
        };
        let result = writer.write(buf);
        result.map_err(|e| self.io_error(e))
    }

    fn flush(&mut self) -> Result<(), FsError> {
        let result = match &mut self.handle {
            Handle::Writer(writer) => writer.flush(),
            Handle::Reader(_) => Ok(()),
        };
        result.map_err(|e| self.io_error(e))
    }
}

impl StorageFile for FsFile {
    fn close(mut self) -> parflash_core::Result<()> {
        Write::flush(&mut self).map_err(|e| {
            log::error!("storage: {}", e);
            parflash_core::Error::StorageWrite
        })?;
        if let Handle::Writer(writer) = &self.handle {
            writer.get_ref().sync_all().map_err(|e| {
                log::error!("storage: cannot sync {}: {}", self.path.display(), e);
                parflash_core::Error::StorageWrite
            })?;
        }
        log::debug!("storage: closed {}", self.path.display());
        Ok(())
    }
}
