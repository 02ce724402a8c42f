//! Operator link over the process's stdin/stdout
//!
//! A reader thread forwards stdin bytes over a channel so that the
//! transfer engine can check for a cancel byte without blocking.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use parflash_core::host::HostChannel;
use parflash_core::transfer::Clock;

/// Non-blocking byte link fed by a background stdin reader
pub struct StdinChannel {
    rx: Receiver<u8>,
    pending: Option<u8>,
    closed: bool,
}

impl StdinChannel {
    /// Start the stdin reader thread
    ///
    /// Line endings are dropped: a terminal sends them after every key.
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stdin".into())
            .spawn(move || {
                for byte in io::stdin().lock().bytes() {
                    match byte {
                        Ok(b'\n' | b'\r') => continue,
                        Ok(b) => {
                            if tx.send(b).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            log::warn!("stdin: {}", e);
                            break;
                        }
                    }
                }
                log::debug!("stdin: closed");
            })?;
        Ok(Self::from_receiver(rx))
    }

    /// Channel over an existing byte source
    pub fn from_receiver(rx: Receiver<u8>) -> Self {
        Self {
            rx,
            pending: None,
            closed: false,
        }
    }

    /// Block until a byte is available or `timeout` expires
    pub fn wait_for_input(&mut self, timeout: Duration) -> bool {
        if self.pending.is_some() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(byte) => {
                self.pending = Some(byte);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                false
            }
        }
    }

    /// The input ended and every byte has been consumed
    pub fn is_closed(&self) -> bool {
        self.closed && self.pending.is_none()
    }

    fn fill(&mut self) {
        if self.pending.is_none() {
            match self.rx.try_recv() {
                Ok(byte) => self.pending = Some(byte),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }
    }
}

impl HostChannel for StdinChannel {
    fn read_byte(&mut self) -> Option<u8> {
        self.fill();
        self.pending.take()
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.fill();
        self.pending
    }

    fn print(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
            log::warn!("stdout: {}", e);
        }
    }
}

/// Milliseconds since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Clock starting at zero now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
