//! Scripted operator link and a manual clock

use alloc::collections::VecDeque;
use alloc::string::String;
use core::cell::Cell;

use parflash_core::host::HostChannel;
use parflash_core::transfer::Clock;

/// Host channel fed from a byte script, capturing everything printed
#[derive(Debug, Default, Clone)]
pub struct ScriptedHost {
    input: VecDeque<u8>,
    output: String,
    reads: usize,
}

impl ScriptedHost {
    /// Host that will deliver `script` one byte at a time
    pub fn new(script: &[u8]) -> Self {
        Self {
            input: script.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Queue more input
    pub fn push(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Bytes not consumed yet
    pub fn pending(&self) -> usize {
        self.input.len()
    }

    /// Number of consuming reads, including empty ones
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Everything printed so far
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Printed lines
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }
}

impl HostChannel for ScriptedHost {
    fn read_byte(&mut self) -> Option<u8> {
        self.reads += 1;
        self.input.pop_front()
    }

    fn peek_byte(&mut self) -> Option<u8> {
        self.input.front().copied()
    }

    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }
}

/// Clock that advances by a fixed step every time it is read
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
    step: u64,
}

impl ManualClock {
    /// Clock at 0 advancing `step_ms` per reading
    pub fn new(step_ms: u64) -> Self {
        Self {
            now: Cell::new(0),
            step: step_ms,
        }
    }

    /// Move the clock forward
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}
