//! Completion polling
//!
//! The chip signals the end of an embedded program or erase algorithm only
//! through what it returns on reads. The convergence tests here are pure
//! predicates; everything with side effects (cancel sampling, reporting) is
//! supplied by the caller through [`PollObserver`].

/// Value of an erased word
pub const ERASED_WORD: u16 = 0xFFFF;

/// Result of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The chip reported completion
    Complete,
    /// The observer requested cancellation before completion
    Cancelled,
}

/// Hooks evaluated once per polling iteration
pub trait PollObserver {
    /// Return true to abandon the wait
    fn cancel_requested(&mut self) -> bool;

    /// Called with every sentinel readback while waiting for chip erase
    fn erase_poll(&mut self, _value: u16) {}
}

/// Data polling: the last programmed word reads back as written once done
#[inline]
pub fn program_complete(read: u16, expected: u16) -> bool {
    read == expected
}

/// Chip erase is done once the sentinel word reads as erased
#[inline]
pub fn erase_complete(read: u16) -> bool {
    read == ERASED_WORD
}

/// Observer that never cancels and ignores readbacks
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl PollObserver for NeverCancel {
    fn cancel_requested(&mut self) -> bool {
        false
    }
}
