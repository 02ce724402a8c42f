//! Terminal progress display for bulk transfers

use indicatif::{ProgressBar, ProgressStyle};
use parflash_core::transfer::{
    Operation, ProgressReport, TransferObserver, TransferOutcome, TransferRange,
};

/// Progress bars for dump and program, a spinner for erase
///
/// Transfers started from the command line run to completion: this observer
/// never asks for a cancel.
pub struct IndicatifProgress {
    bar_style: ProgressStyle,
    spinner_style: ProgressStyle,
    bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            bar_style: ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} words ({msg})")?
                .progress_chars("#>-"),
            spinner_style: ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?,
            bar: None,
        })
    }
}

impl TransferObserver for IndicatifProgress {
    fn cancel_requested(&mut self) -> bool {
        false
    }

    fn started(&mut self, operation: Operation, range: &TransferRange) {
        let bar = match operation {
            Operation::Erase => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(self.spinner_style.clone());
                pb.set_message("Erasing...");
                pb
            }
            Operation::Dump | Operation::Program => {
                let pb = ProgressBar::new(u64::from(range.len()));
                pb.set_style(self.bar_style.clone());
                pb.set_message("ETA: -:--");
                pb
            }
        };
        log::info!(
            "{} of 0x{:06X}..0x{:06X} started",
            operation,
            range.start,
            range.end
        );
        self.bar = Some(bar);
    }

    fn progress(&mut self, report: &ProgressReport) {
        if let Some(bar) = &self.bar {
            bar.set_position(u64::from(report.done));
            bar.set_message(report.to_string());
        }
    }

    fn erase_poll(&mut self, value: u16) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("Erasing... 0xA5000: {:X}", value));
            bar.tick();
        }
    }

    fn finished(&mut self, operation: Operation, outcome: &TransferOutcome) {
        let Some(bar) = self.bar.take() else {
            return;
        };
        let message = match (operation, outcome.is_cancelled()) {
            (_, true) => "cancelled",
            (Operation::Erase, false) => "Erase done!",
            (Operation::Dump, false) => "Dump complete",
            (Operation::Program, false) => "Program complete",
        };
        if operation != Operation::Erase {
            bar.set_position(u64::from(outcome.words));
        }
        bar.finish_with_message(message);
        log::info!(
            "{} {} after {} words in {} ms",
            operation,
            message,
            outcome.words,
            outcome.elapsed_ms
        );
    }
}
