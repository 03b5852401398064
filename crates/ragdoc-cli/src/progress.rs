//! Progress reporting for multi-file commands

use std::io::{self, Write};

/// Single-line progress on stderr; silent for one item
pub struct ProgressReporter {
    total: usize,
    processed: usize,
    failed: usize,
}

impl ProgressReporter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            failed: 0,
        }
    }

    pub fn set_message(&self, msg: &str) {
        if self.total > 1 {
            eprint!("\r[{}/{}] {:<50}", self.processed + 1, self.total, msg);
            io::stderr().flush().ok();
        }
    }

    pub fn increment(&mut self) {
        self.processed += 1;
    }

    pub fn fail(&mut self) {
        self.failed += 1;
        self.processed += 1;
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn finish(&self) {
        if self.total > 1 {
            eprintln!(
                "\rDone ({}/{}, {} failed){:<30}",
                self.processed - self.failed,
                self.total,
                self.failed,
                ""
            );
        }
    }
}
