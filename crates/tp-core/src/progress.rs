//! Rows-read / rows-inserted progress line.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Run-wide counters shared by the producer and the consumer.
///
/// Every `every` reads the line
/// `\rRead <n> rows - inserted <m> - now reading <file>` is redrawn on
/// stdout.
#[derive(Debug)]
pub struct Progress {
    read: AtomicU64,
    inserted: AtomicU64,
    every: u64,
    file: String,
    visible: bool,
}

impl Progress {
    pub fn stdout(every: u64) -> Self {
        Self::new(every, true)
    }

    /// Counts without printing.
    pub fn silent() -> Self {
        Self::new(u64::MAX, false)
    }

    fn new(every: u64, visible: bool) -> Self {
        Self {
            read: AtomicU64::new(0),
            inserted: AtomicU64::new(0),
            every: every.max(1),
            file: String::new(),
            visible,
        }
    }

    /// Name shown as the file being read.
    pub fn set_file(&mut self, file: impl Into<String>) {
        self.file = file.into();
    }

    pub fn record_read(&self) {
        let read = self.read.fetch_add(1, Ordering::Relaxed) + 1;
        if read % self.every == 0 {
            self.draw(false);
        }
    }

    pub fn record_inserted(&self, rows: u64) {
        self.inserted.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    pub fn inserted(&self) -> u64 {
        self.inserted.load(Ordering::Relaxed)
    }

    /// Final line for the current file.
    pub fn finish_file(&self) {
        self.draw(true);
    }

    pub fn line(&self) -> String {
        format!(
            "Read {} rows - inserted {} - now reading {}",
            self.read(),
            self.inserted(),
            self.file
        )
    }

    fn draw(&self, newline: bool) {
        if !self.visible {
            return;
        }
        let mut out = std::io::stdout().lock();
        let end = if newline { "\n" } else { "" };
        // progress output is best-effort
        let _ = write!(out, "\r{}{}", self.line(), end);
        let _ = out.flush();
    }
}
