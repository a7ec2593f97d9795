//! File-backed sink for the `log` facade
//!
//! The TUI owns the terminal, so log lines only ever go to a file.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub struct TextLogger {
    file: Mutex<File>,
    level: LevelFilter,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P, level: LevelFilter) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .with_context(|| format!("opening log file {}", path.as_ref().display()))?;
        Ok(Self {
            file: Mutex::new(f),
            level,
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Log for TextLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("teleput")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.line(&format!("{:<5} {} {}", record.level(), record.target(), record.args()));
        }
    }

    fn flush(&self) {
        if let Ok(mut f) = self.file.lock() {
            let _ = f.flush();
        }
    }
}

/// Install a `TextLogger` as the global logger.
pub fn init<P: AsRef<Path>>(path: P, verbose: bool) -> Result<()> {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let logger = TextLogger::new(path, level)?;
    log::set_boxed_logger(Box::new(logger)).context("installing logger")?;
    log::set_max_level(level);
    Ok(())
}
