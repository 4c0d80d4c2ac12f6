//! Scalar summary logging.
//!
//! A `SummaryWriter` appends `(step, tag, value)` triples as
//! tab-separated lines to an event file under a log directory. The
//! handle is constructed by the caller and passed into the training
//! loop; its flush/close lifecycle stays with the caller (dropping the
//! writer flushes the buffer).

use std::error::Error;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};

/// Append-only scalar event stream.
#[derive(Debug)]
pub struct SummaryWriter {
    out: BufWriter<File>,
}

impl SummaryWriter {
    /// Opens (or creates) `dir/events.tsv` for appending, creating the
    /// directory if needed.
    ///
    /// # Errors
    /// Fails if the directory or file cannot be created.
    pub fn create(dir: &str) -> Result<Self, Box<dyn Error>> {
        fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(format!("{}/events.tsv", dir))?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Appends one scalar event: `step <TAB> tag <TAB> value`.
    ///
    /// # Errors
    /// Fails on write errors.
    pub fn scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<(), Box<dyn Error>> {
        writeln!(self.out, "{}\t{}\t{}", step, tag, value)?;
        Ok(())
    }

    /// Flushes buffered events to disk.
    ///
    /// # Errors
    /// Fails on flush errors.
    pub fn flush(&mut self) -> Result<(), Box<dyn Error>> {
        self.out.flush()?;
        Ok(())
    }
}
