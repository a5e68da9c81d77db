//! Byte sinks a destination appends encoded lines to.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::rotation::RollingFile;

/// Receives whole encoded lines.
///
/// `write_line` must append the line as one unit: concurrent callers may
/// interleave lines, never parts of lines.
pub trait LineWriter: Send + Sync {
    fn write_line(&self, line: &[u8]) -> io::Result<()>;

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    /// Human readable name used when reporting write failures
    fn describe(&self) -> String;
}

impl LineWriter for RollingFile {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        RollingFile::write_line(self, line)
    }

    fn flush(&self) -> io::Result<()> {
        RollingFile::flush(self)
    }

    fn describe(&self) -> String {
        self.path().display().to_string()
    }
}

/// Process standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutWriter;

impl LineWriter for StdoutWriter {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        io::stdout().lock().write_all(line)
    }

    fn flush(&self) -> io::Result<()> {
        io::stdout().lock().flush()
    }

    fn describe(&self) -> String {
        "stdout".to_string()
    }
}

/// In-memory sink, handy for tests and for embedding the pipeline
#[derive(Debug, Default, Clone)]
pub struct MemoryWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buffer).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl LineWriter for MemoryWriter {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(line);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
