//! UI Transcript
//!
//! Appends everything the output view shows to a file, with a header line
//! per step run, so the session can be reviewed after the UI is gone.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use log::warn;

use crate::error::RunError;

/// Append-only log of step output.
#[derive(Debug)]
pub struct Transcript {
    path: PathBuf,
    file: File,
}

impl Transcript {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn begin_step(&mut self, index: usize, total: usize, name: &str) {
        let header = format!(
            "\n=== {} step {}/{}: {} ===\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            index + 1,
            total,
            name
        );
        self.write(header.as_bytes());
    }

    pub fn output(&mut self, data: &[u8]) {
        self.write(data);
    }

    pub fn end_step(&mut self, result: &Result<(), RunError>) {
        let footer = match result {
            Ok(()) => "=== finished successfully ===\n".to_string(),
            Err(e) => format!("=== finished with error: {} ===\n", e),
        };
        self.write(footer.as_bytes());
    }

    fn write(&mut self, data: &[u8]) {
        if let Err(e) = self.file.write_all(data) {
            warn!("Failed to write transcript {}: {}", self.path.display(), e);
        }
    }
}
