//! Linear reader for a single log file.
//!
//! The degenerate case of the rotation-aware reader: one file, no directory
//! discovery, no held line. Rotation of the underlying file is caught by the
//! driver's line-count comparison (see [`crate::driver`]), which relies on
//! the counters exposed here.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, trace};

/// Sequential line reader over one file, counting processed lines so the
/// driver can detect growth and truncation behind the open handle.
pub struct SingleFileReader {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    processed_lines: u64,
}

impl SingleFileReader {
    /// Open the file for reading from the beginning.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = Self {
            path: path.as_ref().to_path_buf(),
            reader: None,
            processed_lines: 0,
        };
        reader.reopen().await?;
        Ok(reader)
    }

    /// Close and reopen from the beginning, resetting the processed-line
    /// counter.
    pub async fn reopen(&mut self) -> Result<()> {
        let file = File::open(&self.path).await?;
        info!(file = %self.path.display(), "open log file");
        self.reader = Some(BufReader::new(file));
        self.processed_lines = 0;
        Ok(())
    }

    /// Read the next line, or `None` at the current end of file. More data
    /// appended later is picked up by subsequent calls on the same handle.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut buf = Vec::new();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        let line = String::from_utf8(buf)?;
        self.processed_lines += 1;
        trace!(line = %line, "raw log line");
        Ok(Some(line))
    }

    /// Count the lines currently in the file using a fresh handle, leaving
    /// the read position untouched.
    pub async fn line_count(&self) -> Result<u64> {
        let file = File::open(&self.path).await?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut count = 0u64;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Skip forward over lines that were already processed before a reopen.
    pub async fn skip(&mut self, lines: u64) -> Result<()> {
        trace!(lines, "skipping already processed lines");
        for _ in 0..lines {
            if self.next_line().await?.is_none() {
                break;
            }
        }
        Ok(())
    }

    pub fn processed_lines(&self) -> u64 {
        self.processed_lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the file handle. Idempotent.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            info!(file = %self.path.display(), "close log file");
        }
    }
}
