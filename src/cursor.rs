//! Byte-accurate sequential line reading over one open file.

use crate::error::{Error, Result};
use crate::file_info::FileInfo;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

/// Owns the open handle for the file currently being read and tracks the
/// byte offset reached by sequential reads.
///
/// `read_raw` returns a line even when the file ends without a trailing
/// newline; deciding whether such a line is safe to emit is the caller's
/// job (see the held-line logic in [`crate::rotation`]).
#[derive(Debug)]
pub(crate) struct ReadCursor {
    reader: BufReader<File>,
    offset: u64,
}

impl ReadCursor {
    pub(crate) async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            reader: BufReader::new(file),
            offset: 0,
        })
    }

    /// Offset just past the last byte consumed by `read_raw`.
    #[cfg(test)]
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next line and record its offsets in `info`.
    ///
    /// The line is returned without its terminator; the recorded `after`
    /// offset includes it. Returns `None` at physical end-of-file.
    pub(crate) async fn read_raw(&mut self, info: &mut FileInfo) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        self.offset += n as u64;
        info.update_position(self.offset);
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Ok(Some(String::from_utf8(buf)?))
    }

    /// Reposition before the next read.
    ///
    /// Fails with [`Error::PositionOutOfRange`] when the offset lies beyond
    /// the current file length: the recorded bookkeeping no longer matches
    /// the file on disk and the caller must reopen from scratch.
    pub(crate) async fn seek(&mut self, offset: u64) -> Result<()> {
        let length = self.reader.get_ref().metadata().await?.len();
        if offset > length {
            return Err(Error::PositionOutOfRange {
                requested: offset,
                length,
            });
        }
        self.reader.seek(SeekFrom::Start(offset)).await?;
        self.offset = offset;
        Ok(())
    }
}
