//! Error types for the log tailer.

use thiserror::Error;

/// The main error type for tailer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors when listing directories or reading files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding errors when reading file content.
    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid match pattern or filename filter.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A recorded read position points past the end of the file, meaning the
    /// bookkeeping no longer matches the file on disk.
    #[error("Recorded position {requested} exceeds file length {length}")]
    PositionOutOfRange { requested: u64, length: u64 },

    /// The downstream consumer has been closed or dropped.
    #[error("Stream closed")]
    StreamClosed,
}

impl Error {
    /// Whether the error should be retried on the next poll instead of
    /// stopping the process.
    ///
    /// A file disappearing between stat and open, or a permission race, is
    /// routine during rotation. A stale position is recovered by reopening
    /// from scratch, so it is transient as well.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::Interrupted
            ),
            Error::PositionOutOfRange { .. } => true,
            _ => false,
        }
    }
}

/// A convenient Result type for tailer operations.
pub type Result<T> = std::result::Result<T, Error>;
