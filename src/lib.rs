//! Rotation-aware log tailing with pattern extraction.
//!
//! This crate follows a log source, either a single file or a directory of
//! rotating files, applies a regular expression to each line and streams
//! the extracted records to the consumer. Files in directory mode are
//! processed in modification-time order, appends and rewrites are detected
//! across polls, and a possibly-incomplete final line is withheld until it
//! is proven complete.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use log_tailer::{Config, RecordStream};
//!
//! #[tokio::main]
//! async fn main() -> log_tailer::Result<()> {
//!     let config = Config::from_file("config.json".as_ref()).await?;
//!     let mut stream = RecordStream::new(config).await?;
//!     while let Some(record) = stream.next().await {
//!         let record = record?;
//!         println!("{}: {}", record.channel, record.payload);
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod cursor;
mod driver;
mod error;
mod file_info;
mod parser;
mod publisher;
mod rotation;
mod scanner;
mod stream;
mod tail;
#[cfg(test)]
mod test_helpers;

pub use config::Config;
pub use driver::Health;
pub use error::{Error, Result};
pub use parser::RecordExtractor;
pub use publisher::Record;
pub use rotation::DirectoryReader;
pub use stream::RecordStream;
pub use tail::SingleFileReader;

/// Start tailing with the given configuration.
///
/// Convenience wrapper around [`RecordStream::new`].
pub async fn tail(config: Config) -> Result<RecordStream> {
    RecordStream::new(config).await
}
