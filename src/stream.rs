//! The public streaming surface over the tailing pipeline.

use crate::config::Config;
use crate::driver::{self, Health, Source};
use crate::error::{Error, Result};
use crate::parser::RecordExtractor;
use crate::publisher::{Publisher, Record};
use crate::rotation::DirectoryReader;
use crate::tail::SingleFileReader;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

/// A stream of extracted records from a tailed log source.
///
/// Construction validates the configuration, opens the source and spawns
/// the background pipeline; the stream then yields records until the source
/// fails fatally or the stream is dropped. Dropping the stream requests
/// shutdown, which tears the pipeline down in reverse construction order.
pub struct RecordStream {
    receiver: mpsc::UnboundedReceiver<Result<Record>>,
    health: Arc<Health>,
    shutdown_tx: broadcast::Sender<()>,
    _task_handle: JoinHandle<()>,
}

impl RecordStream {
    /// Start tailing with the given configuration.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let extractor = RecordExtractor::new(&config.regexp, config.regexp_groups.clone())?;

        let source = match (&config.log_file, &config.log_directory) {
            (Some(path), _) => Source::File(SingleFileReader::open(path).await?),
            (None, Some(dir)) => {
                let filter = config.file_filter.as_deref().ok_or_else(|| Error::Config {
                    message: "file-filter is required with log-directory".to_string(),
                })?;
                Source::Directory(DirectoryReader::new(dir, filter).await?)
            }
            (None, None) => unreachable!("rejected by validate"),
        };

        let (tx, receiver) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let publisher = Publisher::new(config.channel_name(), tx, config.max_records_per_second);

        let health = Arc::new(Health::default());
        health.set_live(true);
        info!(channel = %config.channel_name(), "starting tail pipeline");

        let task_handle = tokio::spawn(driver::run(
            source,
            extractor,
            publisher,
            config.poll_interval(),
            Arc::clone(&health),
            shutdown_rx,
        ));

        Ok(Self {
            receiver,
            health,
            shutdown_tx,
            _task_handle: task_handle,
        })
    }

    /// Liveness and readiness of the background pipeline.
    pub fn health(&self) -> Arc<Health> {
        Arc::clone(&self.health)
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Stream for RecordStream {
    type Item = Result<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
