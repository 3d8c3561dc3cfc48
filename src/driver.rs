//! Poll loop tying the reader, the extractor and the publisher together.

use crate::error::Result;
use crate::parser::RecordExtractor;
use crate::publisher::Publisher;
use crate::rotation::DirectoryReader;
use crate::tail::SingleFileReader;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Liveness and readiness flags shared with the embedding process.
///
/// `live` is set for the whole lifetime of the driver task; `ready` only
/// while the poll loop is actually consuming the source.
#[derive(Debug, Default)]
pub struct Health {
    live: AtomicBool,
    ready: AtomicBool,
}

impl Health {
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub(crate) fn set_live(&self, value: bool) {
        self.live.store(value, Ordering::SeqCst);
    }

    pub(crate) fn set_ready(&self, value: bool) {
        self.ready.store(value, Ordering::SeqCst);
    }
}

/// The two source flavors the driver can poll.
pub(crate) enum Source {
    File(SingleFileReader),
    Directory(DirectoryReader),
}

impl Source {
    async fn next_line(&mut self) -> Result<Option<String>> {
        match self {
            Source::File(reader) => reader.next_line().await,
            Source::Directory(reader) => reader.next_line().await,
        }
    }

    /// Look for new content after the source ran dry. Returns whether
    /// another read attempt is worthwhile.
    ///
    /// For a single file the check is a line-count comparison: more lines
    /// than processed means growth behind the handle (reopen and skip what
    /// was already emitted); fewer means truncation or replacement (reopen
    /// from the top).
    async fn replenish(&mut self) -> Result<bool> {
        match self {
            Source::File(reader) => {
                let total = reader.line_count().await?;
                let processed = reader.processed_lines();
                if total > processed {
                    debug!(total, processed, "file grew; reopening to catch up");
                    reader.reopen().await?;
                    reader.skip(processed).await?;
                    Ok(true)
                } else if total < processed {
                    info!(file = %reader.path().display(), total, processed,
                        "file shrank; reopening from the beginning");
                    reader.reopen().await?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Source::Directory(reader) => reader.refresh().await,
        }
    }

    fn close(&mut self) {
        match self {
            Source::File(reader) => reader.close(),
            Source::Directory(reader) => reader.close(),
        }
    }
}

/// Run the pipeline until shutdown or a fatal error. A fatal error is
/// forwarded to the consumer as the stream's final item.
///
/// Teardown runs in reverse construction order: readiness drops first, then
/// the source handle, then the publisher, and liveness last.
pub(crate) async fn run(
    mut source: Source,
    extractor: RecordExtractor,
    mut publisher: Publisher,
    poll_interval: Duration,
    health: Arc<Health>,
    mut shutdown: broadcast::Receiver<()>,
) {
    health.set_ready(true);
    let result = poll_loop(
        &mut source,
        &extractor,
        &mut publisher,
        poll_interval,
        &mut shutdown,
    )
    .await;

    health.set_ready(false);
    source.close();
    if let Err(err) = result {
        warn!(error = %err, "pipeline stopped on a fatal error");
        publisher.publish_error(err);
    }
    drop(publisher);
    health.set_live(false);
    info!("pipeline stopped");
}

async fn poll_loop(
    source: &mut Source,
    extractor: &RecordExtractor,
    publisher: &mut Publisher,
    poll_interval: Duration,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<()> {
    loop {
        match shutdown.try_recv() {
            Ok(()) | Err(broadcast::error::TryRecvError::Closed) => {
                info!("shutdown requested");
                return Ok(());
            }
            Err(_) => {}
        }

        match source.next_line().await {
            Ok(Some(line)) => {
                for payload in extractor.extract(&line) {
                    publisher.publish(payload).await?;
                }
            }
            Ok(None) => {
                let more = match source.replenish().await {
                    Ok(more) => more,
                    Err(err) if err.is_transient() => {
                        warn!(error = %err, "transient error while checking for new content");
                        false
                    }
                    Err(err) => return Err(err),
                };
                if !more {
                    tokio::select! {
                        _ = shutdown.recv() => {
                            info!("shutdown requested");
                            return Ok(());
                        }
                        _ = sleep(poll_interval) => {}
                    }
                }
            }
            Err(err) if err.is_transient() => {
                warn!(error = %err, "transient read error; retrying after the poll interval");
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("shutdown requested");
                        return Ok(());
                    }
                    _ = sleep(poll_interval) => {}
                }
            }
            Err(err) => return Err(err),
        }
    }
}
