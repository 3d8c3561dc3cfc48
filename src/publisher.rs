//! Downstream forwarding with an optional emission rate ceiling.

use crate::error::{Error, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

/// A finished record bound for the downstream channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Downstream channel name, derived from the source file.
    pub channel: String,
    pub payload: String,
}

/// Forwards finished records into the downstream channel, pacing emission
/// when a per-second ceiling is configured.
///
/// The channel itself is unbounded, so no backpressure flows back into the
/// reader; the ceiling is the only thing that slows publication down.
pub struct Publisher {
    channel: String,
    tx: mpsc::UnboundedSender<Result<Record>>,
    limiter: Option<RateLimiter>,
}

impl Publisher {
    /// `max_per_second` of `None` means unbounded.
    pub fn new(
        channel: impl Into<String>,
        tx: mpsc::UnboundedSender<Result<Record>>,
        max_per_second: Option<u32>,
    ) -> Self {
        Self {
            channel: channel.into(),
            tx,
            limiter: max_per_second.map(RateLimiter::new),
        }
    }

    /// Forward one record, waiting first if the ceiling for the current
    /// one-second window is exhausted. Fails when the consumer is gone.
    pub async fn publish(&mut self, payload: String) -> Result<()> {
        if let Some(limiter) = &mut self.limiter {
            limiter.acquire().await;
        }
        trace!(channel = %self.channel, "forwarding record");
        self.tx
            .send(Ok(Record {
                channel: self.channel.clone(),
                payload,
            }))
            .map_err(|_| Error::StreamClosed)
    }

    /// Report a fatal pipeline error to the consumer.
    pub fn publish_error(&self, err: Error) {
        let _ = self.tx.send(Err(err));
    }
}

/// Fixed one-second window: at most `max` permits per window, sleeping
/// until the window rolls over once they are spent.
struct RateLimiter {
    max: u32,
    window_start: Instant,
    used: u32,
}

impl RateLimiter {
    const WINDOW: Duration = Duration::from_secs(1);

    fn new(max: u32) -> Self {
        Self {
            max: max.max(1),
            window_start: Instant::now(),
            used: 0,
        }
    }

    async fn acquire(&mut self) {
        if self.window_start.elapsed() >= Self::WINDOW {
            self.window_start = Instant::now();
            self.used = 0;
        }
        if self.used >= self.max {
            tokio::time::sleep_until(self.window_start + Self::WINDOW).await;
            self.window_start = Instant::now();
            self.used = 0;
        }
        self.used += 1;
    }
}
