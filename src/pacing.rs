//! Submission pacing for the messaging gateway.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

#[async_trait]
pub trait Pacer: Send {
    /// Waits until the next submission is allowed.
    async fn ready(&mut self);
}

/// Enforces a minimum gap between consecutive submissions. The first call
/// returns immediately.
#[derive(Debug)]
pub struct FixedIntervalPacer {
    interval: Duration,
    last: Option<Instant>,
}

impl FixedIntervalPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }
}

#[async_trait]
impl Pacer for FixedIntervalPacer {
    async fn ready(&mut self) {
        if let Some(last) = self.last {
            tokio::time::sleep_until(last + self.interval).await;
        }
        self.last = Some(Instant::now());
    }
}
