//! Batch chunking and inter-batch pacing.
//!
//! Pacing is the only backpressure applied against the gateway's rate
//! limit. It is a separate stage so the orchestrator can race it against
//! cancellation and tests can swap in a recording pacer.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::types::Recipient;

/// Split `recipients` into consecutive slices of at most `max_batch_size`.
///
/// Lazy and order-preserving; only the last batch may be shorter.
/// A size of zero is treated as one.
pub fn batches(
    recipients: &[Recipient],
    max_batch_size: usize,
) -> std::slice::Chunks<'_, Recipient> {
    recipients.chunks(max_batch_size.max(1))
}

/// Number of batches [`batches`] will yield.
pub fn batch_count(len: usize, max_batch_size: usize) -> usize {
    len.div_ceil(max_batch_size.max(1))
}

/// Suspends the dispatch path between two batches.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Called after a batch has been sent and before the next one starts.
    /// Never called after the final batch.
    async fn pause(&self);
}

/// Sleeps for a fixed interval.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

/// Token bucket rate limiter.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: u32) -> Self {
        let cap = capacity.max(1) as f64;
        Self {
            capacity: cap,
            tokens: cap,
            refill_per_sec: refill_per_sec.max(1) as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    pub fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// How long until one token is available.
    pub fn time_until_token(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_sec)
        }
    }
}

/// Waits for a token before letting the next batch go.
#[derive(Debug)]
pub struct TokenBucketPacer {
    bucket: Mutex<TokenBucket>,
}

impl TokenBucketPacer {
    pub fn new(max_rps: u32, burst: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(burst, max_rps)),
        }
    }
}

#[async_trait]
impl Pacer for TokenBucketPacer {
    async fn pause(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                if bucket.try_take() {
                    return;
                }
                bucket.time_until_token()
            };
            sleep(wait).await;
        }
    }
}
