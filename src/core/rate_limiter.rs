//! Connection admission rate limiting
//!
//! A token bucket gates how fast new connections are accepted. Each accepted
//! connection consumes one token; a background task adds one token per tick
//! up to capacity, for the lifetime of the worker process.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Token-bucket rate limiter for new connections.
///
/// `consume` never blocks and is safe under concurrent calls from many
/// simultaneously-completing connection attempts.
pub struct TokenBucket {
    tokens: AtomicU32,
    capacity: u32,
}

impl TokenBucket {
    /// Create a full bucket
    pub fn new(capacity: u32) -> Self {
        Self {
            tokens: AtomicU32::new(capacity),
            capacity,
        }
    }

    /// Take one token if any remain. A `false` return is an admission
    /// decision ("reject this connection"), not an error.
    pub fn consume(&self) -> bool {
        self.tokens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |tokens| {
                tokens.checked_sub(1)
            })
            .is_ok()
    }

    /// Add one token, saturating at capacity
    fn refill(&self) {
        let _ = self
            .tokens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |tokens| {
                if tokens < self.capacity {
                    Some(tokens + 1)
                } else {
                    None
                }
            });
    }

    pub fn available(&self) -> u32 {
        self.tokens.load(Ordering::Acquire)
    }

    /// Spawn the refill task. It runs until the returned handle is aborted
    /// at worker shutdown.
    pub fn start_refiller(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let bucket = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so a full
            // bucket is not refilled at startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                bucket.refill();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_drains_to_zero_then_fails() {
        let bucket = TokenBucket::new(3);
        assert!(bucket.consume());
        assert!(bucket.consume());
        assert!(bucket.consume());
        assert!(!bucket.consume(), "empty bucket must reject");
        assert_eq!(bucket.available(), 0);
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let bucket = TokenBucket::new(2);
        bucket.refill();
        bucket.refill();
        assert_eq!(bucket.available(), 2, "refill must saturate at capacity");

        assert!(bucket.consume());
        bucket.refill();
        assert_eq!(bucket.available(), 2);
    }

    #[test]
    fn test_consume_succeeds_again_after_refill() {
        let bucket = TokenBucket::new(1);
        assert!(bucket.consume());
        assert!(!bucket.consume());
        bucket.refill();
        assert!(bucket.consume());
    }

    #[tokio::test]
    async fn test_concurrent_consume_never_oversells() {
        let bucket = Arc::new(TokenBucket::new(50));
        let mut handles = Vec::new();
        for _ in 0..100 {
            let bucket = Arc::clone(&bucket);
            handles.push(tokio::spawn(async move { bucket.consume() }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 50, "exactly capacity tokens may be consumed");
    }

    #[tokio::test]
    async fn test_refiller_restores_tokens() {
        let bucket = Arc::new(TokenBucket::new(1));
        assert!(bucket.consume());

        let refiller = Arc::clone(&bucket).start_refiller(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        refiller.abort();

        assert!(bucket.consume(), "refiller should have restored a token");
    }
}
