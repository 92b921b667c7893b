use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::UploadOptions;
use crate::error::{PublishError, Result};
use crate::s3::ObjectStore;

/// How many times a failed put is retried
///
/// The first attempt is not a retry, so at most `retries + 1` puts are made.
/// A zero delay retries immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Put `body` at `key`, retrying failures per `policy`
///
/// Returns the number of attempts used. When every attempt fails, the last
/// store error is returned inside [`PublishError::Upload`].
pub async fn upload_with_retry(
    store: &dyn ObjectStore,
    key: &str,
    body: Bytes,
    options: &UploadOptions,
    policy: RetryPolicy,
    verbose: bool,
) -> Result<u32> {
    let mut attempt = 1;
    loop {
        if attempt > 1 {
            if verbose {
                info!("Retry {}: {}", attempt - 1, key);
            } else {
                debug!("Retry {}: {}", attempt - 1, key);
            }
        }

        match store.put(key, body.clone(), options).await {
            Ok(()) => return Ok(attempt),
            Err(e) if attempt > policy.retries => {
                return Err(PublishError::Upload {
                    key: key.to_string(),
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                debug!(
                    "Attempt {}/{} for {} failed: {:#}",
                    attempt,
                    policy.max_attempts(),
                    key,
                    e
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::testing::MemoryStore;

    async fn run(store: &MemoryStore, retries: u32) -> Result<u32> {
        upload_with_retry(
            store,
            "cdn/app.js",
            Bytes::from_static(b"payload"),
            &UploadOptions::default(),
            RetryPolicy::new(retries, Duration::ZERO),
            false,
        )
        .await
    }

    #[tokio::test]
    async fn test_two_failures_then_success() {
        let store = MemoryStore::new();
        store.fail_puts(2);

        assert_eq!(run(&store, 2).await.unwrap(), 3);
        assert_eq!(store.put_calls().len(), 3);
        assert_eq!(store.object("cdn/app.js"), Some(Bytes::from_static(b"payload")));
    }

    #[tokio::test]
    async fn test_exhausted_retries_raise_upload_error() {
        let store = MemoryStore::new();
        store.fail_all_puts();

        let err = run(&store, 1).await.unwrap_err();
        assert_eq!(store.put_calls().len(), 2);
        match err {
            PublishError::Upload { key, attempts, source } => {
                assert_eq!(key, "cdn/app.js");
                assert_eq!(attempts, 2);
                assert!(source.to_string().contains("connection reset"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let store = MemoryStore::new();
        store.fail_puts(1);

        assert!(run(&store, 0).await.is_err());
        assert_eq!(store.put_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let store = MemoryStore::new();

        assert_eq!(run(&store, 5).await.unwrap(), 1);
        assert_eq!(store.put_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_attempts() {
        let store = MemoryStore::new();
        store.fail_puts(2);
        let started = tokio::time::Instant::now();

        let attempts = upload_with_retry(
            &store,
            "k",
            Bytes::new(),
            &UploadOptions::default(),
            RetryPolicy::new(3, Duration::from_secs(2)),
            false,
        )
        .await
        .unwrap();

        assert_eq!(attempts, 3);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }
}
