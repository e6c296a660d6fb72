// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conditional-write retry/backoff helper shared by `sessions.rs` and
//! `runs.rs` (spec §4.2 index update protocol: up to 3 additional
//! attempts, base 10ms, factor 2).

use std::future::Future;
use std::time::Duration;

pub const MAX_ADDITIONAL_ATTEMPTS: u32 = 3;
pub const BASE_BACKOFF: Duration = Duration::from_millis(10);
pub const BACKOFF_FACTOR: u32 = 2;

/// Backoff delay before the `attempt`-th retry (0-indexed: the first retry
/// after the initial attempt waits `BASE_BACKOFF`).
pub fn backoff_delay(attempt: u32) -> Duration {
    BASE_BACKOFF * BACKOFF_FACTOR.pow(attempt)
}

/// Run `op` up to `1 + MAX_ADDITIONAL_ATTEMPTS` times. `op` returns
/// `Ok(Some(t))` on success, `Ok(None)` on a conflict that should be
/// retried, and `Err(e)` on a non-retriable failure.
pub async fn retry_with_backoff<T, E, F, Fut>(mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    for attempt in 0..=MAX_ADDITIONAL_ATTEMPTS {
        match op().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                if attempt == MAX_ADDITIONAL_ATTEMPTS {
                    return Err(RetryError::Exhausted);
                }
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
            Err(e) => return Err(RetryError::Op(e)),
        }
    }
    Err(RetryError::Exhausted)
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("conditional write did not converge after {} attempts", MAX_ADDITIONAL_ATTEMPTS + 1)]
    Exhausted,
    #[error(transparent)]
    Op(#[from] E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_each_attempt() {
        assert_eq!(backoff_delay(0), Duration::from_millis(10));
        assert_eq!(backoff_delay(1), Duration::from_millis(20));
        assert_eq!(backoff_delay(2), Duration::from_millis(40));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError<()>> = retry_with_backoff(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Ok(None) } else { Ok(Some(42)) } }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_retries() {
        let result: Result<u32, RetryError<()>> =
            retry_with_backoff(|| async { Ok(None) }).await;
        assert!(matches!(result, Err(RetryError::Exhausted)));
    }
}
