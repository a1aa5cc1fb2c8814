//! Crate-wide error alias and the bounded-retry helper used by every
//! `TRANSIENT`-producing subsystem (cgroup teardown, SSH channel, VM boot
//! polling — spec §4.4, §4.8, §7).

pub use stratum_shared::{ErrorKind, StratumError, StratumResult};

use std::future::Future;
use std::time::Duration;

/// Retry an async operation up to `attempts` times with a fixed `backoff`
/// between attempts, treating every error as transient. Used for cgroup
/// `BUSY` retries (spec §4.4: 3 attempts, 100ms) and the VM Provider's SSH
/// channel (spec §4.8: 3 attempts, linear backoff).
pub async fn retry_transient<T, F, Fut>(
    operation: &str,
    attempts: u32,
    backoff: Duration,
    mut f: F,
) -> StratumResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StratumResult<T>>,
{
    let mut last_err = None;
    for attempt in 0..attempts {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!(operation, attempt, error = %err, "transient failure, retrying");
                last_err = Some(err);
                if attempt + 1 < attempts {
                    tokio::time::sleep(backoff * (attempt + 1)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| StratumError::transient(operation, "retry budget exhausted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_once_the_underlying_operation_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_transient("test.op", 3, Duration::from_millis(1), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(StratumError::transient("test.op", "not yet"))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn surfaces_the_last_error_once_the_budget_is_exhausted() {
        let result: StratumResult<()> = retry_transient("test.op", 2, Duration::from_millis(1), || async {
            Err(StratumError::transient("test.op", "still broken"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Transient);
    }
}
