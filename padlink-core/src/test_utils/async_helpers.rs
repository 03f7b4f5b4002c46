//! Async test helpers
//!
//! Timeout wrappers around channel receives and futures.

use std::future::Future;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// Default timeout duration for tests
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to watch for something that must not happen
pub const QUIET_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvTimeoutError {
    Timeout,
    Closed,
}

impl std::fmt::Display for RecvTimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecvTimeoutError::Timeout => write!(f, "receive operation timed out"),
            RecvTimeoutError::Closed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for RecvTimeoutError {}

/// Receive from an unbounded channel with a timeout
pub async fn recv_timeout<T>(
    rx: &mut mpsc::UnboundedReceiver<T>,
    duration: Duration,
) -> Result<T, RecvTimeoutError> {
    timeout(duration, rx.recv())
        .await
        .map_err(|_| RecvTimeoutError::Timeout)?
        .ok_or(RecvTimeoutError::Closed)
}

/// Drain everything already queued without waiting
pub fn try_drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut drained = Vec::new();
    while let Ok(item) = rx.try_recv() {
        drained.push(item);
    }
    drained
}

/// Assert a future completes within `duration` and return its output
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}

/// Poll `condition` until it holds or `duration` passes
pub async fn wait_until<F, Fut>(duration: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_recv_timeout_reports_timeout_and_close() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u8>();
        assert_eq!(
            recv_timeout(&mut rx, Duration::from_millis(10)).await,
            Err(RecvTimeoutError::Timeout)
        );

        tx.send(7).unwrap();
        assert_eq!(recv_timeout(&mut rx, DEFAULT_TEST_TIMEOUT).await, Ok(7));

        drop(tx);
        assert_eq!(
            recv_timeout(&mut rx, DEFAULT_TEST_TIMEOUT).await,
            Err(RecvTimeoutError::Closed)
        );
    }

    #[tokio::test]
    async fn test_wait_until() {
        let counter = AtomicUsize::new(0);
        let polls = &counter;
        let met = wait_until(DEFAULT_TEST_TIMEOUT, || async move {
            polls.fetch_add(1, Ordering::SeqCst) >= 2
        })
        .await;
        assert!(met);

        assert!(!wait_until(Duration::from_millis(20), || async { false }).await);
    }

    #[tokio::test]
    #[should_panic(expected = "did not complete")]
    async fn test_assert_completes_within_panics_on_timeout() {
        assert_completes_within(Duration::from_millis(10), std::future::pending::<()>()).await;
    }
}
