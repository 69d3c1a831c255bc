//! Completion barrier shared by every stage of a pipeline run.
//!
//! Each stage releases the barrier exactly once when it stops; the
//! coordinator waits for the count to reach zero before tearing the pipeline
//! down.

use std::sync::Arc;
use tokio::sync::watch;

/// Countdown of pipeline stages that have not finished yet.
///
/// Cloning yields another handle to the same counter.
#[derive(Debug, Clone)]
pub struct CompletionBarrier {
    remaining: Arc<watch::Sender<usize>>,
}

impl CompletionBarrier {
    /// Create a barrier expecting `stages` releases.
    pub fn new(stages: usize) -> Self {
        let (tx, _rx) = watch::channel(stages);
        Self {
            remaining: Arc::new(tx),
        }
    }

    /// Register `stages` more participants.
    pub fn add(&self, stages: usize) {
        self.remaining.send_modify(|remaining| *remaining += stages);
    }

    /// Mark one stage as finished.
    ///
    /// # Panics
    ///
    /// Panics when called more times than stages were registered.
    pub fn release(&self) {
        let mut underflow = false;
        self.remaining.send_modify(|remaining| match remaining.checked_sub(1) {
            Some(next) => *remaining = next,
            None => underflow = true,
        });
        if underflow {
            panic!("completion barrier released more times than stages were registered");
        }
    }

    /// Number of stages that have not released yet.
    pub fn remaining(&self) -> usize {
        *self.remaining.borrow()
    }

    /// Wait until every registered stage has released.
    pub async fn wait(&self) {
        let mut rx = self.remaining.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|remaining| *remaining == 0).await;
    }
}

/// Releases a barrier when dropped, so a stage signals completion exactly
/// once on every exit path, including unwinding.
#[derive(Debug)]
pub(crate) struct ReleaseOnDrop {
    barrier: CompletionBarrier,
}

impl ReleaseOnDrop {
    pub(crate) fn new(barrier: CompletionBarrier) -> Self {
        Self { barrier }
    }
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.barrier.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_returns_immediately_at_zero() {
        let barrier = CompletionBarrier::new(0);
        tokio::time::timeout(Duration::from_secs(1), barrier.wait())
            .await
            .expect("empty barrier should not block");
    }

    #[tokio::test]
    async fn test_wait_blocks_until_all_released() {
        let barrier = CompletionBarrier::new(2);
        let waiter = {
            let barrier = barrier.clone();
            tokio::spawn(async move { barrier.wait().await })
        };

        barrier.release();
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        assert_eq!(barrier.remaining(), 1);

        barrier.release();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish once the count hits zero")
            .unwrap();
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test]
    async fn test_add_registers_more_stages() {
        let barrier = CompletionBarrier::new(1);
        barrier.add(2);
        assert_eq!(barrier.remaining(), 3);
        barrier.release();
        barrier.release();
        barrier.release();
        barrier.wait().await;
    }

    #[test]
    #[should_panic(expected = "released more times")]
    fn test_release_below_zero_panics() {
        let barrier = CompletionBarrier::new(1);
        barrier.release();
        barrier.release();
    }

    #[test]
    fn test_release_on_drop() {
        let barrier = CompletionBarrier::new(1);
        {
            let _guard = ReleaseOnDrop::new(barrier.clone());
            assert_eq!(barrier.remaining(), 1);
        }
        assert_eq!(barrier.remaining(), 0);
    }
}
