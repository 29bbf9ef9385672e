//! Synchronous OS work (process table scans, X server round-trips) runs on tokio's blocking pool.
//! The daemon runtime has a single thread, so work done inline in an `async fn` would stall the
//! loop and could never be cut short by its timeout.

use std::sync::{Arc, Mutex, TryLockError};

use anyhow::{anyhow, Result};

/// State owned by a collaborator and handed to the blocking pool for each call.
///
/// A call that timed out keeps running in the background and holds the state until it finishes.
/// Calls made in the meantime fail right away instead of piling up behind it.
pub struct BlockingState<S> {
    inner: Arc<Mutex<S>>,
}

impl<S: Send + 'static> BlockingState<S> {
    pub fn new(state: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> Result<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut state = match inner.try_lock() {
                Ok(state) => state,
                // A panic in an earlier call doesn't leave the OS handles unusable.
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    return Err(anyhow!("Previous call is still running"))
                }
            };
            work(&mut state)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::BlockingState;

    #[tokio::test]
    async fn work_runs_with_the_state() -> anyhow::Result<()> {
        let state = BlockingState::new(vec![1, 2]);
        state
            .run(|values| {
                values.push(3);
                Ok(())
            })
            .await?;
        let sum = state.run(|values| Ok(values.iter().sum::<i32>())).await?;
        assert_eq!(sum, 6);
        Ok(())
    }

    #[tokio::test]
    async fn timeout_abandons_slow_work_and_rejects_overlapping_calls() {
        let state = BlockingState::new(());
        let started = Instant::now();
        let slow = tokio::time::timeout(
            Duration::from_millis(50),
            state.run(|_| {
                std::thread::sleep(Duration::from_millis(400));
                Ok(())
            }),
        )
        .await;
        assert!(slow.is_err());
        assert!(started.elapsed() < Duration::from_millis(300));

        let overlapping = state.run(|_| Ok(())).await;
        assert!(overlapping
            .unwrap_err()
            .to_string()
            .contains("still running"));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(state.run(|_| Ok(())).await.is_ok());
    }

    #[tokio::test]
    async fn panicking_work_becomes_an_error() {
        let state = BlockingState::new(0);
        let result = state.run(|_| -> anyhow::Result<()> { panic!("boom") }).await;
        assert!(result.is_err());
        assert!(state.run(|value| Ok(*value)).await.is_ok());
    }
}
