use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Represents an entity responsible for providing time across the application. Wall time drives
/// the budget, monotonic instants drive the tick schedule. Swapping it out allows tests to
/// simulate a suspended machine.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}

#[cfg(test)]
pub use test_clock::TestClock;

#[cfg(test)]
mod test_clock {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use tokio::time::Instant;

    use super::Clock;

    /// Wall time follows the tokio clock, so paused tests advance it together with the tick
    /// schedule. [TestClock::suspend] moves wall time alone, the way a sleeping laptop does.
    #[derive(Clone)]
    pub struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
        suspended: Arc<Mutex<Duration>>,
    }

    impl TestClock {
        pub fn new(start_time: DateTime<Utc>) -> Self {
            Self {
                start_time,
                reference: Instant::now(),
                suspended: Arc::new(Mutex::new(Duration::zero())),
            }
        }

        pub fn suspend(&self, duration: Duration) {
            *self.suspended.lock().unwrap() += duration;
        }
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            let elapsed = Duration::from_std(self.reference.elapsed()).unwrap();
            self.start_time + elapsed + *self.suspended.lock().unwrap()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }
}
