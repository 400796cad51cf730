use tokio::time::Instant;

/// Source of time for timer loops, so tests can drive them deterministically.
#[async_trait::async_trait]
pub(crate) trait Clock: Clone {
    fn now(&self) -> Instant;

    async fn sleep_until(&mut self, deadline: Instant);
}

#[derive(Copy, Clone)]
pub(crate) struct RealClock;

#[async_trait::async_trait]
impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&mut self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

#[cfg(test)]
pub(crate) use mock::{mocked_clock, MockClock};

#[cfg(test)]
mod mock {
    use super::Clock;
    use tokio::sync::watch;
    use tokio::time::{Duration, Instant};

    /// Returns a clock frozen at the current instant, and the handle that moves it forward.
    pub(crate) fn mocked_clock() -> (MockClock, MockClockController) {
        let start = Instant::now();
        let (tx, rx) = watch::channel(start);

        (MockClock { now: rx }, MockClockController { now: tx, start })
    }

    #[derive(Clone)]
    pub(crate) struct MockClock {
        now: watch::Receiver<Instant>,
    }

    #[async_trait::async_trait]
    impl Clock for MockClock {
        fn now(&self) -> Instant {
            *self.now.borrow()
        }

        async fn sleep_until(&mut self, deadline: Instant) {
            while *self.now.borrow() < deadline {
                if self.now.changed().await.is_err() {
                    // Time can no longer move, the sleeper never wakes up.
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    pub(crate) struct MockClockController {
        now: watch::Sender<Instant>,
        start: Instant,
    }

    impl MockClockController {
        pub(crate) fn elapsed_time(&self) -> Duration {
            *self.now.borrow() - self.start
        }

        /// Moves time forward. Sleepers only promise to wake at or after their deadline, so a
        /// single big step wakes a periodic sleeper once, late, instead of once per period.
        pub(crate) fn advance(&mut self, duration: Duration) {
            let next = *self.now.borrow() + duration;
            // No sleepers left is fine.
            let _ = self.now.send(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::time::Duration;

    #[tokio::test]
    async fn mock_sleep_wakes_at_deadline_only() {
        let (mut clock, mut controller) = mocked_clock();
        let woke = Arc::new(AtomicBool::new(false));

        // Fixed before the sleeper gets polled, so advancing time can't race with it.
        let deadline = clock.now() + Duration::from_millis(300);
        let sleeper = {
            let woke = woke.clone();
            tokio::spawn(async move {
                clock.sleep_until(deadline).await;
                woke.store(true, Ordering::SeqCst);
            })
        };

        controller.advance(Duration::from_millis(299));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!woke.load(Ordering::SeqCst));

        controller.advance(Duration::from_millis(1));
        tokio::time::timeout(Duration::from_secs(5), sleeper)
            .await
            .expect("Sleeper never woke")
            .unwrap();
        assert!(woke.load(Ordering::SeqCst));
        assert_eq!(controller.elapsed_time(), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn elapsed_deadline_returns_immediately() {
        let (mut clock, mut controller) = mocked_clock();
        controller.advance(Duration::from_secs(1));

        let past = clock.now() - Duration::from_millis(500);
        tokio::time::timeout(Duration::from_secs(1), clock.sleep_until(past))
            .await
            .expect("Sleeping until the past should not block");
    }
}
