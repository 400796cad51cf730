use crate::actor;
use crate::replica::election::timers::time::{Clock, RealClock};
use crate::replica::Term;
use rand::Rng;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Election timeout of a follower or candidate, armed for a single term.
///
/// Until it's reset, the timer reports `ElectionTimeout(term)` to the actor once per randomly
/// picked timeout. The actor discards reports of a term it already left. Dropping the handle
/// stops the timer.
pub(crate) struct ElectionTimerHandle<C: Clock = RealClock> {
    deadline: watch::Sender<Instant>,
    timeouts: TimeoutRange,
    clock: C,
    _stop_on_drop: DropGuard,
}

#[derive(Copy, Clone, Debug)]
struct TimeoutRange {
    min: Duration,
    max: Duration,
}

impl TimeoutRange {
    fn pick(&self) -> Duration {
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

struct ElectionTimerTask<C: Clock> {
    deadline: watch::Receiver<Instant>,
    timeouts: TimeoutRange,
    actor_client: actor::WeakActorClient,
    term: Term,
    clock: C,
    stop: CancellationToken,
}

impl ElectionTimerHandle {
    pub(crate) fn spawn_timer_task(
        min_timeout: Duration,
        max_timeout: Duration,
        actor_client: actor::WeakActorClient,
        term: Term,
    ) -> Self {
        let (task, handle) = new_timer(min_timeout, max_timeout, actor_client, term, RealClock);
        tokio::spawn(task.run());

        handle
    }
}

impl<C: Clock> ElectionTimerHandle<C> {
    /// Pushes the deadline a fresh random timeout into the future.
    pub(crate) fn reset_timeout(&self) {
        let deadline = self.clock.now() + self.timeouts.pick();
        // The task only goes away after the handle is dropped.
        let _ = self.deadline.send(deadline);
    }
}

// The first deadline is fixed before the task runs, so entering a state can't time out at once.
fn new_timer<C: Clock>(
    min_timeout: Duration,
    max_timeout: Duration,
    actor_client: actor::WeakActorClient,
    term: Term,
    clock: C,
) -> (ElectionTimerTask<C>, ElectionTimerHandle<C>) {
    let timeouts = TimeoutRange {
        min: min_timeout,
        max: max_timeout,
    };
    let (deadline_tx, deadline_rx) = watch::channel(clock.now() + timeouts.pick());
    let stop = CancellationToken::new();

    let task = ElectionTimerTask {
        deadline: deadline_rx,
        timeouts,
        actor_client,
        term,
        clock: clock.clone(),
        stop: stop.clone(),
    };
    let handle = ElectionTimerHandle {
        deadline: deadline_tx,
        timeouts,
        clock,
        _stop_on_drop: stop.drop_guard(),
    };

    (task, handle)
}

impl<C: Clock + Send + Sync + 'static> ElectionTimerTask<C> {
    async fn run(mut self) {
        let mut deadline = *self.deadline.borrow_and_update();
        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => return,
                changed = self.deadline.changed() => match changed {
                    Ok(()) => deadline = *self.deadline.borrow_and_update(),
                    Err(_) => return,
                },
                _ = self.clock.sleep_until(deadline) => {
                    self.actor_client.election_timeout(self.term).await;
                    // Nobody reset us. Report again after another timeout in case the actor
                    // was busy handling a request that keeps us in this state.
                    deadline = self.clock.now() + self.timeouts.pick();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorClient;
    use crate::replica::election::timers::test_utils::TestUtilActor;
    use crate::replica::election::timers::time::{mocked_clock, MockClock};

    const TIMEOUT: Duration = Duration::from_millis(100);

    // Jitter is tested separately, so min and max are the same here.
    fn fixed_timer(term: u64, clock: MockClock) -> (ElectionTimerHandle<MockClock>, TestUtilActor, ActorClient) {
        let (actor_client, rx) = ActorClient::new(10);
        let (task, handle) = new_timer(TIMEOUT, TIMEOUT, actor_client.weak(), Term::new(term), clock);
        tokio::spawn(task.run());

        (handle, TestUtilActor::new(rx), actor_client)
    }

    #[tokio::test]
    async fn resets_postpone_the_timeout() {
        let (clock, mut time) = mocked_clock();
        let (timer, mut actor, _client) = fixed_timer(3, clock);
        actor.assert_no_event().await;

        // Heard from the leader every half timeout.
        for _ in 0..5 {
            time.advance(TIMEOUT / 2);
            timer.reset_timeout();
        }
        actor.assert_no_event().await;

        // Last reset was at 2.5 timeouts, so it fires at 3.5 timeouts and not a nanosecond before.
        let one_ns = Duration::from_nanos(1);
        time.advance(TIMEOUT - one_ns);
        actor.assert_no_event().await;

        time.advance(one_ns);
        actor.assert_election_timeout_event(Term::new(3)).await;
        assert_eq!(time.elapsed_time(), TIMEOUT * 7 / 2);
    }

    #[tokio::test]
    async fn unanswered_timeout_is_reported_again() {
        let (clock, mut time) = mocked_clock();
        let (_timer, mut actor, _client) = fixed_timer(8, clock);

        time.advance(TIMEOUT);
        actor.assert_election_timeout_event(Term::new(8)).await;
        actor.assert_no_event().await;

        time.advance(TIMEOUT);
        actor.assert_election_timeout_event(Term::new(8)).await;
    }

    #[tokio::test]
    async fn reset_after_timeout_rearms_the_timer() {
        let (clock, mut time) = mocked_clock();
        let (timer, mut actor, _client) = fixed_timer(3, clock);

        // An AppendEntries can already be queued behind the timeout when it fires.
        time.advance(TIMEOUT);
        actor.assert_election_timeout_event(Term::new(3)).await;
        timer.reset_timeout();

        for _ in 0..5 {
            time.advance(TIMEOUT / 2);
            timer.reset_timeout();
        }
        actor.assert_no_event().await;

        time.advance(TIMEOUT);
        actor.assert_election_timeout_event(Term::new(3)).await;
    }

    #[tokio::test]
    async fn dropped_handle_stops_the_task() {
        let (clock, mut time) = mocked_clock();
        let (actor_client, rx) = ActorClient::new(10);
        let mut actor = TestUtilActor::new(rx);
        let (task, handle) = new_timer(TIMEOUT, TIMEOUT, actor_client.weak(), Term::new(1), clock);
        let task = tokio::spawn(task.run());

        drop(handle);
        time.advance(TIMEOUT * 2);

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("Timer task kept running")
            .unwrap();
        actor.assert_no_event().await;
    }

    #[test]
    fn picked_timeouts_stay_in_range() {
        let timeouts = TimeoutRange {
            min: Duration::from_millis(150),
            max: Duration::from_millis(300),
        };
        for _ in 0..1000 {
            let picked = timeouts.pick();
            assert!(picked >= timeouts.min && picked <= timeouts.max, "{:?} out of range", picked);
        }
    }
}
