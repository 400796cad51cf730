use crate::actor::Event;
use crate::replica::Term;
use std::time::Duration;
use tokio::sync::mpsc;

/// Stands in for the replica actor, recording what timers send to it.
pub(super) struct TestUtilActor {
    queue: mpsc::Receiver<Event>,
    quiet_period: Duration,
}

impl TestUtilActor {
    pub(super) fn new(queue: mpsc::Receiver<Event>) -> Self {
        TestUtilActor {
            queue,
            quiet_period: Duration::from_millis(10),
        }
    }

    pub(super) async fn assert_election_timeout_event(&mut self, expected_term: Term) {
        let event = tokio::time::timeout(Duration::from_secs(5), self.queue.recv())
            .await
            .expect("No event within sanity timeout")
            .expect("Actor queue closed");

        match event {
            Event::ElectionTimeout(term) => assert_eq!(term, expected_term),
            other => panic!("Expected election timeout, got {:?}", other),
        }
    }

    pub(super) async fn assert_no_event(&mut self) {
        if let Ok(event) = tokio::time::timeout(self.quiet_period, self.queue.recv()).await {
            panic!("Expected no event, got {:?}", event);
        }
    }
}
