use crate::replica;
use crate::replica::Term;
use tokio::sync::{mpsc, oneshot};

// Every interaction with a node's raft state goes through this actor's queue, so the replica
// never needs locks of its own. Long running work (RPC fan-out, replication) runs on spawned
// tasks which report back to the actor as events.
#[derive(Debug)]
pub(crate) enum Event {
    // Leader: Reject. Transition to follower first if the leader's term is newer.
    // Candidate: Transition to follower first if the leader's term is at least ours, else reject.
    // Follower: Validate and append to the topic's log, ratchet commit index. Reset timeout.
    AppendEntries(replica::AppendEntriesInput, Callback<replica::AppendEntriesOutput>),

    // Leader: Deny, unless the candidate's term is newer (transition to follower first).
    // Candidate: Deny, unless the candidate's term is newer (transition to follower first).
    // Follower: Grant vote if applicable.
    RequestVote(replica::RequestVoteInput, Callback<replica::RequestVoteOutput>),

    // Leader: Append to a topic's log; replication happens in the background.
    // Candidate/Follower: Redirect.
    Write(
        replica::WriteInput,
        Callback<Result<replica::WriteOutput, replica::WriteError>>,
    ),

    // Leader: Read a committed entry of a topic.
    // Candidate/Follower: Redirect.
    Read(
        replica::ReadInput,
        Callback<Result<replica::ReadOutput, replica::ReadError>>,
    ),

    // Leader: discard
    // Candidate: Start a new election in the next term.
    // Follower: Transition to candidate.
    ElectionTimeout(Term),

    // Leader: discard
    // Candidate: Transition to leader if won, otherwise to follower.
    // Follower: discard
    ElectionOutcome { term: Term, won: bool },

    // A peer answered one of our background RPCs with a newer term.
    HigherTermObserved(Term),

    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug)]
pub(crate) struct Callback<O>(oneshot::Sender<O>);

impl<O> Callback<O> {
    pub(crate) fn send(self, message: O) {
        let _ = self.0.send(message);
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Replica actor is dead RIP")]
pub struct ActorExited;

#[derive(Clone)]
pub(crate) struct ActorClient {
    sender: mpsc::Sender<Event>,
}

impl ActorClient {
    pub(crate) fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer_size);

        (ActorClient { sender: tx }, rx)
    }

    pub(crate) fn weak(&self) -> WeakActorClient {
        WeakActorClient {
            sender: self.sender.downgrade(),
        }
    }

    pub(crate) async fn append_entries(
        &self,
        input: replica::AppendEntriesInput,
    ) -> Result<replica::AppendEntriesOutput, ActorExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::AppendEntries(input, Callback(tx))).await?;

        rx.await.map_err(|_| ActorExited)
    }

    pub(crate) async fn request_vote(
        &self,
        input: replica::RequestVoteInput,
    ) -> Result<replica::RequestVoteOutput, ActorExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::RequestVote(input, Callback(tx))).await?;

        rx.await.map_err(|_| ActorExited)
    }

    pub(crate) async fn write(&self, input: replica::WriteInput) -> Result<replica::WriteOutput, replica::WriteError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Write(input, Callback(tx)))
            .await
            .map_err(|_| replica::WriteError::ActorExited)?;

        rx.await.map_err(|_| replica::WriteError::ActorExited)?
    }

    pub(crate) async fn read(&self, input: replica::ReadInput) -> Result<replica::ReadOutput, replica::ReadError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Read(input, Callback(tx)))
            .await
            .map_err(|_| replica::ReadError::ActorExited)?;

        rx.await.map_err(|_| replica::ReadError::ActorExited)?
    }

    /// Returns once the replica has left its current state and the event loop has exited.
    pub(crate) async fn shutdown(&self) -> Result<(), ActorExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Shutdown(tx)).await?;

        rx.await.map_err(|_| ActorExited)
    }

    async fn send(&self, event: Event) -> Result<(), ActorExited> {
        self.sender.send(event).await.map_err(|_| ActorExited)
    }
}

/// WeakActorClient is held by background tasks, so they never keep a stopped node's queue alive.
#[derive(Clone)]
pub(crate) struct WeakActorClient {
    sender: mpsc::WeakSender<Event>,
}

impl WeakActorClient {
    pub(crate) fn upgrade(&self) -> Option<ActorClient> {
        self.sender.upgrade().map(|sender| ActorClient { sender })
    }

    pub(crate) async fn election_timeout(&self, term: Term) {
        self.notify(Event::ElectionTimeout(term)).await;
    }

    pub(crate) async fn election_outcome(&self, term: Term, won: bool) {
        self.notify(Event::ElectionOutcome { term, won }).await;
    }

    pub(crate) async fn higher_term_observed(&self, term: Term) {
        self.notify(Event::HigherTermObserved(term)).await;
    }

    async fn notify(&self, event: Event) {
        if let Some(client) = self.upgrade() {
            let _ = client.send(event).await;
        }
    }
}

/// ReplicaActor is replica logic in actor model.
pub(crate) struct ReplicaActor {
    logger: slog::Logger,
    receiver: mpsc::Receiver<Event>,
    replica: replica::Replica,
}

impl ReplicaActor {
    pub(crate) fn new(logger: slog::Logger, receiver: mpsc::Receiver<Event>, replica: replica::Replica) -> Self {
        ReplicaActor {
            logger,
            receiver,
            replica,
        }
    }

    pub(crate) async fn run_event_loop(mut self) {
        self.replica.initialize();

        while let Some(event) = self.receiver.recv().await {
            if let Event::Shutdown(done) = event {
                self.replica.shutdown().await;
                slog::info!(self.logger, "Replica actor stopped.");
                let _ = done.send(());
                return;
            }
            self.handle_event(event).await;
        }

        // Every strong client is gone, nobody can reach this node anymore.
        self.replica.shutdown().await;
        slog::info!(self.logger, "Replica actor stopped, all clients dropped.");
    }

    // Awaiting in here is limited to state exits, which wait for this node's own background
    // tasks. It must never wait on another actor.
    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::AppendEntries(input, callback) => {
                let output = self.replica.handle_append_entries(input).await;
                callback.send(output);
            }
            Event::RequestVote(input, callback) => {
                let output = self.replica.handle_request_vote(input).await;
                callback.send(output);
            }
            Event::Write(input, callback) => {
                let result = self.replica.handle_write(input);
                callback.send(result);
            }
            Event::Read(input, callback) => {
                let result = self.replica.handle_read(input);
                callback.send(result);
            }
            Event::ElectionTimeout(term) => {
                self.replica.handle_election_timeout(term).await;
            }
            Event::ElectionOutcome { term, won } => {
                self.replica.handle_election_outcome(term, won).await;
            }
            Event::HigherTermObserved(term) => {
                self.replica.handle_higher_term_observed(term).await;
            }
            Event::Shutdown(done) => {
                // Handled by the event loop.
                let _ = done.send(());
            }
        }
    }
}
