use crate::replica::election::RealClock;
use crate::replica::replication::{LeaderContext, ReplicationController};
use crate::replica::topic::{Topic, TopicEvent, TopicId, TopicListener, TopicListenerId, TopicRegistry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Replicator runs one replication controller per registered topic for as long as this node is
/// leader of one term.
pub(crate) struct Replicator {
    registry: TopicRegistry,
    launcher: Arc<Launcher>,
    listener_id: Option<TopicListenerId>,
}

struct Launcher {
    ctx: Arc<LeaderContext>,
    controllers: Mutex<Controllers>,
}

#[derive(Default)]
struct Controllers {
    running: HashMap<TopicId, RunningController>,
    // Cancelled but maybe not exited yet.
    retired: Vec<JoinHandle<()>>,
    closed: bool,
}

struct RunningController {
    cancel: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl RunningController {
    fn retire(self) -> JoinHandle<()> {
        self.cancel.cancel();
        self.join_handle
    }
}

impl Replicator {
    pub(crate) fn new(ctx: Arc<LeaderContext>, registry: TopicRegistry) -> Self {
        Replicator {
            registry,
            launcher: Arc::new(Launcher {
                ctx,
                controllers: Mutex::new(Controllers::default()),
            }),
            listener_id: None,
        }
    }

    /// Starts a controller for every current topic and keeps following topic changes.
    pub(crate) fn launch(&mut self) {
        if self.listener_id.is_some() {
            return;
        }
        self.listener_id = Some(self.registry.register_listener(self.launcher.clone(), true));
    }

    /// Cancels every controller, and returns only once all of them have exited. No replication
    /// traffic is sent afterwards.
    pub(crate) async fn shutdown(&mut self) {
        if let Some(listener_id) = self.listener_id.take() {
            self.registry.deregister_listener(listener_id);
        }

        for join_handle in self.launcher.close() {
            if let Err(e) = join_handle.await {
                slog::warn!(self.launcher.ctx.logger, "Replication controller ended abnormally: {}", e);
            }
        }
    }

    #[cfg(test)]
    fn num_running(&self) -> usize {
        self.launcher.lock().running.len()
    }
}

impl Launcher {
    fn lock(&self) -> MutexGuard<'_, Controllers> {
        self.controllers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn launch(&self, topic: &Topic) {
        let mut controllers = self.lock();
        if controllers.closed {
            return;
        }
        controllers.retired.retain(|join_handle| !join_handle.is_finished());

        let cancel = CancellationToken::new();
        let controller = ReplicationController::new(self.ctx.clone(), topic.clone(), RealClock, cancel.clone());
        let join_handle = tokio::spawn(controller.run());

        // If a controller already exists for the topic, kill it.
        if let Some(previous) = controllers
            .running
            .insert(topic.id().clone(), RunningController { cancel, join_handle })
        {
            let retired = previous.retire();
            controllers.retired.push(retired);
        }
    }

    fn stop(&self, topic: &Topic) {
        let mut controllers = self.lock();
        if let Some(running) = controllers.running.remove(topic.id()) {
            let retired = running.retire();
            controllers.retired.push(retired);
        }
    }

    /// Cancels everything and refuses new launches. Returns the handles to await.
    fn close(&self) -> Vec<JoinHandle<()>> {
        let mut controllers = self.lock();
        controllers.closed = true;

        let mut join_handles: Vec<_> = controllers.retired.drain(..).collect();
        join_handles.extend(controllers.running.drain().map(|(_, running)| running.retire()));

        join_handles
    }
}

impl TopicListener for Launcher {
    fn on_topic_event(&self, topic: &Topic, event: TopicEvent) {
        match event {
            TopicEvent::Added => {
                slog::info!(self.ctx.logger, "Replicating topic {:?}", topic);
                self.launch(topic);
            }
            TopicEvent::Removed => {
                slog::info!(self.ctx.logger, "Stopped replicating topic {:?}", topic);
                self.stop(topic);
            }
        }
    }
}
