use crate::replica::topic::{Topic, TopicId, CONTROL_NAMESPACE};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TopicEvent {
    Added,
    Removed,
}

/// Observer of topic membership. Events are delivered while the registry is locked, in the order
/// they happened, so implementations must not call back into the registry.
pub trait TopicListener: Send + Sync {
    fn on_topic_event(&self, topic: &Topic, event: TopicEvent);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TopicListenerId(u64);

/// TopicRegistry is the node's namespace -> topic directory. Outside of startup, only the control
/// log consumer mutates it.
#[derive(Clone)]
pub struct TopicRegistry {
    logger: slog::Logger,
    control_topic: Topic,
    state: Arc<Mutex<RegistryState>>,
}

struct RegistryState {
    topics: HashMap<String, Topic>,
    listeners: Vec<(TopicListenerId, Arc<dyn TopicListener>)>,
    next_listener_id: u64,
}

impl RegistryState {
    fn notify(&self, topic: &Topic, event: TopicEvent) {
        for (_, listener) in self.listeners.iter() {
            listener.on_topic_event(topic, event);
        }
    }
}

impl TopicRegistry {
    /// Creates a registry holding only the control topic.
    pub fn new(logger: slog::Logger) -> Self {
        let control_topic = Topic::new(TopicId::control(), CONTROL_NAMESPACE.to_string());
        let mut topics = HashMap::new();
        topics.insert(CONTROL_NAMESPACE.to_string(), control_topic.clone());

        TopicRegistry {
            logger,
            control_topic,
            state: Arc::new(Mutex::new(RegistryState {
                topics,
                listeners: Vec::new(),
                next_listener_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Listener callbacks can't leave the state half-updated, so a poisoned lock is still
        // consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// With `rewind`, every current topic is first replayed to `listener` as `Added`, atomically
    /// with the registration, so no topic is missed or seen twice.
    pub fn register_listener(&self, listener: Arc<dyn TopicListener>, rewind: bool) -> TopicListenerId {
        let mut state = self.lock();
        let id = TopicListenerId(state.next_listener_id);
        state.next_listener_id += 1;

        if rewind {
            for topic in state.topics.values() {
                listener.on_topic_event(topic, TopicEvent::Added);
            }
        }
        state.listeners.push((id, listener));

        id
    }

    pub fn deregister_listener(&self, id: TopicListenerId) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(existing, _)| *existing != id);

        state.listeners.len() != before
    }

    pub fn get_by_namespace(&self, namespace: &str) -> Option<Topic> {
        self.lock().topics.get(namespace).cloned()
    }

    pub fn get_by_id(&self, id: &TopicId) -> Option<Topic> {
        self.lock().topics.values().find(|topic| topic.id() == id).cloned()
    }

    /// The control topic is registered for the registry's whole lifetime.
    pub fn control_topic(&self) -> Topic {
        self.control_topic.clone()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.lock().topics.values().cloned().collect()
    }

    /// Registers a new topic with a fresh, empty log. If the namespace is already taken, the
    /// existing topic is returned and nothing is announced.
    pub fn provision_topic(&self, id: TopicId, namespace: &str) -> Topic {
        let mut state = self.lock();
        if let Some(existing) = state.topics.get(namespace) {
            return existing.clone();
        }

        let topic = Topic::new(id, namespace.to_string());
        state.topics.insert(namespace.to_string(), topic.clone());
        slog::info!(self.logger, "Provisioned topic {:?}", topic);
        state.notify(&topic, TopicEvent::Added);

        topic
    }

    /// Returns false if `topic` isn't registered (anymore), or is the control topic.
    pub fn remove(&self, topic: &Topic) -> bool {
        if topic.is_control() {
            return false;
        }

        let mut state = self.lock();
        match state.topics.get(topic.namespace()) {
            Some(existing) if existing == topic => {}
            _ => return false,
        }

        state.topics.remove(topic.namespace());
        slog::info!(self.logger, "Removed topic {:?}", topic);
        state.notify(topic, TopicEvent::Removed);

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(String, TopicEvent)>>,
    }

    impl TopicListener for Recorder {
        fn on_topic_event(&self, topic: &Topic, event: TopicEvent) {
            self.events
                .lock()
                .unwrap()
                .push((topic.namespace().to_string(), event));
        }
    }

    fn registry() -> TopicRegistry {
        TopicRegistry::new(slog::Logger::root(slog::Discard, slog::o!()))
    }

    #[test]
    fn starts_with_control_topic() {
        let registry = registry();
        let control = registry.control_topic();

        assert!(control.is_control());
        assert_eq!(control.id(), &TopicId::control());
        assert_eq!(registry.topics().len(), 1);
        assert!(!registry.remove(&control));
        assert_eq!(registry.get_by_namespace(CONTROL_NAMESPACE), Some(control));
    }

    #[test]
    fn provision_is_idempotent_per_namespace() {
        let registry = registry();
        let recorder = Arc::new(Recorder::default());
        registry.register_listener(recorder.clone(), false);

        let first = registry.provision_topic(TopicId::new("a"), "orders");
        let second = registry.provision_topic(TopicId::new("b"), "orders");

        assert_eq!(first, second);
        assert_eq!(second.id(), &TopicId::new("a"));
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![("orders".to_string(), TopicEvent::Added)]
        );
        assert_eq!(registry.get_by_id(&TopicId::new("a")), Some(first));
    }

    #[test]
    fn rewind_replays_existing_topics_before_live_events() {
        let registry = registry();
        registry.provision_topic(TopicId::new("a"), "orders");

        let rewound = Arc::new(Recorder::default());
        let live_only = Arc::new(Recorder::default());
        registry.register_listener(rewound.clone(), true);
        registry.register_listener(live_only.clone(), false);

        registry.provision_topic(TopicId::new("b"), "payments");

        let mut replayed = rewound.events.lock().unwrap().clone();
        let live = replayed.split_off(2);
        replayed.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            replayed,
            vec![
                ("@system".to_string(), TopicEvent::Added),
                ("orders".to_string(), TopicEvent::Added),
            ]
        );
        assert_eq!(live, vec![("payments".to_string(), TopicEvent::Added)]);
        assert_eq!(
            *live_only.events.lock().unwrap(),
            vec![("payments".to_string(), TopicEvent::Added)]
        );
    }

    #[test]
    fn remove_fires_once_and_stops_after_deregister() {
        let registry = registry();
        let recorder = Arc::new(Recorder::default());
        let id = registry.register_listener(recorder.clone(), false);

        let orders = registry.provision_topic(TopicId::new("a"), "orders");
        assert!(registry.remove(&orders));
        assert!(!registry.remove(&orders));
        assert_eq!(registry.get_by_namespace("orders"), None);

        assert!(registry.deregister_listener(id));
        registry.provision_topic(TopicId::new("b"), "payments");

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                ("orders".to_string(), TopicEvent::Added),
                ("orders".to_string(), TopicEvent::Removed),
            ]
        );
    }

    #[test]
    fn remove_ignores_stale_topic_with_same_namespace() {
        let registry = registry();
        let stale = registry.provision_topic(TopicId::new("a"), "orders");
        registry.remove(&stale);
        let fresh = registry.provision_topic(TopicId::new("b"), "orders");

        assert!(!registry.remove(&stale));
        assert_eq!(registry.get_by_namespace("orders"), Some(fresh));
    }
}
