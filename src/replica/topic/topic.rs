use crate::replica::write_ahead_log::{new_topic_log, SharedTopicLog};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Namespace of the topic carrying cluster administration commands.
pub const CONTROL_NAMESPACE: &str = "@system";

// Every node registers the control topic on its own at startup, so its id must be fixed rather
// than generated.
const CONTROL_TOPIC_ID: &str = "system";

#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        TopicId(id.into())
    }

    /// A fresh random id. Only the leader generates ids; followers learn them from the control
    /// log.
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();

        TopicId(id)
    }

    pub fn control() -> Self {
        TopicId::new(CONTROL_TOPIC_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Topic is one independently replicated log. Clones share the same log.
#[derive(Clone)]
pub struct Topic {
    inner: Arc<TopicInner>,
}

struct TopicInner {
    id: TopicId,
    namespace: String,
    log: SharedTopicLog,
}

impl Topic {
    pub(crate) fn new(id: TopicId, namespace: String) -> Self {
        Topic {
            inner: Arc::new(TopicInner {
                id,
                namespace,
                log: new_topic_log(),
            }),
        }
    }

    pub fn id(&self) -> &TopicId {
        &self.inner.id
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn is_control(&self) -> bool {
        self.inner.namespace == CONTROL_NAMESPACE
    }

    pub(crate) fn log(&self) -> &SharedTopicLog {
        &self.inner.log
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Topic {}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.inner.namespace, self.inner.id)
    }
}
