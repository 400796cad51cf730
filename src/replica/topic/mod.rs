mod registry;
mod topic;

pub use registry::TopicEvent;
pub use registry::TopicListener;
pub use registry::TopicListenerId;
pub use registry::TopicRegistry;
pub use topic::Topic;
pub use topic::TopicId;
pub use topic::CONTROL_NAMESPACE;
