//! # topicbus
//!
//! A publish/subscribe event broker with hierarchical, dot-separated topic
//! addressing: trailing-`*` wildcard resolution, sticky (replayed) events,
//! priority-ordered deterministic delivery, thread-affinity enforcement, and
//! both synchronous and awaitable trigger paths.
//!
//! Objects declare their handlers through the [`Subscriber`] trait and are
//! registered with an [`EventBroker`]; triggering a topic resolves it against
//! a topic trie and delivers the payload to every matched subscription in
//! (priority, registration) order.

mod broker;
mod error;

pub use broker::{
    Empty, EventBroker, EventBrokerBuilder, EventData, Invoker, MainContext, NodeId, StickyStore,
    Subscriber, Subscription, Task, ThreadMode, ThreadPinnedContext, Topic, TopicTree, WILDCARD,
};
pub use error::{BrokerError, ErrorReporter, LogReporter};
