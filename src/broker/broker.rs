//! The event broker: registration, dispatch, and the trigger family.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BrokerError, ErrorReporter, LogReporter};

use super::event_data::{Empty, EventData};
use super::main_context::{MainContext, Task, ThreadPinnedContext};
use super::sticky::StickyStore;
use super::subscription::{Invoker, Subscriber, Subscription, ThreadMode};
use super::topic::Topic;
use super::tree::TopicTree;

/// Builder for [`EventBroker`], with injectable collaborators.
///
/// Defaults: a [`ThreadPinnedContext`] pinning "main" to the constructing
/// thread, and a tracing-backed [`LogReporter`].
#[derive(Default)]
pub struct EventBrokerBuilder {
    main: Option<Arc<dyn MainContext>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl EventBrokerBuilder {
    /// Use the given main-context collaborator.
    pub fn main_context(mut self, context: Arc<dyn MainContext>) -> Self {
        self.main = Some(context);
        self
    }

    /// Use the given error reporter.
    pub fn error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Build the broker.
    pub fn build(self) -> EventBroker {
        EventBroker {
            tree: TopicTree::new(),
            sticky: StickyStore::new(),
            registered: Mutex::new(HashMap::new()),
            main: self
                .main
                .unwrap_or_else(|| Arc::new(ThreadPinnedContext::new())),
            reporter: self.reporter.unwrap_or_else(|| Arc::new(LogReporter)),
            next_seq: AtomicU64::new(0),
        }
    }
}

/// Publish/subscribe event broker with hierarchical, dot-separated topic
/// addressing.
///
/// Subscriptions are indexed into a topic trie at their literal endpoint;
/// triggering resolves a topic (a trailing `*` expands to all descendants of
/// its prefix), gathers the matched subscriptions, orders them by priority
/// then registration order, and invokes each one, honoring thread affinity
/// and exact payload-type matching. Sticky triggers additionally store their
/// payload for replay to late subscribers.
///
/// ## Example
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use topicbus::{EventBroker, Invoker, Subscriber, Subscription};
///
/// struct Scoreboard {
///     log: Arc<Mutex<Vec<String>>>,
/// }
///
/// impl Subscriber for Scoreboard {
///     fn subscriptions(&self) -> Vec<Subscription> {
///         let log = Arc::clone(&self.log);
///         vec![Subscription::new(
///             "game.over",
///             Invoker::no_arg(move || log.lock().unwrap().push("over".into())),
///         )]
///     }
/// }
///
/// let broker = EventBroker::new();
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let scoreboard = Arc::new(Scoreboard { log: Arc::clone(&log) });
///
/// broker.register(&scoreboard);
/// broker.trigger("game.over").unwrap();
/// assert_eq!(*log.lock().unwrap(), ["over"]);
/// ```
pub struct EventBroker {
    tree: TopicTree,
    sticky: StickyStore,
    // Keyed by Arc data address; holding the Arc keeps the allocation (and
    // therefore the key) unique for as long as the object stays registered.
    registered: Mutex<HashMap<usize, Arc<dyn Subscriber>>>,
    main: Arc<dyn MainContext>,
    reporter: Arc<dyn ErrorReporter>,
    next_seq: AtomicU64,
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroker {
    /// Create a broker with default collaborators.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start building a broker with custom collaborators.
    pub fn builder() -> EventBrokerBuilder {
        EventBrokerBuilder::default()
    }

    /// Register an object's declared subscriptions.
    ///
    /// No-op when the object is already registered. Identity is the `Arc`
    /// allocation, and the broker holds a clone of the `Arc` until
    /// `unregister`, so a registered object's address can never be reused by
    /// a fresh allocation while it is tracked. For each declared
    /// subscription: a sticky one whose endpoint already has a stored
    /// payload is invoked immediately with it, through the same dispatch
    /// path as live triggers; then the subscription is inserted at the node
    /// of its literal endpoint. The whole set is published in one tree
    /// mutation, so a concurrent trigger sees either none or all of it.
    /// Subscriptions with a malformed or wildcard endpoint are reported and
    /// skipped.
    pub fn register<S>(&self, subscriber: &Arc<S>)
    where
        S: Subscriber + 'static,
    {
        let key = Self::identity(subscriber);
        {
            let mut registered = self.registered.lock();
            if registered.contains_key(&key) {
                return;
            }
            registered.insert(key, Arc::clone(subscriber) as Arc<dyn Subscriber>);
        }

        let mut inserts = Vec::new();
        for mut subscription in subscriber.subscriptions() {
            let topic = match Topic::parse(subscription.endpoint()) {
                Ok(topic) => topic,
                Err(err) => {
                    self.reporter.report(&err);
                    continue;
                }
            };
            if topic.is_wildcard() {
                self.reporter.report(&BrokerError::InvalidTopic {
                    topic: subscription.endpoint().to_string(),
                    reason: "wildcards resolve at trigger time; subscribe to a literal topic",
                });
                continue;
            }

            if subscription.is_sticky() {
                if let Some(payload) = self.sticky.get(subscription.endpoint()) {
                    self.dispatch_one(&subscription, &payload);
                }
            }

            subscription.stamp(key, self.next_seq.fetch_add(1, Ordering::Relaxed));
            let node = self.tree.resolve(&topic)[0];
            inserts.push((node, subscription));
        }
        self.tree.insert_batch(inserts);
    }

    /// Remove an object's subscriptions, atomically with respect to dispatch
    /// snapshots. No-op when it is not registered; calling twice in a row is
    /// harmless.
    pub fn unregister<S>(&self, subscriber: &Arc<S>)
    where
        S: Subscriber + 'static,
    {
        let key = Self::identity(subscriber);
        if self.registered.lock().remove(&key).is_none() {
            return;
        }

        // Re-derive the declared list to learn the endpoints, then drop this
        // owner's entries from those nodes in one tree mutation.
        let mut nodes = Vec::new();
        for subscription in subscriber.subscriptions() {
            let Ok(topic) = Topic::parse(subscription.endpoint()) else {
                continue;
            };
            if topic.is_wildcard() {
                continue;
            }
            nodes.push(self.tree.resolve(&topic)[0]);
        }
        self.tree.remove_owned_batch(&nodes, key);
    }

    /// Whether an object is currently registered.
    pub fn is_registered<S>(&self, subscriber: &Arc<S>) -> bool
    where
        S: Subscriber + 'static,
    {
        self.registered
            .lock()
            .contains_key(&Self::identity(subscriber))
    }

    /// Trigger a topic with no payload; only no-argument handlers fire.
    pub fn trigger(&self, topic: &str) -> Result<(), BrokerError> {
        self.trigger_with(topic, Empty::shared())
    }

    /// Trigger a topic, delivering the payload to every matched subscription
    /// in (priority, registration) order.
    pub fn trigger_with(
        &self,
        topic: &str,
        payload: Arc<dyn EventData>,
    ) -> Result<(), BrokerError> {
        let parsed = Topic::parse(topic)?;
        let subscriptions = self.matched(&parsed);
        for subscription in &subscriptions {
            self.dispatch_one(subscription, &payload);
        }
        Ok(())
    }

    /// Sticky trigger with no payload.
    pub fn trigger_sticky(&self, topic: &str) -> Result<(), BrokerError> {
        self.trigger_sticky_with(topic, Empty::shared())
    }

    /// Trigger a topic, then store the payload for replay to late sticky
    /// subscribers.
    ///
    /// A wildcard endpoint is reported as [`BrokerError::InvalidStickyTarget`]
    /// and nothing is stored, but the trigger itself still delivers.
    pub fn trigger_sticky_with(
        &self,
        topic: &str,
        payload: Arc<dyn EventData>,
    ) -> Result<(), BrokerError> {
        let parsed = Topic::parse(topic)?;
        let subscriptions = self.matched(&parsed);
        for subscription in &subscriptions {
            self.dispatch_one(subscription, &payload);
        }

        if parsed.is_wildcard() {
            self.reporter.report(&BrokerError::InvalidStickyTarget {
                topic: topic.to_string(),
            });
        } else {
            self.sticky.set(topic, payload);
        }
        Ok(())
    }

    /// Awaitable trigger with no payload.
    pub async fn trigger_async(&self, topic: &str) -> Result<(), BrokerError> {
        self.trigger_async_with(topic, Empty::shared()).await
    }

    /// Awaitable trigger: each matched handler is awaited to completion
    /// before the next is invoked, so delivery never interleaves even when
    /// handlers suspend.
    pub async fn trigger_async_with(
        &self,
        topic: &str,
        payload: Arc<dyn EventData>,
    ) -> Result<(), BrokerError> {
        let parsed = Topic::parse(topic)?;
        let subscriptions = self.matched(&parsed);
        for subscription in &subscriptions {
            self.dispatch_one_async(subscription, &payload).await;
        }
        Ok(())
    }

    /// The stored sticky payload for an exact topic, if any.
    pub fn sticky_payload(&self, topic: &str) -> Option<Arc<dyn EventData>> {
        self.sticky.get(topic)
    }

    fn identity<S: Subscriber>(subscriber: &Arc<S>) -> usize {
        Arc::as_ptr(subscriber) as usize
    }

    /// Resolve, gather one consistent snapshot, and sort it into dispatch
    /// order. No lock is held once this returns, so handlers may re-enter
    /// the broker.
    fn matched(&self, topic: &Topic) -> Vec<Subscription> {
        let set = self.tree.resolve(topic);
        let mut subscriptions = self.tree.gather(&set);
        subscriptions.sort_by_key(Subscription::order_key);
        tracing::trace!(
            topic = topic.raw(),
            matched = subscriptions.len(),
            "dispatching"
        );
        subscriptions
    }

    fn dispatch_one(&self, subscription: &Subscription, payload: &Arc<dyn EventData>) {
        if let Some(err) = Self::payload_mismatch(subscription, payload) {
            self.reporter.report(&err);
            return;
        }

        let task: Task = match subscription.invoker() {
            Invoker::NoArg(f) => {
                let f = Arc::clone(f);
                Box::new(move || f())
            }
            Invoker::Typed { invoke, .. } => {
                let invoke = Arc::clone(invoke);
                let payload = Arc::clone(payload);
                Box::new(move || invoke(&payload))
            }
            Invoker::NoArgAsync(_) | Invoker::TypedAsync { .. } => {
                self.reporter.report(&BrokerError::SyncDispatchOfAsyncHandler {
                    endpoint: subscription.endpoint().to_string(),
                });
                return;
            }
        };

        if subscription.thread_mode() == ThreadMode::Main && !self.main.is_main() {
            self.main.enqueue(task);
        } else {
            task();
        }
    }

    async fn dispatch_one_async(&self, subscription: &Subscription, payload: &Arc<dyn EventData>) {
        if let Some(err) = Self::payload_mismatch(subscription, payload) {
            self.reporter.report(&err);
            return;
        }

        // Thread affinity is not marshaled on the async path; handlers run
        // on whatever context drives the future.
        match subscription.invoker() {
            Invoker::NoArg(f) => f(),
            Invoker::Typed { invoke, .. } => invoke(payload),
            Invoker::NoArgAsync(f) => f().await,
            Invoker::TypedAsync { invoke, .. } => invoke(payload).await,
        }
    }

    fn payload_mismatch(
        subscription: &Subscription,
        payload: &Arc<dyn EventData>,
    ) -> Option<BrokerError> {
        let (expects, expects_name) = subscription.invoker().expects()?;
        if payload.as_ref().concrete_type_id() == expects {
            return None;
        }
        Some(BrokerError::TypeMismatch {
            endpoint: subscription.endpoint().to_string(),
            expected: expects_name,
            actual: payload.as_ref().type_label(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        endpoint: &'static str,
        hits: Arc<AtomicUsize>,
    }

    impl Subscriber for Counter {
        fn subscriptions(&self) -> Vec<Subscription> {
            let hits = Arc::clone(&self.hits);
            vec![Subscription::new(
                self.endpoint,
                Invoker::no_arg(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            )]
        }
    }

    #[test]
    fn trigger_without_subscribers_is_ok() {
        let broker = EventBroker::new();
        assert!(broker.trigger("nobody.listens").is_ok());
    }

    #[test]
    fn register_trigger_unregister() {
        let broker = EventBroker::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::new(Counter {
            endpoint: "app.started",
            hits: Arc::clone(&hits),
        });

        broker.register(&counter);
        assert!(broker.is_registered(&counter));
        broker.trigger("app.started").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        broker.unregister(&counter);
        assert!(!broker.is_registered(&counter));
        broker.trigger("app.started").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_topics_fail_the_call() {
        let broker = EventBroker::new();
        assert!(matches!(
            broker.trigger("a.*.b"),
            Err(BrokerError::InvalidTopic { .. })
        ));
        assert!(matches!(
            broker.trigger(""),
            Err(BrokerError::InvalidTopic { .. })
        ));
    }

    #[test]
    fn register_is_idempotent_per_allocation() {
        let broker = EventBroker::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::new(Counter {
            endpoint: "tick",
            hits: Arc::clone(&hits),
        });

        broker.register(&counter);
        broker.register(&counter);
        broker.trigger("tick").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
