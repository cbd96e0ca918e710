//! Subscription descriptors: handler shape, priority, thread affinity,
//! stickiness.

use std::any::{type_name, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::event_data::EventData;

/// Which execution context a handler must run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadMode {
    /// Run on the designated main context; triggers from other threads
    /// enqueue the invocation there.
    Main,
    /// Run wherever the trigger happens.
    #[default]
    Current,
}

type SyncNoArgFn = Arc<dyn Fn() + Send + Sync>;
type SyncTypedFn = Arc<dyn Fn(&Arc<dyn EventData>) + Send + Sync>;
type AsyncNoArgFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
type AsyncTypedFn = Arc<dyn Fn(&Arc<dyn EventData>) -> BoxFuture<'static, ()> + Send + Sync>;

/// A handler callable, with its shape resolved once at construction time.
///
/// The dispatcher checks the declared payload `TypeId` of `Typed` /
/// `TypedAsync` invokers against the runtime payload before invoking;
/// no-argument invokers fire for any payload.
#[derive(Clone)]
pub enum Invoker {
    /// Synchronous handler taking no payload.
    NoArg(SyncNoArgFn),
    /// Synchronous handler taking one declared payload type.
    Typed {
        /// Exact payload type the handler accepts.
        expects: TypeId,
        /// Name of that type, for error reports.
        expects_name: &'static str,
        /// Pre-downcasting adapter around the user handler.
        invoke: SyncTypedFn,
    },
    /// Asynchronous handler taking no payload.
    NoArgAsync(AsyncNoArgFn),
    /// Asynchronous handler taking one declared payload type.
    TypedAsync {
        /// Exact payload type the handler accepts.
        expects: TypeId,
        /// Name of that type, for error reports.
        expects_name: &'static str,
        /// Pre-downcasting adapter around the user handler.
        invoke: AsyncTypedFn,
    },
}

impl Invoker {
    /// A synchronous handler that ignores the payload.
    pub fn no_arg(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::NoArg(Arc::new(f))
    }

    /// A synchronous handler for payloads of exactly `T`.
    pub fn typed<T: EventData>(f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self::Typed {
            expects: TypeId::of::<T>(),
            expects_name: type_name::<T>(),
            invoke: Arc::new(move |payload| {
                // Dispatcher pre-filters on TypeId before invoking.
                if let Some(data) = payload.as_ref().downcast_ref::<T>() {
                    f(data);
                }
            }),
        }
    }

    /// An asynchronous handler that ignores the payload.
    pub fn no_arg_async<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::NoArgAsync(Arc::new(move || Box::pin(f())))
    }

    /// An asynchronous handler for payloads of exactly `T`.
    ///
    /// The payload is cloned out of its shared `Arc` so the returned future
    /// owns its data and can outlive the dispatch loop iteration.
    pub fn typed_async<T, F, Fut>(f: F) -> Self
    where
        T: EventData + Clone,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::TypedAsync {
            expects: TypeId::of::<T>(),
            expects_name: type_name::<T>(),
            invoke: Arc::new(move |payload| match payload.as_ref().downcast_ref::<T>() {
                Some(data) => Box::pin(f(data.clone())),
                None => Box::pin(async {}),
            }),
        }
    }

    /// Declared payload type and its name, or `None` for no-argument shapes.
    pub fn expects(&self) -> Option<(TypeId, &'static str)> {
        match self {
            Self::NoArg(_) | Self::NoArgAsync(_) => None,
            Self::Typed {
                expects,
                expects_name,
                ..
            }
            | Self::TypedAsync {
                expects,
                expects_name,
                ..
            } => Some((*expects, expects_name)),
        }
    }

    /// Whether this handler must be awaited.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::NoArgAsync(_) | Self::TypedAsync { .. })
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoArg(_) => f.write_str("Invoker::NoArg"),
            Self::Typed { expects_name, .. } => {
                write!(f, "Invoker::Typed({expects_name})")
            }
            Self::NoArgAsync(_) => f.write_str("Invoker::NoArgAsync"),
            Self::TypedAsync { expects_name, .. } => {
                write!(f, "Invoker::TypedAsync({expects_name})")
            }
        }
    }
}

/// One registered handler: endpoint, invoker, priority, thread affinity,
/// stickiness.
///
/// Built with the `with_` chain and handed to the broker through a
/// [`Subscriber`]'s `subscriptions()` list:
///
/// ```
/// use topicbus::{Invoker, Subscription, ThreadMode};
///
/// let sub = Subscription::new("game.over", Invoker::no_arg(|| {}))
///     .with_priority(2)
///     .with_thread_mode(ThreadMode::Main)
///     .sticky();
/// assert_eq!(sub.endpoint(), "game.over");
/// assert!(sub.is_sticky());
/// ```
#[derive(Clone)]
pub struct Subscription {
    endpoint: String,
    invoker: Invoker,
    priority: i32,
    thread_mode: ThreadMode,
    sticky: bool,
    // Stamped by the broker at registration time.
    owner: usize,
    seq: u64,
}

impl Subscription {
    /// Create a subscription on a literal endpoint with default priority `0`,
    /// `ThreadMode::Current`, not sticky.
    pub fn new(endpoint: impl Into<String>, invoker: Invoker) -> Self {
        Self {
            endpoint: endpoint.into(),
            invoker,
            priority: 0,
            thread_mode: ThreadMode::default(),
            sticky: false,
            owner: 0,
            seq: 0,
        }
    }

    /// Set the dispatch priority. Lower values fire first.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the thread affinity.
    pub fn with_thread_mode(mut self, thread_mode: ThreadMode) -> Self {
        self.thread_mode = thread_mode;
        self
    }

    /// Request immediate replay of the endpoint's sticky payload at
    /// registration time.
    pub fn sticky(mut self) -> Self {
        self.sticky = true;
        self
    }

    /// The literal topic string this subscription was registered under.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The bound handler.
    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    /// Dispatch priority; lower fires first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Thread affinity of the handler.
    pub fn thread_mode(&self) -> ThreadMode {
        self.thread_mode
    }

    /// Whether sticky replay was requested.
    pub fn is_sticky(&self) -> bool {
        self.sticky
    }

    pub(crate) fn stamp(&mut self, owner: usize, seq: u64) {
        self.owner = owner;
        self.seq = seq;
    }

    pub(crate) fn owner(&self) -> usize {
        self.owner
    }

    /// Total dispatch order: priority ascending, registration order breaking
    /// ties.
    pub(crate) fn order_key(&self) -> (i32, u64) {
        (self.priority, self.seq)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("endpoint", &self.endpoint)
            .field("invoker", &self.invoker)
            .field("priority", &self.priority)
            .field("thread_mode", &self.thread_mode)
            .field("sticky", &self.sticky)
            .finish()
    }
}

/// Handler-discovery collaborator: an object that declares its subscriptions.
///
/// The broker consumes the returned list on `register` and re-derives it on
/// `unregister`; how the list is produced (hand-written, generated, built
/// from a registration table) is the implementor's concern.
pub trait Subscriber: Send + Sync {
    /// The subscriptions this object wants registered.
    fn subscriptions(&self) -> Vec<Subscription>;
}
