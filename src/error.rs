use thiserror::Error;

/// Error type for broker operations.
///
/// Structural errors (`InvalidTopic`) fail the call that caused them before
/// any dispatch happens. Per-subscription errors (`TypeMismatch`,
/// `SyncDispatchOfAsyncHandler`) and `InvalidStickyTarget` are routed to the
/// [`ErrorReporter`] instead, so one misconfigured handler cannot block
/// delivery to the rest.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// The topic string violates the grammar (empty, empty segment, or a
    /// wildcard in a non-final position).
    #[error("invalid topic {topic:?}: {reason}")]
    InvalidTopic {
        /// The offending topic string.
        topic: String,
        /// What the grammar check rejected.
        reason: &'static str,
    },

    /// A sticky trigger targeted a wildcard endpoint. Sticky payloads are
    /// stored under exact topics only.
    #[error("sticky trigger on wildcard endpoint {topic:?} is not supported")]
    InvalidStickyTarget {
        /// The wildcard endpoint that was rejected.
        topic: String,
    },

    /// A subscription declared a payload type that does not match the
    /// runtime payload. The subscription is skipped; dispatch continues.
    #[error("subscription on {endpoint:?} expects payload {expected}, got {actual}")]
    TypeMismatch {
        /// Endpoint the subscription was registered under.
        endpoint: String,
        /// Declared payload type of the subscription.
        expected: &'static str,
        /// Concrete type of the payload actually triggered.
        actual: &'static str,
    },

    /// An async handler was reached from the synchronous trigger path.
    /// The subscription is skipped; use `trigger_async` to deliver to it.
    #[error("subscription on {endpoint:?} has an async handler; it can only run via trigger_async")]
    SyncDispatchOfAsyncHandler {
        /// Endpoint the subscription was registered under.
        endpoint: String,
    },
}

/// Collaborator that surfaces per-subscription dispatch errors.
///
/// How errors are presented (log, console, UI) is up to the implementation;
/// the broker only guarantees that every isolated failure passes through
/// here exactly once.
pub trait ErrorReporter: Send + Sync {
    /// Report a non-fatal dispatch error.
    fn report(&self, error: &BrokerError);
}

/// Default reporter: emits errors through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &BrokerError) {
        tracing::error!(%error, "event dispatch error");
    }
}
