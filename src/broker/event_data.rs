//! Event payload types.

use std::any::{type_name, Any, TypeId};
use std::sync::{Arc, OnceLock};

/// Marker trait for event payloads.
///
/// Payloads travel through the broker as `Arc<dyn EventData>` and are matched
/// against a subscription's declared payload type by exact `TypeId` at
/// dispatch time. Implementing the trait is a one-liner:
///
/// ```
/// use topicbus::EventData;
///
/// #[derive(Debug, Clone)]
/// struct ScoreChanged {
///     delta: i32,
/// }
///
/// impl EventData for ScoreChanged {}
/// # let _ = ScoreChanged { delta: 1 }.delta;
/// ```
pub trait EventData: Any + Send + Sync {
    /// Human-readable name of the concrete payload type, used in
    /// type-mismatch error reports.
    fn type_label(&self) -> &'static str {
        type_name::<Self>()
    }
}

impl dyn EventData {
    /// Upcast to `&dyn Any` for downcasting to the concrete payload type.
    pub fn as_any(&self) -> &dyn Any {
        self
    }

    /// `TypeId` of the concrete payload type.
    pub fn concrete_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Borrow the payload as its concrete type, if it is one.
    pub fn downcast_ref<T: EventData>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

/// Sentinel payload for topics triggered without data.
///
/// Only no-argument handlers observe it; typed handlers are filtered out by
/// the dispatcher's exact-type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Empty;

impl EventData for Empty {}

impl Empty {
    /// The process-wide shared "no payload" sentinel.
    pub fn shared() -> Arc<dyn EventData> {
        static SHARED: OnceLock<Arc<Empty>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(Empty)).clone()
    }
}
