//! Hierarchical publish/subscribe event broker.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EventBroker                          │
//! │  register/unregister · trigger / trigger_async / sticky     │
//! └─────────────────────────────────────────────────────────────┘
//!        │                 │                        │
//!        ▼                 ▼                        ▼
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────────────┐
//! │  TopicTree  │   │ StickyStore  │   │    MainContext      │
//! │ trie + memo │   │ topic → last │   │ Main-affinity queue │
//! │  resolver   │   │   payload    │   │                     │
//! └─────────────┘   └──────────────┘   └─────────────────────┘
//! ```
//!
//! Topics are dot-separated (`"game.player.jumped"`); a trailing `*` expands
//! at trigger time to every descendant of its prefix. Dispatch order is
//! deterministic: priority ascending, ties broken by registration order.

mod broker;
mod event_data;
mod main_context;
mod sticky;
mod subscription;
mod topic;
mod tree;

pub use broker::{EventBroker, EventBrokerBuilder};
pub use event_data::{Empty, EventData};
pub use main_context::{MainContext, Task, ThreadPinnedContext};
pub use sticky::StickyStore;
pub use subscription::{Invoker, Subscriber, Subscription, ThreadMode};
pub use topic::{Topic, WILDCARD};
pub use tree::{NodeId, TopicTree};
