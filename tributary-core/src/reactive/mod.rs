//! Reactive Primitives
//!
//! This module implements the channels the engine and the features are
//! wired with. They are small, thread-safe and never block the caller.
//!
//! # Concepts
//!
//! ## Subjects
//!
//! A [`Subject`] multicasts values to whoever is listening right now. It is
//! the event intake of a feature: `trigger` emits into it.
//!
//! ## State contexts
//!
//! A [`StateContext`] holds the latest state and replays it to new
//! watchers. The engine pushes each fold step into every feature's context.
//!
//! ## Replay hubs
//!
//! A [`ReplayHub`] is what subscribers of an engine attach to. It replays
//! the latest value, keeps count of attached subscribers and remembers how
//! the stream terminated.
//!
//! # Implementation Notes
//!
//! Every subscriber owns an unbounded tokio channel, so a producer never
//! waits for a slow consumer, and per-subscriber ordering is the order of
//! emission. Producers hold a `parking_lot` mutex only while pushing into
//! the channels.

mod context;
mod hub;
mod subject;
mod subscriber;

pub use context::StateContext;
pub use hub::{ReplayHub, Terminal};
pub use subject::Subject;
pub use subscriber::{SubscriberId, Subscription};
