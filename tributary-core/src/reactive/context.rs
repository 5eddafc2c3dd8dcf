//! State Context
//!
//! The context is the feedback channel from the engine to a feature: after
//! each fold step the engine pushes the new state into every feature's
//! context.
//!
//! # Implementation
//!
//! A [`StateContext`] remembers the most recent state. Features read it
//! when they turn an event into reducers, and watchers attached with
//! [`watch`](StateContext::watch) get the latest state immediately, then
//! every later one. A feature may be wired before or after the engine
//! starts pushing, and sees the same states either way.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use super::subscriber::{channel, SubscriberId, Subscription};

struct ContextState<S> {
    latest: Option<S>,
    watchers: IndexMap<SubscriberId, UnboundedSender<S>>,
}

/// Latest-state holder with replay to new watchers.
pub struct StateContext<S> {
    state: Arc<Mutex<ContextState<S>>>,
}

impl<S> StateContext<S>
where
    S: Clone + Send + 'static,
{
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ContextState {
                latest: None,
                watchers: IndexMap::new(),
            })),
        }
    }

    /// Record `state` as the latest and forward it to all watchers.
    pub fn push(&self, state: S) {
        let mut guard = self.state.lock();
        guard
            .watchers
            .retain(|_, sender| sender.send(state.clone()).is_ok());
        guard.latest = Some(state);
    }

    /// The most recent state, if one was ever pushed.
    pub fn latest(&self) -> Option<S> {
        self.state.lock().latest.clone()
    }

    /// Watch the states: the latest one first (if any), then each new one.
    pub fn watch(&self) -> Subscription<S> {
        let (id, sender, subscription) = channel();
        let mut guard = self.state.lock();
        if let Some(latest) = guard.latest.clone() {
            // The receiver is alive, so this cannot fail.
            let _ = sender.send(latest);
        }
        guard.watchers.insert(id, sender);
        subscription
    }
}

impl<S> Default for StateContext<S>
where
    S: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for StateContext<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<S> fmt::Debug for StateContext<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.state.lock();
        f.debug_struct("StateContext")
            .field("latest", &guard.latest)
            .field("watchers", &guard.watchers.len())
            .finish()
    }
}
