//! Replay Hub
//!
//! A [`ReplayHub`] is the multicast end of an engine. It caches the latest
//! value, replays it to every new subscriber, and remembers how the stream
//! ended.
//!
//! # Sessions
//!
//! The producer feeding a hub may be torn down and restarted (when the last
//! subscriber leaves and a new one arrives). Each run is a session with its
//! own generation number. Values from an earlier generation are ignored, so
//! a late delivery from an aborted run never leaks into the next one.
//!
//! # Termination
//!
//! Completion and failure are sticky. A subscriber attaching afterwards
//! receives the cached value (after completion) or only the failure, and
//! then its stream ends.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use super::subscriber::{channel, SubscriberId, Subscription};

/// How a hub's stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal<E> {
    Completed,
    Failed(E),
}

struct HubState<T, E> {
    generation: u64,
    latest: Option<T>,
    terminal: Option<Terminal<E>>,
    senders: IndexMap<SubscriberId, UnboundedSender<Result<T, E>>>,
    /// Subscriptions still alive, including those whose sender was closed
    /// by a terminal event.
    attached: usize,
}

/// Multicast with replay of the latest value.
pub struct ReplayHub<T, E> {
    state: Arc<Mutex<HubState<T, E>>>,
}

impl<T, E> ReplayHub<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create an empty hub at generation 0.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                generation: 0,
                latest: None,
                terminal: None,
                senders: IndexMap::new(),
                attached: 0,
            })),
        }
    }

    /// Attach a subscriber.
    ///
    /// The cached value (if any) is queued on the subscription before this
    /// returns. Returns the subscription and the number of attached
    /// subscribers, this one included.
    pub fn subscribe(&self) -> (Subscription<Result<T, E>>, usize) {
        let (id, sender, subscription) = channel();
        let mut guard = self.state.lock();
        guard.attached += 1;

        match guard.terminal.clone() {
            Some(Terminal::Failed(error)) => {
                let _ = sender.send(Err(error));
            }
            Some(Terminal::Completed) => {
                if let Some(latest) = guard.latest.clone() {
                    let _ = sender.send(Ok(latest));
                }
            }
            None => {
                if let Some(latest) = guard.latest.clone() {
                    let _ = sender.send(Ok(latest));
                }
                guard.senders.insert(id, sender);
            }
        }

        (subscription, guard.attached)
    }

    /// Detach a subscriber. Returns how many remain attached.
    pub fn detach(&self, id: SubscriberId) -> usize {
        let mut guard = self.state.lock();
        guard.senders.shift_remove(&id);
        guard.attached = guard.attached.saturating_sub(1);
        guard.attached
    }

    /// Publish a value of session `generation`.
    ///
    /// Returns `false` when the value was discarded because the session is
    /// stale or the hub already terminated.
    pub fn publish(&self, generation: u64, value: T) -> bool {
        let mut guard = self.state.lock();
        if guard.generation != generation || guard.terminal.is_some() {
            return false;
        }
        guard
            .senders
            .retain(|_, sender| sender.send(Ok(value.clone())).is_ok());
        guard.latest = Some(value);
        true
    }

    /// End session `generation` with a failure.
    pub fn fail(&self, generation: u64, error: E) -> bool {
        let mut guard = self.state.lock();
        if guard.generation != generation || guard.terminal.is_some() {
            return false;
        }
        for (_, sender) in guard.senders.drain(..) {
            let _ = sender.send(Err(error.clone()));
        }
        guard.terminal = Some(Terminal::Failed(error));
        true
    }

    /// End session `generation` normally.
    pub fn complete(&self, generation: u64) -> bool {
        let mut guard = self.state.lock();
        if guard.generation != generation || guard.terminal.is_some() {
            return false;
        }
        // Dropping the senders ends every subscriber's stream.
        guard.senders.clear();
        guard.terminal = Some(Terminal::Completed);
        true
    }

    /// Start a new session: forget the cached value and return the new
    /// generation. A terminated hub is left as it is.
    pub fn reset(&self) -> u64 {
        let mut guard = self.state.lock();
        if guard.terminal.is_none() {
            guard.generation += 1;
            guard.latest = None;
        }
        guard.generation
    }

    /// The current session's generation.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// The cached latest value.
    pub fn latest(&self) -> Option<T> {
        self.state.lock().latest.clone()
    }

    /// How the hub ended, if it did.
    pub fn terminal(&self) -> Option<Terminal<E>> {
        self.state.lock().terminal.clone()
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().attached
    }
}

impl<T, E> Default for ReplayHub<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for ReplayHub<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T, E> fmt::Debug for ReplayHub<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.state.lock();
        f.debug_struct("ReplayHub")
            .field("generation", &guard.generation)
            .field("has_value", &guard.latest.is_some())
            .field("terminated", &guard.terminal.is_some())
            .field("attached", &guard.attached)
            .finish()
    }
}
