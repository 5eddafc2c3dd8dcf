//! Subscriber types for the reactive primitives.
//!
//! Every consumer attached to a [`Subject`](super::Subject),
//! [`StateContext`](super::StateContext) or [`ReplayHub`](super::ReplayHub)
//! gets a [`SubscriberId`] and reads values through a [`Subscription`].

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

/// Unique identifier for a subscriber.
///
/// Each attached consumer gets a unique ID. Producers use it to find the
/// consumer's channel when it detaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type DetachHook = Box<dyn FnOnce(SubscriberId) + Send>;

/// The receiving end of a subscription.
///
/// A `Subscription` is a [`Stream`]. Values already queued for it (such as a
/// replayed latest value) can be taken without waiting via
/// [`try_recv`](Self::try_recv). Dropping it detaches the subscriber.
pub struct Subscription<T> {
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<T>,
    on_detach: Option<DetachHook>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(id: SubscriberId, receiver: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            id,
            receiver,
            on_detach: None,
        }
    }

    /// Run `hook` with this subscriber's ID when the subscription is dropped.
    pub(crate) fn on_detach<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(SubscriberId) + Send + 'static,
    {
        self.on_detach = Some(Box::new(hook));
        self
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Take the next queued value without waiting.
    ///
    /// Returns `None` when nothing is queued right now, or when the
    /// producer has finished.
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(hook) = self.on_detach.take() {
            hook(self.id);
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("counted", &self.on_detach.is_some())
            .finish()
    }
}

/// Create a subscription together with the sender feeding it.
pub(crate) fn channel<T>() -> (SubscriberId, mpsc::UnboundedSender<T>, Subscription<T>) {
    let id = SubscriberId::new();
    let (sender, receiver) = mpsc::unbounded_channel();
    (id, sender, Subscription::new(id, receiver))
}
