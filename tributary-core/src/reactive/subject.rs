//! Subject Implementation
//!
//! A [`Subject`] multicasts values to every subscriber attached at the time
//! of emission. It keeps no history: a value emitted while nobody listens
//! is lost, and a new subscriber only sees what is emitted after it
//! attached.
//!
//! Features use a subject as their event intake, so `trigger` never blocks
//! and works from any thread.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use super::subscriber::{channel, SubscriberId, Subscription};

/// Publish-only multicast of values of type `T`.
pub struct Subject<T> {
    subscribers: Arc<Mutex<IndexMap<SubscriberId, UnboundedSender<T>>>>,
}

impl<T> Subject<T>
where
    T: Clone + Send + 'static,
{
    /// Create a subject with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(IndexMap::new())),
        }
    }

    /// Send `value` to every current subscriber.
    ///
    /// Subscribers that have been dropped are pruned here.
    pub fn emit(&self, value: T) {
        self.subscribers
            .lock()
            .retain(|_, sender| sender.send(value.clone()).is_ok());
    }

    /// Attach a new subscriber.
    pub fn subscribe(&self) -> Subscription<T> {
        let (id, sender, subscription) = channel();
        self.subscribers.lock().insert(id, sender);
        subscription
    }

    /// Number of subscribers still listening.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|_, sender| !sender.is_closed());
        subscribers.len()
    }
}

impl<T> Default for Subject<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_drops_values_without_subscribers() {
        let subject = Subject::new();
        subject.emit(1);

        let mut subscription = subject.subscribe();
        assert_eq!(subscription.try_recv(), None);

        subject.emit(2);
        assert_eq!(subscription.try_recv(), Some(2));
    }

    #[test]
    fn subject_multicasts_to_all_subscribers() {
        let subject = Subject::new();
        let mut first = subject.subscribe();
        let mut second = subject.subscribe();

        subject.emit("event");

        assert_eq!(first.try_recv(), Some("event"));
        assert_eq!(second.try_recv(), Some("event"));
    }

    #[test]
    fn subject_prunes_dropped_subscribers() {
        let subject = Subject::<i32>::new();
        let first = subject.subscribe();
        let _second = subject.subscribe();
        assert_eq!(subject.subscriber_count(), 2);

        drop(first);
        assert_eq!(subject.subscriber_count(), 1);
    }

    #[test]
    fn subject_clone_shares_subscribers() {
        let subject = Subject::<i32>::new();
        let clone = subject.clone();
        let mut subscription = subject.subscribe();

        clone.emit(7);
        assert_eq!(subscription.try_recv(), Some(7));
    }
}
