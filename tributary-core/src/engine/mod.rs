//! State Engine
//!
//! The engine folds the reducers of all its features into a single state
//! stream.
//!
//! # How it works
//!
//! 1. The first subscriber to [`Engine::states`] starts a run: the initial
//!    state is loaded (from storage, through the transient resetter, or the
//!    literal value), published, and pushed to every feature's context.
//! 2. Every feature's reducer stream is subscribed to and merged. Reducers
//!    are applied one at a time, in arrival order, each to the previous
//!    state with its transient properties cleared.
//! 3. Each new state is filtered against the last published one, saved,
//!    mapped to a model and delivered through the scheduler. Then it is
//!    fed back to the features.
//!
//! # Sharing
//!
//! All subscribers share one run. A subscriber arriving late receives the
//! latest model right away. When the last subscriber leaves, the run is
//! aborted and the feature streams are released; the next subscriber
//! starts a fresh run from the initial state.
//!
//! A failure ends the stream for every subscriber and is sticky: later
//! subscribers receive only the failure.
//!
//! # Example
//!
//! ```ignore
//! let add = Arc::new(SingleResultFeature::new(|n: i32| {
//!     Reducer::new(move |s: &String| format!("{s}{n}"))
//! }));
//! let engine = Engine::new(
//!     Configuration::builder()
//!         .initial_state("initial!".to_string())
//!         .feature(Arc::clone(&add))
//!         .build()?,
//! );
//!
//! let mut states = engine.states();
//! add.trigger(1);
//! // states yields "initial!", then "initial!1"
//! ```

mod pipeline;
mod scheduler;

pub use scheduler::{ImmediateScheduler, Job, Scheduler, SerialScheduler};

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::config::Configuration;
use crate::error::{BoxError, EngineError};
use crate::reactive::{ReplayHub, SubscriberId, Subscription, Terminal};

use pipeline::Fold;

/// The stream of models handed to each subscriber. It ends after an `Err`.
pub type StateStream<M> = Subscription<Result<M, EngineError>>;

fn next_engine_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub(crate) struct Shared<S, M> {
    pub(crate) origin: String,
    pub(crate) config: Configuration<S, M>,
    pub(crate) hub: ReplayHub<M, EngineError>,
    /// The pipeline task of the current run.
    session: Mutex<Option<JoinHandle<()>>>,
    /// Held while a run writes a state out (save, delivery, context feed)
    /// and while a run is retired. A retired run never writes again.
    pub(crate) writes: Mutex<()>,
    /// Set as soon as a run fails, before the failure is delivered.
    pub(crate) failed: AtomicBool,
}

impl<S, M> Shared<S, M>
where
    S: Clone + Debug + Send + Sync + 'static,
    M: Clone + Debug + Send + Sync + 'static,
{
    /// Start the run of session `generation`. Called with the session lock
    /// held, after the first subscriber attached.
    fn start(self: &Arc<Self>, generation: u64) -> Option<JoinHandle<()>> {
        self.config.logger.log(&self.origin, "Start of this run");

        let fold = Fold::start(Arc::clone(self), generation)?;
        // Subscribed before returning to the caller so that events
        // triggered right after subscribing are not lost.
        let reducers = pipeline::merge(&self.config.features);
        Some(self.config.runtime.spawn(fold.run(reducers)))
    }

    fn detach(&self, id: SubscriberId) {
        let mut session = self.session.lock();
        if self.hub.detach(id) > 0 {
            return;
        }
        if let Some(task) = session.take() {
            // Abort only lands at the task's next await; a step already
            // running is stopped by the generation change instead.
            task.abort();
            self.retire();
            self.config.logger.log(&self.origin, "End of this run");
        }
    }

    /// Move the hub past the current run's generation.
    ///
    /// A failed run keeps its generation so that its pending failure is
    /// still delivered.
    fn retire(&self) {
        let _writes = self.writes.lock();
        if !self.failed.load(Ordering::SeqCst) {
            self.hub.reset();
        }
    }
}

/// Folds features' reducers into a shared, replaying state stream.
pub struct Engine<S, M> {
    shared: Arc<Shared<S, M>>,
}

impl<S, M> Engine<S, M>
where
    S: Clone + Debug + Send + Sync + 'static,
    M: Clone + Debug + Send + Sync + 'static,
{
    pub fn new(config: Configuration<S, M>) -> Self {
        Self {
            shared: Arc::new(Shared {
                origin: format!("engine-{}", next_engine_id()),
                config,
                hub: ReplayHub::new(),
                session: Mutex::new(None),
                writes: Mutex::new(()),
                failed: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to the models.
    ///
    /// The first subscriber starts a run. The latest model, if any, is
    /// queued on the returned stream before this returns. Dropping the
    /// stream unsubscribes.
    pub fn states(&self) -> StateStream<M> {
        let mut session = self.shared.session.lock();
        let starting = session.is_none()
            && !self.shared.failed.load(Ordering::SeqCst)
            && self.shared.hub.terminal().is_none();
        // A new run must not replay the previous run's latest model.
        let generation = starting.then(|| self.shared.hub.reset());

        let (subscription, _) = self.shared.hub.subscribe();
        let weak: Weak<Shared<S, M>> = Arc::downgrade(&self.shared);
        let subscription = subscription.on_detach(move |id| {
            if let Some(shared) = weak.upgrade() {
                shared.detach(id);
            }
        });

        if let Some(generation) = generation {
            *session = self.shared.start(generation);
        }
        subscription
    }

    /// The latest published model.
    pub fn latest(&self) -> Option<M> {
        self.shared.hub.latest()
    }

    /// How the state stream ended, if it did.
    pub fn terminal(&self) -> Option<Terminal<EngineError>> {
        self.shared.hub.terminal()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.hub.subscriber_count()
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.shared
            .session
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Subscribe and hand every model to `display` on the engine's runtime.
    ///
    /// A failing `display` call is logged and the next model is still
    /// delivered. When the stream fails, `on_failure` is called once.
    /// Aborting the returned handle unsubscribes.
    pub fn display<D, F>(&self, mut display: D, on_failure: F) -> JoinHandle<()>
    where
        D: FnMut(M) -> Result<(), BoxError> + Send + 'static,
        F: FnOnce(&EngineError) + Send + 'static,
    {
        let mut states = self.states();
        let logger = Arc::clone(&self.shared.config.logger);
        let origin = self.shared.origin.clone();

        self.shared.config.runtime.spawn(async move {
            while let Some(item) = states.next().await {
                match item {
                    Ok(model) => {
                        if let Err(error) = display(model) {
                            logger.log_error(&origin, "Failure while displaying", &*error);
                        }
                    }
                    Err(error) => {
                        logger.log_error(&origin, "Unexpected failure", &error);
                        on_failure(&error);
                        return;
                    }
                }
            }
        })
    }
}

impl<S, M> Clone for Engine<S, M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, M> fmt::Debug for Engine<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("origin", &self.shared.origin)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
