//! Single-Result Feature
//!
//! Each event produces exactly one reducer.

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;

use super::{Feature, Reducer, ReducerSource, ReducerStream};
use crate::error::BoxError;
use crate::logger::{NoopLogger, SharedLogger};
use crate::reactive::Subject;

type CreateFn<E, S> = Arc<dyn Fn(E) -> Result<Reducer<S>, BoxError> + Send + Sync>;

/// A feature mapping every event to one reducer.
///
/// # Example
///
/// ```rust,ignore
/// let append = SingleResultFeature::new(|n: i32| {
///     Reducer::new(move |s: &String| format!("{s}{n}"))
/// });
/// append.trigger(1);
/// ```
pub struct SingleResultFeature<E, S> {
    name: String,
    events: Subject<E>,
    create: CreateFn<E, S>,
    logger: SharedLogger,
}

impl<E, S> SingleResultFeature<E, S>
where
    E: Clone + fmt::Debug + Send + 'static,
    S: 'static,
{
    /// Create a feature from an infallible event-to-reducer function.
    pub fn new<F>(create: F) -> Self
    where
        F: Fn(E) -> Reducer<S> + Send + Sync + 'static,
    {
        Self::fallible(move |event| Ok(create(event)))
    }

    /// Create a feature whose reducer construction may fail.
    ///
    /// A failure is passed on as an `Err` item of the reducer stream.
    pub fn fallible<F>(create: F) -> Self
    where
        F: Fn(E) -> Result<Reducer<S>, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: "single-result-feature".to_string(),
            events: Subject::new(),
            create: Arc::new(create),
            logger: Arc::new(NoopLogger),
        }
    }

    /// Set the name used in log messages.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Report events and reducers to `logger`.
    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }
}

impl<E, S> ReducerSource<S> for SingleResultFeature<E, S>
where
    E: Clone + fmt::Debug + Send + 'static,
    S: 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn reducers(&self) -> ReducerStream<S> {
        let name = self.name.clone();
        let create = Arc::clone(&self.create);
        let logger = Arc::clone(&self.logger);

        self.events
            .subscribe()
            .map(move |event| {
                logger.log(&name, &format!("Processing event {event:?}"));
                let result = create(event);
                match &result {
                    Ok(reducer) => logger.log(&name, &format!("Emitting reducer {reducer:?}")),
                    Err(error) => logger.log_error(&name, "Failed to create reducer", &**error),
                }
                result
            })
            .boxed()
    }
}

impl<E, S> Feature<E, S> for SingleResultFeature<E, S>
where
    E: Clone + fmt::Debug + Send + 'static,
    S: 'static,
{
    fn trigger(&self, event: E) {
        self.logger.log(&self.name, &format!("Received event {event:?}"));
        self.events.emit(event);
    }
}

impl<E, S> fmt::Debug for SingleResultFeature<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleResultFeature")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
