//! Multiple-Result Feature
//!
//! Each event produces a stream of zero or more reducers. Streams started
//! by different events run concurrently and their reducers are interleaved
//! as they arrive. Reducers from one event keep their order.

use std::fmt;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};

use super::{Feature, Reducer, ReducerSource, ReducerStream};
use crate::error::BoxError;
use crate::logger::{NoopLogger, SharedLogger};
use crate::reactive::Subject;

type CreateFn<E, S> = Arc<dyn Fn(E) -> ReducerStream<S> + Send + Sync>;

/// A feature mapping every event to a stream of reducers.
///
/// # Example
///
/// ```rust,ignore
/// let progress = MultipleResultFeature::new(|n: i32| {
///     futures_util::stream::iter(vec![
///         Ok(Reducer::new(|s: &String| s.len().to_string())),
///         Ok(Reducer::new(move |s: &String| format!("{s}{n}"))),
///     ])
/// });
/// ```
pub struct MultipleResultFeature<E, S> {
    name: String,
    events: Subject<E>,
    create: CreateFn<E, S>,
    logger: SharedLogger,
}

impl<E, S> MultipleResultFeature<E, S>
where
    E: Clone + fmt::Debug + Send + 'static,
    S: 'static,
{
    /// Create a feature from an event-to-stream function.
    pub fn new<F, St>(create: F) -> Self
    where
        F: Fn(E) -> St + Send + Sync + 'static,
        St: Stream<Item = Result<Reducer<S>, BoxError>> + Send + 'static,
    {
        Self {
            name: "multiple-result-feature".to_string(),
            events: Subject::new(),
            create: Arc::new(move |event| create(event).boxed()),
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

impl<E, S> ReducerSource<S> for MultipleResultFeature<E, S>
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
                let name = name.clone();
                let logger = Arc::clone(&logger);
                create(event)
                    .inspect(move |item| match item {
                        Ok(reducer) => logger.log(&name, &format!("Emitting reducer {reducer:?}")),
                        Err(error) => logger.log_error(&name, "Failed to create reducer", &**error),
                    })
                    .boxed()
            })
            .flatten_unordered(None)
            .boxed()
    }
}

impl<E, S> Feature<E, S> for MultipleResultFeature<E, S>
where
    E: Clone + fmt::Debug + Send + 'static,
    S: 'static,
{
    fn trigger(&self, event: E) {
        self.logger.log(&self.name, &format!("Received event {event:?}"));
        self.events.emit(event);
    }
}

impl<E, S> fmt::Debug for MultipleResultFeature<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipleResultFeature")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
