//! Feature DSL
//!
//! [`feature()`] starts a [`FeatureBuilder`]. Settings:
//!
//! | setting            | required               | effect                                     |
//! |--------------------|------------------------|--------------------------------------------|
//! | `triggered_stream` | this or the next one   | event and state to a stream of reducers    |
//! | `triggered_single` | this or the previous   | event and state to one (async) reducer     |
//! | `on_error`         | yes                    | turns a construction failure into a reducer|
//! | `start_with`       | no                     | event emitted first, when wired            |
//! | `state_events`     | no                     | derives events from the published states   |
//!
//! Each setting may be given once. `build()` reports the first setting that
//! was duplicated, or else the first mandatory one that is missing.
//!
//! # Behaviour
//!
//! Every event (start, external or state-derived) is paired with the latest
//! context state. Events arriving before the feature has seen any state are
//! dropped. When a triggered stream fails, its error is turned into a
//! reducer by `on_error` and that event's stream ends there.

use std::fmt;
use std::future::{ready, Future};
use std::sync::Arc;

use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, Stream, StreamExt};

use super::{Feature, Reducer, ReducerSource, ReducerStream};
use crate::error::{BoxError, ConfigError};
use crate::logger::{NoopLogger, SharedLogger};
use crate::reactive::{StateContext, Subject};

type TriggerFn<E, S> = Arc<dyn Fn(E, S) -> ReducerStream<S> + Send + Sync>;
type ErrorFn<S> = Arc<dyn Fn(BoxError) -> Reducer<S> + Send + Sync>;
type StateEventsFn<E, S> = Arc<dyn Fn(BoxStream<'static, S>) -> BoxStream<'static, E> + Send + Sync>;

/// Start describing a feature.
///
/// ```rust,ignore
/// let echo = feature::<String, String>()
///     .triggered_single(|event, _state| async move { Ok(Reducer::new(move |_| event.clone())) })
///     .on_error(|_| Reducer::identity())
///     .build()?;
/// ```
pub fn feature<E, S>() -> FeatureBuilder<E, S> {
    FeatureBuilder {
        triggered: None,
        on_error: None,
        start_with: None,
        state_events: None,
        name: None,
        logger: None,
        violation: None,
    }
}

/// Collects the settings of a [`DslFeature`].
pub struct FeatureBuilder<E, S> {
    triggered: Option<TriggerFn<E, S>>,
    on_error: Option<ErrorFn<S>>,
    start_with: Option<E>,
    state_events: Option<StateEventsFn<E, S>>,
    name: Option<String>,
    logger: Option<SharedLogger>,
    /// First duplicated setting, reported by `build()`.
    violation: Option<ConfigError>,
}

impl<E, S> FeatureBuilder<E, S>
where
    E: Clone + fmt::Debug + Send + 'static,
    S: Clone + Send + Sync + 'static,
{
    fn duplicate(&mut self, setting: &'static str) {
        if self.violation.is_none() {
            self.violation = Some(ConfigError::Duplicate(setting));
        }
    }

    fn set_triggered(mut self, setting: &'static str, triggered: TriggerFn<E, S>) -> Self {
        if self.triggered.is_some() {
            self.duplicate(setting);
        } else {
            self.triggered = Some(triggered);
        }
        self
    }

    /// Build reducers from each event and the current state as a stream.
    pub fn triggered_stream<F, St>(self, triggered: F) -> Self
    where
        F: Fn(E, S) -> St + Send + Sync + 'static,
        St: Stream<Item = Result<Reducer<S>, BoxError>> + Send + 'static,
    {
        self.set_triggered(
            "triggered_stream",
            Arc::new(move |event, state| triggered(event, state).boxed()),
        )
    }

    /// Build exactly one reducer from each event and the current state.
    pub fn triggered_single<F, Fut>(self, triggered: F) -> Self
    where
        F: Fn(E, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reducer<S>, BoxError>> + Send + 'static,
    {
        self.set_triggered(
            "triggered_single",
            Arc::new(move |event, state| triggered(event, state).into_stream().boxed()),
        )
    }

    /// Turn a failure of a triggered stream into a reducer. Mandatory.
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(BoxError) -> Reducer<S> + Send + Sync + 'static,
    {
        if self.on_error.is_some() {
            self.duplicate("on_error");
        } else {
            self.on_error = Some(Arc::new(on_error));
        }
        self
    }

    /// Emit an event first, as soon as the feature is wired.
    ///
    /// `first` runs once, when the feature is built.
    pub fn start_with<F>(mut self, first: F) -> Self
    where
        F: FnOnce() -> E,
    {
        if self.start_with.is_some() {
            self.duplicate("start_with");
        } else {
            self.start_with = Some(first());
        }
        self
    }

    /// Derive additional events from the stream of published states.
    ///
    /// `state_events` runs each time the feature is wired.
    pub fn state_events<F, St>(mut self, state_events: F) -> Self
    where
        F: Fn(BoxStream<'static, S>) -> St + Send + Sync + 'static,
        St: Stream<Item = E> + Send + 'static,
    {
        if self.state_events.is_some() {
            self.duplicate("state_events");
        } else {
            self.state_events = Some(Arc::new(move |states| state_events(states).boxed()));
        }
        self
    }

    /// Set the name used in log messages.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Report events and reducers to `logger`.
    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Validate the settings and create the feature.
    pub fn build(self) -> Result<DslFeature<E, S>, ConfigError> {
        if let Some(violation) = self.violation {
            return Err(violation);
        }
        let triggered = self
            .triggered
            .ok_or(ConfigError::Missing("triggered_stream or triggered_single"))?;
        let on_error = self.on_error.ok_or(ConfigError::Missing("on_error"))?;

        Ok(DslFeature {
            name: self.name.unwrap_or_else(|| "feature".to_string()),
            external: Subject::new(),
            context: StateContext::new(),
            triggered,
            on_error,
            start_with: self.start_with,
            state_events: self.state_events,
            logger: self.logger.unwrap_or_else(|| Arc::new(NoopLogger)),
        })
    }
}

/// A feature assembled from [`FeatureBuilder`] settings.
pub struct DslFeature<E, S> {
    name: String,
    external: Subject<E>,
    context: StateContext<S>,
    triggered: TriggerFn<E, S>,
    on_error: ErrorFn<S>,
    start_with: Option<E>,
    state_events: Option<StateEventsFn<E, S>>,
    logger: SharedLogger,
}

impl<E, S> DslFeature<E, S>
where
    E: Clone + fmt::Debug + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    /// The latest state this feature has seen.
    pub fn latest_state(&self) -> Option<S> {
        self.context.latest()
    }
}

impl<E, S> ReducerSource<S> for DslFeature<E, S>
where
    E: Clone + fmt::Debug + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn context(&self, state: &S) {
        self.context.push(state.clone());
    }

    fn reducers(&self) -> ReducerStream<S> {
        let first = stream::iter(self.start_with.clone());
        let external = first.chain(self.external.subscribe());
        let internal = match &self.state_events {
            Some(state_events) => state_events(self.context.watch().boxed()),
            None => stream::pending().boxed(),
        };

        let context = self.context.clone();
        let triggered = Arc::clone(&self.triggered);
        let on_error = Arc::clone(&self.on_error);
        let logger = Arc::clone(&self.logger);
        let name = self.name.clone();

        stream::select(external, internal)
            .filter_map(move |event| {
                let paired = match context.latest() {
                    Some(state) => Some((event, state)),
                    None => {
                        logger.log(&name, &format!("Dropping event {event:?}: no state yet"));
                        None
                    }
                };
                ready(paired)
            })
            .map(move |(event, state)| {
                let on_error = Arc::clone(&on_error);
                triggered(event, state)
                    .scan(false, move |failed, item| {
                        if *failed {
                            return ready(None);
                        }
                        let reducer = match item {
                            Ok(reducer) => reducer,
                            Err(error) => {
                                *failed = true;
                                on_error(error)
                            }
                        };
                        ready(Some(Ok::<_, BoxError>(reducer)))
                    })
                    .boxed()
            })
            .flatten_unordered(None)
            .boxed()
    }
}

impl<E, S> Feature<E, S> for DslFeature<E, S>
where
    E: Clone + fmt::Debug + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    fn trigger(&self, event: E) {
        self.logger.log(&self.name, &format!("Received event {event:?}"));
        self.external.emit(event);
    }
}

impl<E, S> fmt::Debug for DslFeature<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DslFeature")
            .field("name", &self.name)
            .field("has_start_event", &self.start_with.is_some())
            .field("has_state_events", &self.state_events.is_some())
            .finish_non_exhaustive()
    }
}
