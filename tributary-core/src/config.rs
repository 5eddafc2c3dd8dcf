//! Engine Configuration
//!
//! A [`Configuration`] describes everything an engine needs: where the
//! initial state comes from, how a state becomes a published model, the
//! features to fold, and the optional policies. It is assembled with a
//! [`ConfigurationBuilder`] and is immutable once built.
//!
//! # Defaults
//!
//! | setting                 | default                                   |
//! |-------------------------|-------------------------------------------|
//! | `state_to_model`        | identity (the model is the state)         |
//! | `transient_resetter`    | identity                                  |
//! | `state_filter`          | none: every fold step is published        |
//! | `error_reducer_factory` | none: feature failures end the stream     |
//! | `reducer_failures`      | [`ReducerFailurePolicy::Terminate`]       |
//! | `scheduler`             | [`ImmediateScheduler`]                    |
//! | `logger`                | [`TracingLogger`]                         |
//! | `runtime`               | the tokio runtime current at `build()`    |

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::engine::{ImmediateScheduler, Scheduler};
use crate::error::{ConfigError, SharedError, StorageError};
use crate::feature::{Reducer, ReducerSource};
use crate::logger::{Logger, SharedLogger, TracingLogger};
use crate::storage::Storage;

pub(crate) type ModelFn<S, M> = Arc<dyn Fn(&S) -> M + Send + Sync>;
pub(crate) type ResetFn<S> = Arc<dyn Fn(&S) -> S + Send + Sync>;
pub(crate) type FilterFn<S> = Arc<dyn Fn(&S, &S) -> bool + Send + Sync>;
pub(crate) type ErrorReducerFn<S> = Arc<dyn Fn(&SharedError) -> Reducer<S> + Send + Sync>;

/// Where an engine's first state comes from.
pub enum InitialState<S> {
    /// A literal value. Nothing is persisted.
    Value(S),

    /// Loaded from the storage when a run starts (and passed through the
    /// transient resetter). Every published state is saved to it.
    Storage(Arc<dyn Storage<S>>),
}

impl<S: Clone> InitialState<S> {
    pub(crate) fn load(&self, reset: &ResetFn<S>) -> Result<S, StorageError> {
        match self {
            Self::Value(state) => Ok(state.clone()),
            Self::Storage(storage) => storage.load().map(|state| reset(&state)),
        }
    }

    pub(crate) fn storage(&self) -> Option<&Arc<dyn Storage<S>>> {
        match self {
            Self::Value(_) => None,
            Self::Storage(storage) => Some(storage),
        }
    }
}

/// What happens when a reducer fails while being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReducerFailurePolicy {
    /// The state stream ends with the failure.
    #[default]
    Terminate,

    /// The failure goes through the error-reducer factory, like a feature
    /// failure. Without a factory this behaves like `Terminate`.
    Intercept,
}

/// Immutable description of an engine.
pub struct Configuration<S, M> {
    pub(crate) initial: InitialState<S>,
    pub(crate) state_to_model: ModelFn<S, M>,
    pub(crate) features: Vec<Arc<dyn ReducerSource<S>>>,
    pub(crate) transient_resetter: ResetFn<S>,
    pub(crate) state_filter: Option<FilterFn<S>>,
    pub(crate) error_reducer_factory: Option<ErrorReducerFn<S>>,
    pub(crate) reducer_failures: ReducerFailurePolicy,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) logger: SharedLogger,
    pub(crate) runtime: Handle,
}

impl<S> Configuration<S, S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Start a configuration publishing the states themselves.
    pub fn builder() -> ConfigurationBuilder<S, S> {
        ConfigurationBuilder {
            initial: None,
            state_to_model: Arc::new(S::clone),
            features: Vec::new(),
            transient_resetter: Arc::new(S::clone),
            state_filter: None,
            error_reducer_factory: None,
            reducer_failures: ReducerFailurePolicy::default(),
            scheduler: Arc::new(ImmediateScheduler),
            logger: Arc::new(TracingLogger),
            runtime: None,
        }
    }
}

impl<S, M> Configuration<S, M> {
    /// Number of features to fold.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// The logger shared by the engine.
    pub fn logger(&self) -> &SharedLogger {
        &self.logger
    }

    /// Whether states are persisted.
    pub fn has_storage(&self) -> bool {
        matches!(self.initial, InitialState::Storage(_))
    }
}

impl<S, M> fmt::Debug for Configuration<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("features", &self.features.len())
            .field("has_storage", &self.has_storage())
            .field("has_state_filter", &self.state_filter.is_some())
            .field("has_error_reducer_factory", &self.error_reducer_factory.is_some())
            .field("reducer_failures", &self.reducer_failures)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Configuration`].
pub struct ConfigurationBuilder<S, M> {
    initial: Option<InitialState<S>>,
    state_to_model: ModelFn<S, M>,
    features: Vec<Arc<dyn ReducerSource<S>>>,
    transient_resetter: ResetFn<S>,
    state_filter: Option<FilterFn<S>>,
    error_reducer_factory: Option<ErrorReducerFn<S>>,
    reducer_failures: ReducerFailurePolicy,
    scheduler: Arc<dyn Scheduler>,
    logger: SharedLogger,
    runtime: Option<Handle>,
}

impl<S, M> ConfigurationBuilder<S, M>
where
    S: Clone + Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    /// Start from a literal state. Replaces any storage set before.
    pub fn initial_state(mut self, state: S) -> Self {
        self.initial = Some(InitialState::Value(state));
        self
    }

    /// Load the initial state from `storage` and save every published
    /// state to it. Replaces any initial state set before.
    pub fn storage<St>(mut self, storage: St) -> Self
    where
        St: Storage<S> + 'static,
    {
        self.initial = Some(InitialState::Storage(Arc::new(storage)));
        self
    }

    /// Publish `state_to_model(state)` instead of the state.
    pub fn state_to_model<N, F>(self, state_to_model: F) -> ConfigurationBuilder<S, N>
    where
        F: Fn(&S) -> N + Send + Sync + 'static,
    {
        ConfigurationBuilder {
            initial: self.initial,
            state_to_model: Arc::new(state_to_model),
            features: self.features,
            transient_resetter: self.transient_resetter,
            state_filter: self.state_filter,
            error_reducer_factory: self.error_reducer_factory,
            reducer_failures: self.reducer_failures,
            scheduler: self.scheduler,
            logger: self.logger,
            runtime: self.runtime,
        }
    }

    /// Add one feature.
    pub fn feature<F>(mut self, feature: Arc<F>) -> Self
    where
        F: ReducerSource<S> + 'static,
    {
        self.features.push(feature);
        self
    }

    /// Add several features.
    pub fn features<I>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ReducerSource<S>>>,
    {
        self.features.extend(features);
        self
    }

    /// Clear transient properties of the previous state before each
    /// reducer is applied.
    pub fn transient_resetter<F>(mut self, resetter: F) -> Self
    where
        F: Fn(&S) -> S + Send + Sync + 'static,
    {
        self.transient_resetter = Arc::new(resetter);
        self
    }

    /// Skip publishing a state when `equal(previous, next)` holds.
    pub fn state_filter<F>(mut self, equal: F) -> Self
    where
        F: Fn(&S, &S) -> bool + Send + Sync + 'static,
    {
        self.state_filter = Some(Arc::new(equal));
        self
    }

    /// Skip publishing a state equal to the previous one.
    pub fn distinct_states(self) -> Self
    where
        S: PartialEq,
    {
        self.state_filter(|previous, next| previous == next)
    }

    /// Turn feature failures into reducers instead of ending the stream.
    pub fn error_reducer_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&SharedError) -> Reducer<S> + Send + Sync + 'static,
    {
        self.error_reducer_factory = Some(Arc::new(factory));
        self
    }

    /// Choose what happens when a reducer fails while applied.
    pub fn reducer_failures(mut self, policy: ReducerFailurePolicy) -> Self {
        self.reducer_failures = policy;
        self
    }

    /// Deliver published states through `scheduler`.
    pub fn scheduler<Sc>(mut self, scheduler: Sc) -> Self
    where
        Sc: Scheduler + 'static,
    {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Report engine activity to `logger`.
    pub fn logger<L>(mut self, logger: L) -> Self
    where
        L: Logger + 'static,
    {
        self.logger = Arc::new(logger);
        self
    }

    /// Report engine activity to a shared logger.
    pub fn shared_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Run the engine's pipeline on `runtime`.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<Configuration<S, M>, ConfigError> {
        if self.features.is_empty() {
            return Err(ConfigError::NoFeatures);
        }
        let initial = self.initial.ok_or(ConfigError::MissingInitialState)?;
        let runtime = self
            .runtime
            .or_else(|| Handle::try_current().ok())
            .ok_or(ConfigError::MissingRuntime)?;

        Ok(Configuration {
            initial,
            state_to_model: self.state_to_model,
            features: self.features,
            transient_resetter: self.transient_resetter,
            state_filter: self.state_filter,
            error_reducer_factory: self.error_reducer_factory,
            reducer_failures: self.reducer_failures,
            scheduler: self.scheduler,
            logger: self.logger,
            runtime,
        })
    }
}
