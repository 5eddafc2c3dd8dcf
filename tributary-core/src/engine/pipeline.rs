//! The fold loop of a single engine run.

use std::fmt::Debug;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures_util::future::ready;
use futures_util::stream::{self, BoxStream, StreamExt};

use super::Shared;
use crate::config::ReducerFailurePolicy;
use crate::error::{BoxError, EngineError, SharedError};
use crate::feature::{Reducer, ReducerSource};

/// A reducer (or the failure to build one) tagged with the index of the
/// feature it came from. `None` marks that feature's completion.
pub(crate) type Tagged<S> = (usize, Option<Result<Reducer<S>, BoxError>>);

/// Subscribe to every feature's reducers and merge them in arrival order.
pub(crate) fn merge<S: 'static>(
    features: &[Arc<dyn ReducerSource<S>>],
) -> BoxStream<'static, Tagged<S>> {
    stream::select_all(features.iter().enumerate().map(|(index, feature)| {
        feature
            .reducers()
            .map(move |item| (index, Some(item)))
            .chain(stream::once(ready((index, None))))
            .boxed()
    }))
    .boxed()
}

pub(crate) struct Fold<S, M> {
    shared: Arc<Shared<S, M>>,
    generation: u64,
    current: S,
    published: Option<S>,
}

impl<S, M> Fold<S, M>
where
    S: Clone + Debug + Send + Sync + 'static,
    M: Clone + Debug + Send + Sync + 'static,
{
    /// Load the initial state and publish it.
    ///
    /// Returns `None` when the run already failed.
    pub(crate) fn start(shared: Arc<Shared<S, M>>, generation: u64) -> Option<Self> {
        let config = &shared.config;
        let initial = match config.initial.load(&config.transient_resetter) {
            Ok(state) => state,
            Err(error) => {
                config
                    .logger
                    .log_error(&shared.origin, "Failed to load the initial state", &error);
                let error = EngineError::from(error);
                Self::fail(&shared, generation, error);
                return None;
            }
        };

        let mut fold = Self {
            shared,
            generation,
            current: initial.clone(),
            published: None,
        };
        match fold.emit(initial) {
            Ok(()) => Some(fold),
            Err(error) => {
                Self::fail(&fold.shared, generation, error);
                None
            }
        }
    }

    pub(crate) async fn run(mut self, mut reducers: BoxStream<'static, Tagged<S>>) {
        while let Some((index, item)) = reducers.next().await {
            let Some(item) = item else {
                let name = self.shared.config.features[index].name();
                self.shared
                    .config
                    .logger
                    .log(&self.shared.origin, &format!("{name} completed"));
                continue;
            };
            if let Err(error) = self.step(index, item) {
                Self::fail(&self.shared, self.generation, error);
                return;
            }
            if self.shared.hub.generation() != self.generation {
                return;
            }
        }

        let shared = &self.shared;
        shared.config.logger.log(&shared.origin, "Unexpected completion");
        let hub = shared.hub.clone();
        let generation = self.generation;
        shared.config.scheduler.schedule(Box::new(move || {
            hub.complete(generation);
        }));
    }

    fn step(&mut self, index: usize, item: Result<Reducer<S>, BoxError>) -> Result<(), EngineError> {
        let shared = Arc::clone(&self.shared);
        let config = &shared.config;

        let reducer = match item {
            Ok(reducer) => reducer,
            Err(error) => {
                let error = SharedError::from(error);
                let name = config.features[index].name();
                config.logger.log_error(
                    &shared.origin,
                    &format!("{name} failed to emit a reducer"),
                    &error,
                );
                match &config.error_reducer_factory {
                    Some(factory) => factory(&error),
                    None => return Err(EngineError::Feature(error)),
                }
            }
        };

        let cleaned = (config.transient_resetter)(&self.current);
        let next = match reducer.apply(&cleaned) {
            Ok(next) => next,
            Err(error) => {
                let error = SharedError::from(error);
                config
                    .logger
                    .log_error(&shared.origin, "Failed to apply a reducer", &error);
                match (config.reducer_failures, &config.error_reducer_factory) {
                    (ReducerFailurePolicy::Intercept, Some(factory)) => factory(&error)
                        .apply(&cleaned)
                        .map_err(|e| EngineError::Reducer(SharedError::from(e)))?,
                    _ => return Err(EngineError::Reducer(error)),
                }
            }
        };

        self.current = next.clone();
        self.emit(next)
    }

    /// Filter, persist, map and deliver one state, then feed it back to
    /// the features.
    fn emit(&mut self, state: S) -> Result<(), EngineError> {
        let shared = Arc::clone(&self.shared);
        let config = &shared.config;
        config
            .logger
            .log(&shared.origin, &format!("Calculating {state:?}"));

        let _writes = shared.writes.lock();
        if shared.hub.generation() != self.generation {
            config
                .logger
                .log(&shared.origin, &format!("Dropping {state:?}: the run has ended"));
            return Ok(());
        }

        let duplicate = match (&config.state_filter, &self.published) {
            (Some(equal), Some(previous)) => equal(previous, &state),
            _ => false,
        };

        if duplicate {
            config.logger.log(&shared.origin, "Skipping an equal state");
        } else {
            if let Some(storage) = config.initial.storage() {
                storage.save(&state)?;
            }
            let model = (config.state_to_model)(&state);
            config
                .logger
                .log(&shared.origin, &format!("Emitting {model:?}"));

            let hub = shared.hub.clone();
            let generation = self.generation;
            config.scheduler.schedule(Box::new(move || {
                hub.publish(generation, model);
            }));
            self.published = Some(state.clone());
        }

        for feature in &config.features {
            feature.context(&state);
        }
        Ok(())
    }

    fn fail(shared: &Shared<S, M>, generation: u64, error: EngineError) {
        {
            let _writes = shared.writes.lock();
            if shared.hub.generation() != generation {
                return;
            }
            shared.failed.store(true, Ordering::SeqCst);
        }
        shared
            .config
            .logger
            .log_error(&shared.origin, "Terminating the state stream", &error);
        let hub = shared.hub.clone();
        shared.config.scheduler.schedule(Box::new(move || {
            hub.fail(generation, error);
        }));
    }
}
