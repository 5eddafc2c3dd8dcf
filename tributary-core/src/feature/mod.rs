//! Features
//!
//! A feature turns external events into [`Reducer`]s. The engine merges the
//! reducer streams of all its features and folds them over the state.
//!
//! # Contract
//!
//! - [`Feature::trigger`] injects an event. It never blocks; events sent
//!   while the feature's reducer stream is not being consumed are dropped.
//! - [`ReducerSource::context`] receives every state the engine computes.
//!   A feature may ignore it, read it while building reducers, or derive
//!   new events from it.
//! - [`ReducerSource::reducers`] wires the feature and returns its reducer
//!   stream. The engine calls it once per run.
//!
//! # Variants
//!
//! - [`SingleResultFeature`]: one reducer per event.
//! - [`MultipleResultFeature`]: a stream of reducers per event.
//! - [`DslFeature`]: assembled with [`feature()`] from declarative
//!   settings, with an optional start event and state-derived events.

mod dsl;
mod multiple;
mod single;

pub use dsl::{feature, DslFeature, FeatureBuilder};
pub use multiple::MultipleResultFeature;
pub use single::SingleResultFeature;

use std::fmt;
use std::sync::Arc;

use futures_util::stream::BoxStream;

use crate::error::BoxError;

/// A transition from one state to the next.
///
/// A reducer must not have side effects beyond computing the new state. It
/// may fail, which ends the engine's state stream unless the engine is
/// configured to intercept reducer failures.
pub struct Reducer<S> {
    apply: Arc<dyn Fn(&S) -> Result<S, BoxError> + Send + Sync>,
}

impl<S: 'static> Reducer<S> {
    /// Create a reducer that cannot fail.
    pub fn new<F>(apply: F) -> Self
    where
        F: Fn(&S) -> S + Send + Sync + 'static,
    {
        Self {
            apply: Arc::new(move |state| Ok(apply(state))),
        }
    }

    /// Create a reducer that may fail.
    pub fn try_new<F>(apply: F) -> Self
    where
        F: Fn(&S) -> Result<S, BoxError> + Send + Sync + 'static,
    {
        Self {
            apply: Arc::new(apply),
        }
    }

    /// A reducer returning its input unchanged.
    pub fn identity() -> Self
    where
        S: Clone,
    {
        Self::new(S::clone)
    }

    /// Compute the state following `state`.
    pub fn apply(&self, state: &S) -> Result<S, BoxError> {
        (self.apply)(state)
    }
}

impl<S> Clone for Reducer<S> {
    fn clone(&self) -> Self {
        Self {
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<S> fmt::Debug for Reducer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer").finish_non_exhaustive()
    }
}

/// The stream of reducers a feature produces.
///
/// An `Err` item reports that the feature failed to build a reducer.
pub type ReducerStream<S> = BoxStream<'static, Result<Reducer<S>, BoxError>>;

/// The side of a feature the engine talks to.
pub trait ReducerSource<S>: Send + Sync {
    /// Name used as the origin of log messages.
    fn name(&self) -> &str;

    /// Receives each state computed by the engine, including states an
    /// equality filter kept from being published.
    fn context(&self, state: &S) {
        let _ = state;
    }

    /// Wire the feature and return its reducers.
    fn reducers(&self) -> ReducerStream<S>;
}

/// A reducer source accepting external events of type `E`.
pub trait Feature<E, S>: ReducerSource<S> {
    /// Inject an external event.
    fn trigger(&self, event: E);
}
