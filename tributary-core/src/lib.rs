//! Tributary Core
//!
//! This crate provides a reactive state engine. Independent features turn
//! events into reducers (pure state transitions), and the engine folds
//! them into one state stream shared by every subscriber.
//!
//! It implements:
//!
//! - Reactive primitives (subjects, state contexts, replaying hubs)
//! - Features built from single reducers, reducer streams, or a builder
//! - The engine: merge, fold, filter, persist and deliver
//! - Storage adapters for in-memory and file persistence
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Multicast channels the engine and features are wired with
//! - `feature`: Reducers and the features producing them
//! - `engine`: The fold pipeline and delivery schedulers
//! - `storage`: Where the initial state comes from and states are saved
//! - `config`: Assembling an engine
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tributary_core::{Configuration, Engine, Feature, Reducer, SingleResultFeature};
//!
//! // A feature appending the triggered number to the state
//! let add = Arc::new(SingleResultFeature::new(|n: i32| {
//!     Reducer::new(move |s: &String| format!("{s}{n}"))
//! }));
//!
//! let engine = Engine::new(
//!     Configuration::builder()
//!         .initial_state("initial!".to_string())
//!         .feature(Arc::clone(&add))
//!         .build()?,
//! );
//!
//! // Subscribing starts the engine and replays "initial!"
//! let mut states = engine.states();
//!
//! add.trigger(1);
//! // states now yields "initial!1"
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod feature;
pub mod logger;
pub mod reactive;
pub mod storage;

pub use config::{Configuration, ConfigurationBuilder, InitialState, ReducerFailurePolicy};
pub use engine::{Engine, ImmediateScheduler, Scheduler, SerialScheduler, StateStream};
pub use error::{BoxError, ConfigError, EngineError, SharedError, StorageError};
pub use feature::{
    feature, DslFeature, Feature, FeatureBuilder, MultipleResultFeature, Reducer, ReducerSource,
    ReducerStream, SingleResultFeature,
};
pub use logger::{Logger, NoopLogger, SharedLogger, TracingLogger};
pub use storage::{
    InitialValueStorage, MemoryStorage, QueueFileStorage, Storage, StorageExt,
};
