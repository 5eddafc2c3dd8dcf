//! Integration Tests for the State Engine
//!
//! These tests drive engines end to end through the public API: features
//! are triggered from outside and the published models are read from the
//! state stream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::ready;
use futures_util::stream::{self, StreamExt};
use tokio::runtime::Handle;
use tokio::time::timeout;

use tributary_core::{
    feature, BoxError, ConfigError, Configuration, Engine, EngineError, Feature,
    MemoryStorage, MultipleResultFeature, QueueFileStorage, Reducer, ReducerFailurePolicy,
    SerialScheduler, SingleResultFeature, StateStream, Storage, StorageExt,
};

async fn next<M>(states: &mut StateStream<M>) -> Result<M, EngineError> {
    timeout(Duration::from_secs(2), states.next())
        .await
        .expect("timed out waiting for a model")
        .expect("state stream ended early")
}

async fn take<M>(states: &mut StateStream<M>, count: usize) -> Vec<M> {
    let mut models = Vec::with_capacity(count);
    for _ in 0..count {
        models.push(next(states).await.expect("unexpected failure"));
    }
    models
}

fn appender() -> Arc<SingleResultFeature<i32, String>> {
    Arc::new(SingleResultFeature::new(|n: i32| {
        Reducer::new(move |s: &String| format!("{s}{n}"))
    }))
}

fn zapper() -> Arc<SingleResultFeature<i32, String>> {
    Arc::new(SingleResultFeature::fallible(|n: i32| {
        if n == 0 {
            Err("zap".into())
        } else {
            Ok(Reducer::new(move |s: &String| format!("{s}{n}")))
        }
    }))
}

#[tokio::test]
async fn engine_needs_a_feature() {
    let result = Configuration::<String, String>::builder()
        .initial_state("initial!".to_string())
        .build();

    assert_eq!(result.unwrap_err(), ConfigError::NoFeatures);
}

#[tokio::test]
async fn triggered_event_is_appended_to_initial_state() {
    let add = appender();
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("initial!".to_string())
            .feature(Arc::clone(&add))
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    add.trigger(1);

    assert_eq!(take(&mut states, 2).await, vec!["initial!", "initial!1"]);
}

#[tokio::test]
async fn every_reducer_of_an_event_is_published() {
    let add = Arc::new(MultipleResultFeature::new(|n: i32| {
        stream::iter(vec![
            Ok::<_, BoxError>(Reducer::new(|s: &String| s.len().to_string())),
            Ok(Reducer::new(move |s: &String| format!("{s}{n}"))),
        ])
    }));
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("initial!".to_string())
            .feature(Arc::clone(&add))
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    add.trigger(1);

    assert_eq!(take(&mut states, 3).await, vec!["initial!", "8", "81"]);
}

#[tokio::test]
async fn feature_failure_terminates_every_subscriber() {
    let zap = zapper();
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("initial!".to_string())
            .feature(Arc::clone(&zap))
            .build()
            .unwrap(),
    );

    let mut first = engine.states();
    let mut second = engine.states();
    zap.trigger(0);

    assert_eq!(next(&mut first).await.unwrap(), "initial!");
    assert_eq!(next(&mut first).await.unwrap_err().to_string(), "zap");
    assert_eq!(next(&mut second).await.unwrap(), "initial!");
    assert_eq!(next(&mut second).await.unwrap_err().to_string(), "zap");
    assert!(first.next().await.is_none());

    let mut late = engine.states();
    let error = late.try_recv().unwrap().unwrap_err();
    assert!(matches!(error, EngineError::Feature(_)));
    assert!(late.next().await.is_none());
}

#[tokio::test]
async fn error_reducer_factory_keeps_the_stream_alive() {
    let zap = zapper();
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("initial!".to_string())
            .feature(Arc::clone(&zap))
            .error_reducer_factory(|error| {
                let message = error.to_string();
                Reducer::new(move |s: &String| format!("{s}<{message}>"))
            })
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    zap.trigger(0);
    zap.trigger(1);

    assert_eq!(
        take(&mut states, 3).await,
        vec!["initial!", "initial!<zap>", "initial!<zap>1"]
    );
}

fn exploding() -> Arc<SingleResultFeature<i32, String>> {
    Arc::new(SingleResultFeature::new(|n: i32| {
        Reducer::try_new(move |s: &String| {
            if n == 0 {
                Err("boom".into())
            } else {
                Ok(format!("{s}{n}"))
            }
        })
    }))
}

#[tokio::test]
async fn failing_reducer_terminates_by_default() {
    let boom = exploding();
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("initial!".to_string())
            .feature(Arc::clone(&boom))
            .error_reducer_factory(|_| Reducer::identity())
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    boom.trigger(0);

    assert_eq!(next(&mut states).await.unwrap(), "initial!");
    let error = next(&mut states).await.unwrap_err();
    assert!(matches!(error, EngineError::Reducer(_)));
    assert_eq!(error.to_string(), "boom");
}

#[tokio::test]
async fn failing_reducer_can_be_intercepted() {
    let boom = exploding();
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("initial!".to_string())
            .feature(Arc::clone(&boom))
            .error_reducer_factory(|error| {
                let message = error.to_string();
                Reducer::new(move |s: &String| format!("{s}<{message}>"))
            })
            .reducer_failures(ReducerFailurePolicy::Intercept)
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    boom.trigger(0);
    boom.trigger(2);

    assert_eq!(
        take(&mut states, 3).await,
        vec!["initial!", "initial!<boom>", "initial!<boom>2"]
    );
}

#[derive(Debug, Clone, PartialEq)]
struct Toast {
    shown: bool,
}

fn toast_feature() -> Arc<MultipleResultFeature<(), Toast>> {
    Arc::new(MultipleResultFeature::new(|_: ()| {
        stream::iter(vec![
            Ok::<_, BoxError>(Reducer::new(|_: &Toast| Toast { shown: true })),
            Ok(Reducer::identity()),
        ])
    }))
}

#[tokio::test]
async fn transient_flag_lives_for_one_publication() {
    let toast = toast_feature();
    let engine = Engine::new(
        Configuration::builder()
            .initial_state(Toast { shown: false })
            .feature(Arc::clone(&toast))
            .transient_resetter(|_: &Toast| Toast { shown: false })
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    toast.trigger(());

    let shown: Vec<bool> = take(&mut states, 3).await.into_iter().map(|t| t.shown).collect();
    assert_eq!(shown, vec![false, true, false]);
}

#[tokio::test]
async fn equality_filter_compares_states_after_their_transition() {
    let toast = toast_feature();
    let engine = Engine::new(
        Configuration::builder()
            .initial_state(Toast { shown: false })
            .feature(Arc::clone(&toast))
            .transient_resetter(|_: &Toast| Toast { shown: false })
            .distinct_states()
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    toast.trigger(());

    let shown: Vec<bool> = take(&mut states, 3).await.into_iter().map(|t| t.shown).collect();
    assert_eq!(shown, vec![false, true, false]);
}

#[tokio::test]
async fn equality_filter_skips_repeated_states() {
    let add = Arc::new(SingleResultFeature::new(|n: i32| {
        Reducer::new(move |s: &String| if n == 0 { s.clone() } else { format!("{s}{n}") })
    }));
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("a".to_string())
            .feature(Arc::clone(&add))
            .distinct_states()
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    add.trigger(0);
    add.trigger(1);
    add.trigger(0);
    add.trigger(2);

    assert_eq!(take(&mut states, 3).await, vec!["a", "a1", "a12"]);
}

#[tokio::test]
async fn one_event_runs_once_for_all_subscribers() {
    let built = Arc::new(AtomicUsize::new(0));
    let applied = Arc::new(AtomicUsize::new(0));
    let add = {
        let built = Arc::clone(&built);
        let applied = Arc::clone(&applied);
        Arc::new(SingleResultFeature::new(move |n: i32| {
            built.fetch_add(1, Ordering::SeqCst);
            let applied = Arc::clone(&applied);
            Reducer::new(move |s: &String| {
                applied.fetch_add(1, Ordering::SeqCst);
                format!("{s}{n}")
            })
        }))
    };
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("initial!".to_string())
            .feature(Arc::clone(&add))
            .build()
            .unwrap(),
    );

    let mut first = engine.states();
    let mut second = engine.states();
    add.trigger(1);

    assert_eq!(take(&mut first, 2).await, vec!["initial!", "initial!1"]);
    assert_eq!(take(&mut second, 2).await, vec!["initial!", "initial!1"]);
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(applied.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn late_subscriber_receives_the_latest_model() {
    let add = appender();
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("initial!".to_string())
            .feature(Arc::clone(&add))
            .build()
            .unwrap(),
    );

    let mut early = engine.states();
    add.trigger(1);
    add.trigger(2);
    assert_eq!(take(&mut early, 3).await, vec!["initial!", "initial!1", "initial!12"]);

    let mut late = engine.states();
    assert_eq!(late.try_recv().unwrap().unwrap(), "initial!12");

    add.trigger(3);
    assert_eq!(next(&mut late).await.unwrap(), "initial!123");
    assert_eq!(next(&mut early).await.unwrap(), "initial!123");
}

#[tokio::test]
async fn every_published_state_is_saved() {
    let storage = Arc::new(MemoryStorage::new("stored".to_string()));
    let add = appender();
    let engine = Engine::new(
        Configuration::builder()
            .storage(Arc::clone(&storage))
            .feature(Arc::clone(&add))
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    assert_eq!((*storage).load().unwrap(), "stored");
    add.trigger(1);

    assert_eq!(take(&mut states, 2).await, vec!["stored", "stored1"]);
    assert_eq!((*storage).load().unwrap(), "stored1");
}

#[tokio::test]
async fn stored_state_is_reset_before_publication() {
    let storage = MemoryStorage::new(Toast { shown: true });
    let engine = Engine::new(
        Configuration::builder()
            .storage(storage)
            .feature(toast_feature())
            .transient_resetter(|_: &Toast| Toast { shown: false })
            .build()
            .unwrap(),
    );

    let mut states = engine.states();

    assert_eq!(next(&mut states).await.unwrap(), Toast { shown: false });
}

#[tokio::test]
async fn file_storage_resumes_where_the_last_engine_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("states.queue");

    let add = appender();
    let engine = Engine::new(
        Configuration::builder()
            .storage(QueueFileStorage::<String>::new(&path).initial_value(|| "fresh".to_string()))
            .feature(Arc::clone(&add))
            .build()
            .unwrap(),
    );
    let mut states = engine.states();
    add.trigger(1);
    assert_eq!(take(&mut states, 2).await, vec!["fresh", "fresh1"]);
    drop(states);

    let add = appender();
    let engine = Engine::new(
        Configuration::builder()
            .storage(QueueFileStorage::<String>::new(&path).initial_value(|| "fresh".to_string()))
            .feature(Arc::clone(&add))
            .build()
            .unwrap(),
    );
    let mut states = engine.states();
    add.trigger(2);
    assert_eq!(take(&mut states, 2).await, vec!["fresh1", "fresh12"]);
}

#[tokio::test]
async fn serial_scheduler_delivers_in_order() {
    let add = appender();
    let engine = Engine::new(
        Configuration::builder()
            .initial_state(String::new())
            .feature(Arc::clone(&add))
            .scheduler(SerialScheduler::new(&Handle::current()))
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    for n in 1..=4 {
        add.trigger(n);
    }

    assert_eq!(take(&mut states, 5).await, vec!["", "1", "12", "123", "1234"]);
}

#[tokio::test]
async fn dsl_feature_reacts_to_start_event_and_states() {
    let dsl = Arc::new(
        feature::<i32, String>()
            .start_with(|| 0)
            .triggered_single(|n, _state| async move {
                Ok::<_, BoxError>(Reducer::new(move |s: &String| format!("{s}{n}")))
            })
            .state_events(|states| {
                states.filter_map(|s: String| ready(s.ends_with('0').then_some(1)))
            })
            .on_error(|_| Reducer::identity())
            .build()
            .unwrap(),
    );
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("x".to_string())
            .feature(Arc::clone(&dsl))
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    assert_eq!(take(&mut states, 3).await, vec!["x", "x0", "x01"]);

    dsl.trigger(5);
    assert_eq!(next(&mut states).await.unwrap(), "x015");
    assert_eq!(dsl.latest_state().as_deref(), Some("x015"));
}

#[tokio::test]
async fn features_are_folded_together() {
    let add = appender();
    let shout = Arc::new(SingleResultFeature::new(|_: ()| {
        Reducer::new(|s: &String| s.to_uppercase())
    }));
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("a".to_string())
            .feature(Arc::clone(&add))
            .feature(Arc::clone(&shout))
            .state_to_model(|s: &String| format!("<{s}>"))
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    add.trigger(1);
    assert_eq!(take(&mut states, 2).await, vec!["<a>", "<a1>"]);
    shout.trigger(());
    assert_eq!(next(&mut states).await.unwrap(), "<A1>");
}

#[tokio::test]
async fn engine_restarts_after_all_subscribers_leave() {
    let add = appender();
    let engine = Engine::new(
        Configuration::builder()
            .initial_state("initial!".to_string())
            .feature(Arc::clone(&add))
            .build()
            .unwrap(),
    );

    let mut states = engine.states();
    add.trigger(1);
    assert_eq!(take(&mut states, 2).await, vec!["initial!", "initial!1"]);
    drop(states);
    assert!(!engine.is_running());

    let mut states = engine.states();
    add.trigger(2);
    assert_eq!(take(&mut states, 2).await, vec!["initial!", "initial!2"]);
}
