//! Integration tests for effect cancellation
//!
//! A cancelled effect produces no observable completion, even when its
//! result was already on its way back to the store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use popseoul_core::{Effect, Reducer, SmallVec, async_effect, smallvec};
use popseoul_runtime::Store;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone, Debug, Default)]
struct FetchState {
    results: Vec<&'static str>,
    ticks: u32,
}

#[derive(Clone, Debug, PartialEq)]
enum FetchAction {
    Fetch { label: &'static str, after: Duration, latest_wins: bool },
    Fetched(&'static str),
    CancelFetch,
    CancelTwice,
    StartTimer,
    Tick,
    FetchThenTick,
}

const FETCH: &str = "fetch";

#[derive(Clone, Default)]
struct Probe {
    completed: Arc<AtomicUsize>,
}

struct FetchReducer;

impl Reducer for FetchReducer {
    type State = FetchState;
    type Action = FetchAction;
    type Environment = Probe;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            FetchAction::Fetch {
                label,
                after,
                latest_wins,
            } => {
                let completed = Arc::clone(&env.completed);
                smallvec![
                    async_effect! {
                        tokio::time::sleep(after).await;
                        completed.fetch_add(1, Ordering::SeqCst);
                        Some(FetchAction::Fetched(label))
                    }
                    .cancellable(FETCH, latest_wins)
                ]
            },
            FetchAction::Fetched(label) => {
                state.results.push(label);
                smallvec![Effect::None]
            },
            FetchAction::CancelFetch => smallvec![Effect::cancel(FETCH)],
            FetchAction::CancelTwice => smallvec![Effect::cancel(FETCH), Effect::cancel(FETCH)],
            FetchAction::StartTimer => smallvec![
                popseoul_core::delay! {
                    duration: Duration::from_millis(30),
                    action: FetchAction::Tick
                }
                .cancellable("timer", false)
            ],
            FetchAction::Tick => {
                state.ticks += 1;
                smallvec![Effect::None]
            },
            FetchAction::FetchThenTick => smallvec![
                Effect::chain(vec![
                    async_effect! { Some(FetchAction::Fetched("first")) },
                    Effect::send(FetchAction::Tick).cancellable("inner", false),
                ])
                .cancellable(FETCH, false)
            ],
        }
    }
}

fn store() -> (Store<FetchState, FetchAction>, Probe) {
    let probe = Probe::default();
    (Store::new(FetchState::default(), FetchReducer, probe.clone()), probe)
}

#[tokio::test]
async fn test_cancel_before_completion_discards_result() {
    let (store, probe) = store();

    store
        .send(FetchAction::Fetch {
            label: "seoul",
            after: Duration::from_millis(50),
            latest_wins: false,
        })
        .await
        .unwrap();
    store.send(FetchAction::CancelFetch).await.unwrap();
    store.wait_until_idle(Duration::from_secs(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(store.state(|s| s.results.is_empty()).await);
    assert_eq!(probe.completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_latest_wins_cancels_in_flight_request() {
    let (store, _probe) = store();

    for label in ["first", "second", "third"] {
        store
            .send(FetchAction::Fetch {
                label,
                after: Duration::from_millis(20),
                latest_wins: true,
            })
            .await
            .unwrap();
    }
    store.wait_until_idle(Duration::from_secs(1)).await.unwrap();

    assert_eq!(store.state(|s| s.results.clone()).await, vec!["third"]);
}

#[tokio::test]
async fn test_without_latest_wins_all_requests_complete() {
    let (store, _probe) = store();

    for label in ["first", "second"] {
        store
            .send(FetchAction::Fetch {
                label,
                after: Duration::from_millis(10),
                latest_wins: false,
            })
            .await
            .unwrap();
    }
    store.wait_until_idle(Duration::from_secs(1)).await.unwrap();

    let mut results = store.state(|s| s.results.clone()).await;
    results.sort_unstable();
    assert_eq!(results, vec!["first", "second"]);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let (store, _probe) = store();

    store.send(FetchAction::CancelTwice).await.unwrap();
    store
        .send(FetchAction::Fetch {
            label: "rank",
            after: Duration::from_millis(5),
            latest_wins: false,
        })
        .await
        .unwrap();
    store.wait_until_idle(Duration::from_secs(1)).await.unwrap();

    // Cancelling after natural completion is a no-op as well
    store.send(FetchAction::CancelTwice).await.unwrap();
    assert_eq!(store.state(|s| s.results.clone()).await, vec!["rank"]);
}

#[tokio::test]
async fn test_cancelled_delay_never_fires() {
    let (store, _probe) = store();

    let mut handle = store.send(FetchAction::StartTimer).await.unwrap();
    store.cancel("timer");
    handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(store.state(|s| s.ticks).await, 0);
}

#[tokio::test]
async fn test_sequential_effect_delivers_in_order() {
    let (store, _probe) = store();

    store.send(FetchAction::FetchThenTick).await.unwrap();
    store.wait_until_idle(Duration::from_secs(1)).await.unwrap();

    let (results, ticks) = store.state(|s| (s.results.clone(), s.ticks)).await;
    assert_eq!(results, vec!["first"]);
    assert_eq!(ticks, 1);
}

#[tokio::test]
async fn test_shutdown_timeout_cancels_remaining_effects() {
    let (store, probe) = store();

    store
        .send(FetchAction::Fetch {
            label: "slow",
            after: Duration::from_secs(5),
            latest_wins: false,
        })
        .await
        .unwrap();

    let result = store.shutdown(Duration::from_millis(20)).await;
    assert!(matches!(result, Err(popseoul_runtime::StoreError::ShutdownTimeout(1))));

    store.wait_until_idle(Duration::from_secs(1)).await.unwrap();
    assert_eq!(probe.completed.load(Ordering::SeqCst), 0);
}
