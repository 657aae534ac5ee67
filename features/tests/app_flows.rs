//! End-to-end flows through the store: the root feature, its navigation
//! stack and in-memory clients.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use popseoul_clients::mocks::MockClients;
use popseoul_clients::{AuthProvider, Challenge, Coordinate, LocationResult};
use popseoul_core::navigation::{StackAction, StackElementId};
use popseoul_features::attraction_map::{AttractionMapAction, AttractionMapState};
use popseoul_features::common::LoginAlertAction;
use popseoul_features::detail_challenge::{DetailChallengeAction, DetailChallengeState};
use popseoul_features::home_tab::HomeTabAction;
use popseoul_features::login::LoginAction;
use popseoul_features::{AppEnvironment, MainTabAction, MainTabFeature, MainTabState, PathAction, PathState};
use popseoul_runtime::Store;
use popseoul_testing::{init_test_tracing, test_clock};
use std::sync::Arc;
use std::time::Duration;

const IDLE: Duration = Duration::from_secs(2);

type AppStore = Store<MainTabState, MainTabAction>;

fn store(mocks: &MockClients) -> AppStore {
    init_test_tracing();
    let env = AppEnvironment::new(mocks.clients(), Arc::new(test_clock()));
    Store::new(MainTabState::default(), MainTabFeature::new(), env)
}

fn challenge(id: i64) -> Challenge {
    Challenge {
        id,
        name: format!("challenge {id}"),
        attraction_count: 3,
        ..Challenge::default()
    }
}

fn element(id: StackElementId, action: PathAction) -> MainTabAction {
    MainTabAction::Path(StackAction::Element { id, action })
}

async fn push(store: &AppStore, screen: PathState) -> StackElementId {
    store
        .send(MainTabAction::Path(StackAction::Push { state: screen }))
        .await
        .unwrap();
    store.state(|state| state.path.last().map(|(id, _)| id)).await.unwrap()
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(IDLE, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

async fn detail(store: &AppStore, id: StackElementId) -> Option<DetailChallengeState> {
    store
        .state(|state| match state.path.get(id) {
            Some(PathState::DetailChallenge(detail)) => Some(detail.clone()),
            _ => None,
        })
        .await
}

#[tokio::test]
async fn disagreeing_like_converges_to_the_server_record() {
    let mocks = MockClients::signed_in();
    let stored = Challenge {
        is_liked: false,
        likes: 10,
        ..challenge(1)
    };
    mocks.server.insert_challenge(stored.clone());
    mocks.server.script_like(1, false);
    let store = store(&mocks);
    let mut actions = store.subscribe_actions();

    let frame = push(
        &store,
        PathState::DetailChallenge(DetailChallengeState {
            challenge: Some(stored.clone()),
            ..DetailChallengeState::new(1)
        }),
    )
    .await;
    store
        .send(element(frame, PathAction::DetailChallenge(DetailChallengeAction::TappedLike)))
        .await
        .unwrap();
    store.wait_until_idle(IDLE).await.unwrap();

    let mut updates = Vec::new();
    while let Ok(action) = actions.try_recv() {
        if let MainTabAction::Path(StackAction::Element {
            action: PathAction::DetailChallenge(DetailChallengeAction::Update(challenge)),
            ..
        }) = action
        {
            updates.push((challenge.is_liked, challenge.likes));
        }
    }
    assert_eq!(updates, vec![(true, 11), (false, 10)]);
    assert_eq!(detail(&store, frame).await.unwrap().challenge, Some(stored));
    assert_eq!(mocks.behavior.call_count("challenge.get"), 1);
}

#[tokio::test]
async fn popped_frame_receives_nothing_from_its_request() {
    let mocks = MockClients::signed_in();
    mocks.server.insert_challenge(challenge(1));
    mocks.behavior.set_latency(Duration::from_millis(200));
    let store = store(&mocks);

    let frame = push(
        &store,
        PathState::DetailChallenge(DetailChallengeState {
            challenge: Some(challenge(1)),
            ..DetailChallengeState::new(1)
        }),
    )
    .await;
    store
        .send(element(frame, PathAction::DetailChallenge(DetailChallengeAction::TappedLike)))
        .await
        .unwrap();
    let mut actions = store.subscribe_actions();
    store
        .send(element(frame, PathAction::DetailChallenge(DetailChallengeAction::TappedBack)))
        .await
        .unwrap();

    // The request is aborted well before its latency elapses.
    store.wait_until_idle(Duration::from_millis(100)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    let mut late = Vec::new();
    while let Ok(action) = actions.try_recv() {
        if matches!(&action, MainTabAction::Path(StackAction::Element { id, .. }) if *id == frame) {
            late.push(action);
        }
    }
    assert!(late.is_empty(), "popped frame still received {late:?}");
    assert!(store.state(|state| state.path.is_empty()).await);
    assert!(!mocks.server.challenge(1).unwrap().is_liked);
}

#[tokio::test]
async fn popping_the_map_closes_the_location_feed() {
    let mocks = MockClients::signed_in();
    let store = store(&mocks);

    let frame = push(&store, PathState::AttractionMap(AttractionMapState::new(challenge(1)))).await;
    store
        .send(element(frame, PathAction::AttractionMap(AttractionMapAction::OnAppear)))
        .await
        .unwrap();
    eventually("the feed to subscribe", || mocks.location.subscriber_count() == 1).await;

    let at = Coordinate::new(37.5665, 126.9780);
    assert_eq!(mocks.location.send_update(LocationResult::Success(at)), 1);
    tokio::time::timeout(IDLE, async {
        loop {
            let seen = store
                .state(|state| match state.path.get(frame) {
                    Some(PathState::AttractionMap(map)) => map.user_coordinate,
                    _ => None,
                })
                .await;
            if seen == Some(at) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("fix reaches the frame");

    store
        .send(element(frame, PathAction::AttractionMap(AttractionMapAction::TappedBack)))
        .await
        .unwrap();
    eventually("the feed to close", || mocks.location.subscriber_count() == 0).await;
    store.wait_until_idle(IDLE).await.unwrap();
}

#[tokio::test]
async fn login_from_a_pushed_screen_refreshes_it() {
    let mocks = MockClients::new();
    mocks.server.insert_challenge(challenge(1));
    let store = store(&mocks);

    store
        .send(MainTabAction::Home(HomeTabAction::TappedChallenge(1)))
        .await
        .unwrap();
    store.wait_until_idle(IDLE).await.unwrap();
    let frame = store.state(|state| state.path.last().map(|(id, _)| id)).await.unwrap();
    assert!(!detail(&store, frame).await.unwrap().is_login);

    store
        .send(element(frame, PathAction::DetailChallenge(DetailChallengeAction::TappedLike)))
        .await
        .unwrap();
    assert!(detail(&store, frame).await.unwrap().show_login_alert);
    store
        .send(element(
            frame,
            PathAction::DetailChallenge(DetailChallengeAction::LoginAlert(LoginAlertAction::LoginTapped)),
        ))
        .await
        .unwrap();
    let login = store.state(|state| state.path.last().map(|(id, _)| id)).await.unwrap();
    assert_ne!(login, frame);

    store
        .send(element(
            login,
            PathAction::Login(LoginAction::AuthLogin(AuthProvider::Google {
                id_token: "token".to_string(),
            })),
        ))
        .await
        .unwrap();
    store.wait_until_idle(IDLE).await.unwrap();

    assert_eq!(store.state(|state| state.path.len()).await, 1);
    let refreshed = detail(&store, frame).await.unwrap();
    assert!(refreshed.is_login);
    assert_eq!(refreshed.challenge, mocks.server.challenge(1));
}

#[tokio::test]
async fn repeated_login_taps_issue_one_request() {
    let mocks = MockClients::new();
    mocks.behavior.set_latency(Duration::from_millis(20));
    let store = store(&mocks);

    let login = push(&store, PathState::Login(popseoul_features::login::LoginState::new(false))).await;
    for _ in 0..3 {
        store
            .send(element(
                login,
                PathAction::Login(LoginAction::AppleSignInCompleted("token".to_string())),
            ))
            .await
            .unwrap();
    }
    store.wait_until_idle(IDLE).await.unwrap();

    assert_eq!(mocks.behavior.call_count("auth.login"), 1);
    assert!(store.state(|state| state.path.is_empty()).await);
}
