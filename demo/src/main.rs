//! PopSeoul demo binary
//!
//! Runs the root feature in a store against in-memory clients: the home tab
//! loads, a challenge is opened and liked, the map follows a few location
//! fixes, and popping the screens cancels their work.
//!
//! Configuration comes from `POPSEOUL_*` environment variables; logging
//! from `RUST_LOG`.

use popseoul_clients::mocks::{ListKey, MockClients};
use popseoul_clients::{Attraction, AuthorizationStatus, Challenge, ChallengeTheme, Coordinate, LocationResult};
use popseoul_core::SystemClock;
use popseoul_core::navigation::{StackAction, StackElementId};
use popseoul_features::attraction_map::AttractionMapAction;
use popseoul_features::detail_challenge::DetailChallengeAction;
use popseoul_features::home_tab::HomeTabAction;
use popseoul_features::{
    AppEnvironment, FeatureConfig, MainTabAction, MainTabFeature, MainTabState, PathAction, PathState, Tab,
};
use popseoul_runtime::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const IDLE: Duration = Duration::from_secs(5);

type AppStore = Store<MainTabState, MainTabAction>;

fn seed(mocks: &MockClients) {
    let gyeongbokgung = Coordinate::new(37.5796, 126.9770);
    let city_hall = Coordinate::new(37.5665, 126.9780);

    let challenges = [
        (1, "Palaces of Jongno", ChallengeTheme::HistoryCulture, 30),
        (2, "Han River at night", ChallengeTheme::NatureHealing, 20),
        (3, "Drama locations", ChallengeTheme::KCulture, 10),
    ];
    for (id, name, theme, likes) in challenges {
        mocks.server.insert_challenge(Challenge {
            id,
            name: name.to_string(),
            theme: Some(theme),
            attraction_count: 2,
            likes,
            ..Challenge::default()
        });
    }
    for (id, name, at) in [(11, "Gyeongbokgung", gyeongbokgung), (12, "Seoul City Hall", city_hall)] {
        mocks.server.insert_attraction(
            1,
            Attraction {
                id,
                name: name.to_string(),
                coordinate: Some(at),
                ..Attraction::default()
            },
        );
    }
    mocks.server.set_list(ListKey::Seoul, vec![1, 2]);
    mocks.server.set_list(ListKey::Rank, vec![1, 2, 3]);
    mocks.server.set_list(ListKey::Theme(ChallengeTheme::HistoryCulture), vec![1]);

    mocks.location.set_status(AuthorizationStatus::AuthorizedWhenInUse);
    mocks.location.set_current(LocationResult::Success(city_hall));
}

fn element(id: StackElementId, action: PathAction) -> MainTabAction {
    MainTabAction::Path(StackAction::Element { id, action })
}

async fn top_frame(store: &AppStore) -> anyhow::Result<StackElementId> {
    store
        .state(|state| state.path.last().map(|(id, _)| id))
        .await
        .ok_or_else(|| anyhow::anyhow!("navigation stack is empty"))
}

async fn send_and_settle(store: &AppStore, action: MainTabAction) -> anyhow::Result<()> {
    store.send(action).await?;
    store.wait_until_idle(IDLE).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "popseoul_features=debug,popseoul_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== PopSeoul: client state core ===\n");

    let config = FeatureConfig::from_env()?;
    let mocks = MockClients::signed_in();
    seed(&mocks);
    let env = AppEnvironment::new(mocks.clients(), Arc::new(SystemClock)).with_config(config);
    let store = Store::new(MainTabState::default(), MainTabFeature::new(), env);

    println!(">>> Home tab appears");
    send_and_settle(&store, MainTabAction::SelectedTabChanged(Tab::Home)).await?;
    let (banners, ranked) = store
        .state(|state| (state.home.banner_list.len(), state.home.rank_list.len()))
        .await;
    println!("banners: {banners}, ranked challenges: {ranked}");

    println!("\n>>> Open challenge 1 and like it");
    send_and_settle(&store, MainTabAction::Home(HomeTabAction::TappedChallenge(1))).await?;
    let detail = top_frame(&store).await?;
    send_and_settle(
        &store,
        element(detail, PathAction::DetailChallenge(DetailChallengeAction::TappedLike)),
    )
    .await?;
    let liked = store
        .state(|state| match state.path.get(detail) {
            Some(PathState::DetailChallenge(screen)) => screen.challenge.as_ref().map(|c| (c.is_liked, c.likes)),
            _ => None,
        })
        .await;
    println!("liked on screen: {liked:?}, on server: {:?}", mocks.server.challenge(1).map(|c| c.is_liked));

    println!("\n>>> Open the map and walk to Gyeongbokgung");
    // The location feed keeps the store busy until the map is popped.
    store
        .send(element(detail, PathAction::DetailChallenge(DetailChallengeAction::TappedMap)))
        .await?;
    let map = top_frame(&store).await?;
    tokio::time::timeout(IDLE, async {
        while mocks.location.subscriber_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    mocks
        .location
        .send_update(LocationResult::Success(Coordinate::new(37.5790, 126.9768)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    let nearest = store
        .state(|state| match state.path.get(map) {
            Some(PathState::AttractionMap(screen)) => screen.attractions.first().map(|a| a.name.clone()),
            _ => None,
        })
        .await;
    println!("nearest attraction: {nearest:?}");

    println!("\n>>> Back twice");
    store
        .send(element(map, PathAction::AttractionMap(AttractionMapAction::TappedBack)))
        .await?;
    send_and_settle(&store, element(detail, PathAction::DetailChallenge(DetailChallengeAction::TappedBack))).await?;
    let depth = store.state(|state| state.path.len()).await;
    println!("stack depth: {depth}, open location feeds: {}", mocks.location.subscriber_count());

    println!("\nCalls made: {}", mocks.behavior.calls().len());
    store.shutdown_default().await?;
    println!("\n=== Done ===");
    Ok(())
}
