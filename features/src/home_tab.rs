//! Home tab: banners, nearby challenges, themes, unfinished challenges,
//! similar challenges and the popularity ranking.

use crate::common::OnAppearType;
use crate::config::DedupPolicy;
use crate::environment::AppEnvironment;
use crate::identity::{replace_by_id, replace_in_groups};
use crate::optimistic::{Reconciled, predict_like, reconcile};
use chrono::TimeDelta;
use popseoul_clients::{
    Challenge, ChallengeStatus, ChallengeTheme, Coordinate, LocationChallenges, LocationResult, StampChallenge,
};
use popseoul_core::{DateTime, Effect, Reducer, SmallVec, Utc, async_effect, smallvec};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Which banner list is on screen
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BannerType {
    /// Seoul master challenges
    Seoul,
    /// Cultural events
    Cultural,
}

/// Banner rotation bookkeeping
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BannerState {
    /// List on screen
    pub current_type: BannerType,
    /// When it was fetched
    pub last_updated: DateTime<Utc>,
}

/// What the nearby section shows
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocationListType {
    /// Challenges near the user
    List,
    /// Prompt to log in
    LoginRequired,
    /// Prompt to allow location access
    LocationAuthRequired,
    /// The server's default selection (user outside the service area)
    DefaultList,
    /// Nothing yet
    #[default]
    None,
}

/// Prompts the home tab asks the main tab to show
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HomeAlert {
    /// Log in to continue
    Login,
    /// Allow location access in settings
    OnLocation,
}

/// Home tab state
#[derive(Clone, Debug, PartialEq)]
pub struct HomeTabState {
    /// How the tab came on screen
    pub on_appear_type: OnAppearType,
    /// Last known position
    pub user_coordinate: Option<Coordinate>,
    /// Banner rotation
    pub banner_state: Option<BannerState>,
    /// Banner challenges
    pub banner_list: Vec<Challenge>,
    /// What the nearby section shows
    pub location_list_type: LocationListType,
    /// Nearby challenges
    pub location_list: Vec<Challenge>,
    /// Themes with a fetch in flight
    pub loading_themes: Vec<ChallengeTheme>,
    /// Selected theme tab
    pub selected_theme: ChallengeTheme,
    /// Challenges per theme, every theme present
    pub theme_challenges: BTreeMap<ChallengeTheme, Vec<Challenge>>,
    /// Started and unfinished challenges
    pub missing_list: Vec<Challenge>,
    /// Suggestions when nothing is in progress
    pub challenge_list: Vec<Challenge>,
    /// Name of the last stamped attraction
    pub similar_attraction: String,
    /// Challenges sharing that attraction
    pub similar_list: Vec<Challenge>,
    /// Popularity ranking
    pub rank_list: Vec<Challenge>,
    /// Failed requests since launch
    pub network_errors: u32,
}

impl Default for HomeTabState {
    fn default() -> Self {
        Self {
            on_appear_type: OnAppearType::FirstTime,
            user_coordinate: None,
            banner_state: None,
            banner_list: Vec::new(),
            location_list_type: LocationListType::None,
            location_list: Vec::new(),
            loading_themes: Vec::new(),
            selected_theme: ChallengeTheme::MustSeeSpots,
            theme_challenges: ChallengeTheme::ALL.into_iter().map(|theme| (theme, Vec::new())).collect(),
            missing_list: Vec::new(),
            challenge_list: Vec::new(),
            similar_attraction: String::new(),
            similar_list: Vec::new(),
            rank_list: Vec::new(),
            network_errors: 0,
        }
    }
}

/// Home tab actions
#[derive(Clone, Debug, PartialEq)]
pub enum HomeTabAction {
    /// The tab came on screen
    OnAppear,
    /// Load every section
    Initialize,
    /// Reload the sections that depend on the user's progress
    Refetch,
    /// The session changed
    SessionRefreshed,
    /// A request failed
    NetworkError,
    /// Delegate: ask the main tab for a prompt
    ShowAlert(HomeAlert),
    /// Delegate: open a challenge
    TappedChallenge(i64),
    /// Like toggle on any list
    TappedLike(Challenge),
    /// Replace a challenge in every list
    UpdateLikeList(Challenge),

    /// Fetch the banner list due for display
    FetchBannerList,
    /// Fetch Seoul master banners
    FetchSeoulList,
    /// Fetch cultural event banners
    FetchCulturalList,
    /// Banners arrived
    UpdateBannerList(BannerType, Vec<Challenge>),

    /// Ask for permission and one fix
    RequestLocation,
    /// Outcome of the location request
    LocationResult(LocationResult),
    /// Remember the position and load the nearby list
    UpdateUserCoordinate(Option<Coordinate>),
    /// Switch the nearby section
    UpdateLocationListType(LocationListType),
    /// Fetch challenges near a position
    FetchLocationList(Coordinate),
    /// Nearby answer arrived
    LocationListFetched(LocationChallenges),
    /// Replace the nearby list
    UpdateLocationList(Vec<Challenge>),

    /// Select a theme tab
    ThemeChanged(ChallengeTheme),
    /// Fetch one theme
    FetchThemeList(ChallengeTheme),
    /// Theme challenges arrived
    UpdateThemeList(ChallengeTheme, Vec<Challenge>),
    /// Theme fetch failed
    ThemeFetchFailed(ChallengeTheme),
    /// "More" on the theme section
    TappedThemeMore,
    /// Delegate: open the theme screen
    MoveToThemeChallenge(ChallengeTheme),

    /// Fetch unfinished challenges
    FetchMissingList,
    /// Unfinished challenges arrived
    UpdateMissingList(Vec<Challenge>),
    /// Suggestions arrived
    UpdateChallengeList(Vec<Challenge>),
    /// Start a suggested or unfinished challenge
    TappedStart(i64),
    /// The server confirmed a start
    UpdateStartList(i64),

    /// Fetch challenges sharing the last stamped attraction
    FetchSimilarList,
    /// Similar challenges arrived
    UpdateSimilarList(String, Vec<Challenge>),

    /// Fetch the ranking
    FetchRankList,
    /// Ranking arrived
    UpdateRankList(Vec<Challenge>),
    /// "More" on the ranking
    TappedRankMore,
    /// Delegate: open the ranking screen
    MoveToRank,
}

const BANNER: &str = "home/banner";
const LOCATION: &str = "home/location";
const MISSING: &str = "home/missing";
const SIMILAR: &str = "home/similar";
const RANK: &str = "home/rank";

fn theme_effect_id(theme: ChallengeTheme) -> String {
    format!("home/theme/{}", theme.id())
}

/// Home tab reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct HomeTabFeature;

impl HomeTabFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fetch_banner_list(state: &HomeTabState, env: &AppEnvironment) -> HomeTabAction {
        let Some(banner) = state.banner_state else {
            return HomeTabAction::FetchSeoulList;
        };
        let elapsed = env.clock.now().signed_duration_since(banner.last_updated);
        let due = TimeDelta::from_std(env.config.banner_rotation).is_ok_and(|rotation| elapsed >= rotation);
        match (due, banner.current_type) {
            (true, BannerType::Seoul) => HomeTabAction::FetchCulturalList,
            (true, BannerType::Cultural) | (false, _) => HomeTabAction::FetchSeoulList,
        }
    }

    fn fetch_theme_list(
        state: &mut HomeTabState,
        theme: ChallengeTheme,
        env: &AppEnvironment,
    ) -> Effect<HomeTabAction> {
        let in_flight = state.loading_themes.contains(&theme);
        let cancel_in_flight = match env.config.home_theme_dedup {
            DedupPolicy::TrackInFlight if in_flight => {
                tracing::debug!(%theme, "theme fetch already in flight");
                return Effect::None;
            },
            DedupPolicy::TrackInFlight => false,
            DedupPolicy::LatestWins => true,
        };
        if !in_flight {
            state.loading_themes.push(theme);
        }

        let lists = Arc::clone(&env.clients.challenge_lists);
        async_effect! {
            match lists.fetch_theme_list(theme).await {
                Ok(list) => Some(HomeTabAction::UpdateThemeList(theme, list)),
                Err(error) => {
                    tracing::warn!(%theme, %error, "theme list fetch failed");
                    Some(HomeTabAction::ThemeFetchFailed(theme))
                },
            }
        }
        .cancellable(theme_effect_id(theme), cancel_in_flight)
    }

    fn tapped_like(challenge: &Challenge, env: &AppEnvironment) -> Effect<HomeTabAction> {
        if !env.is_authenticated() {
            return Effect::send(HomeTabAction::ShowAlert(HomeAlert::Login));
        }
        let predicted = predict_like(challenge);
        let predicted_flag = predicted.is_liked;
        let client = Arc::clone(&env.clients.challenges);
        Effect::merge(vec![
            Effect::send(HomeTabAction::UpdateLikeList(predicted.clone())),
            async_effect! {
                let outcome = reconcile(
                    client.put_like(predicted.id),
                    |response| response.is_liked == predicted_flag,
                    |response| client.get(response.id),
                )
                .await;
                match outcome {
                    Reconciled::Confirmed(_) => None,
                    Reconciled::Corrected { fresh, .. } => Some(HomeTabAction::UpdateLikeList(fresh)),
                    Reconciled::Failed(error) => {
                        tracing::warn!(id = predicted.id, %error, "like failed");
                        Some(HomeTabAction::NetworkError)
                    },
                }
            },
        ])
    }

    fn update_user_coordinate(coordinate: Option<Coordinate>, env: &AppEnvironment) -> Effect<HomeTabAction> {
        if !env.is_authenticated() {
            return Effect::send(HomeTabAction::UpdateLocationListType(LocationListType::LoginRequired));
        }
        let Some(coordinate) = coordinate else {
            return Effect::send(HomeTabAction::UpdateLocationListType(
                LocationListType::LocationAuthRequired,
            ));
        };
        let preferences = Arc::clone(&env.clients.preferences);
        Effect::merge(vec![
            async_effect! {
                preferences.set_cached_coordinate(coordinate);
                None
            },
            Effect::send(HomeTabAction::FetchLocationList(coordinate)),
        ])
    }

    fn fetch_similar_list(env: &AppEnvironment) -> Effect<HomeTabAction> {
        let last = env
            .clients
            .preferences
            .last_stamped_attraction()
            .filter(|attraction| attraction.id > 0);
        let (true, Some(last)) = (env.is_authenticated(), last) else {
            return Effect::send(HomeTabAction::UpdateSimilarList(String::new(), Vec::new()));
        };
        let lists = Arc::clone(&env.clients.challenge_lists);
        async_effect! {
            match lists.fetch_stamp_list(last.id).await {
                Ok(result) => Some(HomeTabAction::UpdateSimilarList(last.name, result.challenges)),
                Err(error) => {
                    tracing::warn!(attraction = last.id, %error, "similar list fetch failed");
                    Some(HomeTabAction::NetworkError)
                },
            }
        }
        .cancellable(SIMILAR, true)
    }
}

impl Reducer for HomeTabFeature {
    type State = HomeTabState;
    type Action = HomeTabAction;
    type Environment = AppEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            HomeTabAction::OnAppear => match state.on_appear_type {
                OnAppearType::FirstTime => smallvec![Effect::send(HomeTabAction::Initialize)],
                OnAppearType::TabReappeared => smallvec![Effect::send(HomeTabAction::Refetch)],
                OnAppearType::Retained => smallvec![Effect::None],
            },

            HomeTabAction::Initialize => {
                state.on_appear_type = OnAppearType::Retained;
                let mut sends = vec![
                    Effect::send(HomeTabAction::RequestLocation),
                    Effect::send(HomeTabAction::FetchBannerList),
                ];
                sends.extend(
                    env.config
                        .prefetch_themes
                        .iter()
                        .map(|theme| Effect::send(HomeTabAction::FetchThemeList(*theme))),
                );
                sends.extend([
                    Effect::send(HomeTabAction::FetchMissingList),
                    Effect::send(HomeTabAction::FetchSimilarList),
                    Effect::send(HomeTabAction::FetchRankList),
                ]);
                smallvec![Effect::merge(sends)]
            },

            HomeTabAction::Refetch => {
                state.on_appear_type = OnAppearType::Retained;
                smallvec![Effect::merge(vec![
                    Effect::send(HomeTabAction::FetchMissingList),
                    Effect::send(HomeTabAction::FetchSimilarList),
                ])]
            },

            HomeTabAction::SessionRefreshed => smallvec![Effect::merge(vec![
                Effect::send(HomeTabAction::RequestLocation),
                Effect::send(HomeTabAction::Refetch),
            ])],

            HomeTabAction::NetworkError => {
                state.network_errors = state.network_errors.saturating_add(1);
                smallvec![Effect::None]
            },

            HomeTabAction::TappedLike(challenge) => smallvec![Self::tapped_like(&challenge, env)],

            HomeTabAction::UpdateLikeList(update) => {
                let replaced = replace_by_id(&mut state.banner_list, &update)
                    + replace_by_id(&mut state.location_list, &update)
                    + replace_by_id(&mut state.missing_list, &update)
                    + replace_by_id(&mut state.challenge_list, &update)
                    + replace_by_id(&mut state.similar_list, &update)
                    + replace_by_id(&mut state.rank_list, &update)
                    + replace_in_groups(state.theme_challenges.values_mut(), &update);
                tracing::trace!(id = update.id, replaced, "replaced challenge");
                smallvec![Effect::None]
            },

            // Banner
            HomeTabAction::FetchBannerList => smallvec![Effect::send(Self::fetch_banner_list(state, env))],

            HomeTabAction::FetchSeoulList => {
                let lists = Arc::clone(&env.clients.challenge_lists);
                smallvec![
                    async_effect! {
                        match lists.fetch_seoul_list().await {
                            Ok(list) => Some(HomeTabAction::UpdateBannerList(BannerType::Seoul, list)),
                            Err(error) => {
                                tracing::warn!(%error, "seoul banner fetch failed");
                                Some(HomeTabAction::NetworkError)
                            },
                        }
                    }
                    .cancellable(BANNER, true)
                ]
            },

            HomeTabAction::FetchCulturalList => {
                let lists = Arc::clone(&env.clients.challenge_lists);
                smallvec![
                    async_effect! {
                        match lists.fetch_cultural_list().await {
                            Ok(list) => Some(HomeTabAction::UpdateBannerList(BannerType::Cultural, list)),
                            Err(error) => {
                                tracing::warn!(%error, "cultural banner fetch failed");
                                Some(HomeTabAction::NetworkError)
                            },
                        }
                    }
                    .cancellable(BANNER, true)
                ]
            },

            HomeTabAction::UpdateBannerList(current_type, list) => {
                state.banner_state = Some(BannerState {
                    current_type,
                    last_updated: env.clock.now(),
                });
                state.banner_list = list;
                smallvec![Effect::None]
            },

            // Location
            HomeTabAction::RequestLocation => {
                let location = Arc::clone(&env.clients.location);
                smallvec![
                    async_effect! {
                        location.request_authorization().await;
                        let status = location.authorization_status().await;
                        if !status.is_authorized() {
                            tracing::debug!(?status, "location not authorized");
                            return Some(HomeTabAction::LocationResult(LocationResult::Fail));
                        }
                        Some(HomeTabAction::LocationResult(location.current_location().await))
                    }
                    .cancellable(LOCATION, true)
                ]
            },

            HomeTabAction::LocationResult(LocationResult::Success(coordinate)) => {
                smallvec![Effect::send(HomeTabAction::UpdateUserCoordinate(Some(coordinate)))]
            },

            HomeTabAction::LocationResult(LocationResult::Fail) => smallvec![Effect::merge(vec![
                Effect::send(HomeTabAction::UpdateLocationListType(
                    LocationListType::LocationAuthRequired
                )),
                Effect::send(HomeTabAction::UpdateUserCoordinate(None)),
            ])],

            HomeTabAction::UpdateUserCoordinate(coordinate) => {
                state.user_coordinate = coordinate;
                smallvec![Self::update_user_coordinate(coordinate, env)]
            },

            HomeTabAction::UpdateLocationListType(list_type) => {
                state.location_list_type = list_type;
                if !matches!(list_type, LocationListType::List | LocationListType::DefaultList) {
                    state.location_list.clear();
                }
                smallvec![Effect::None]
            },

            HomeTabAction::FetchLocationList(coordinate) => {
                let lists = Arc::clone(&env.clients.challenge_lists);
                let (radius, limit) = (env.config.location_radius, env.config.location_limit);
                smallvec![
                    async_effect! {
                        match lists.fetch_location_list(coordinate, radius, limit).await {
                            Ok(result) => Some(HomeTabAction::LocationListFetched(result)),
                            Err(error) => {
                                tracing::warn!(%error, "nearby list fetch failed");
                                Some(HomeTabAction::NetworkError)
                            },
                        }
                    }
                    .cancellable(LOCATION, true)
                ]
            },

            HomeTabAction::LocationListFetched(result) => {
                let list_type = if result.jong_gak {
                    LocationListType::DefaultList
                } else {
                    LocationListType::List
                };
                smallvec![Effect::merge(vec![
                    Effect::send(HomeTabAction::UpdateLocationListType(list_type)),
                    Effect::send(HomeTabAction::UpdateLocationList(result.challenges)),
                ])]
            },

            HomeTabAction::UpdateLocationList(list) => {
                state.location_list = list;
                smallvec![Effect::None]
            },

            // Theme
            HomeTabAction::ThemeChanged(theme) => {
                state.selected_theme = theme;
                let empty = state.theme_challenges.get(&theme).is_none_or(Vec::is_empty);
                if empty && !state.loading_themes.contains(&theme) {
                    smallvec![Effect::send(HomeTabAction::FetchThemeList(theme))]
                } else {
                    smallvec![Effect::None]
                }
            },

            HomeTabAction::FetchThemeList(theme) => smallvec![Self::fetch_theme_list(state, theme, env)],

            HomeTabAction::UpdateThemeList(theme, list) => {
                state.loading_themes.retain(|loading| *loading != theme);
                state.theme_challenges.insert(theme, list);
                smallvec![Effect::None]
            },

            HomeTabAction::ThemeFetchFailed(theme) => {
                state.loading_themes.retain(|loading| *loading != theme);
                smallvec![Effect::send(HomeTabAction::NetworkError)]
            },

            HomeTabAction::TappedThemeMore => {
                smallvec![Effect::send(HomeTabAction::MoveToThemeChallenge(state.selected_theme))]
            },

            // Missing
            HomeTabAction::FetchMissingList => {
                let lists = Arc::clone(&env.clients.challenge_lists);
                smallvec![
                    async_effect! {
                        match lists.fetch_missing_list().await {
                            Ok(result) => match result.kind() {
                                Some(StampChallenge::Missed) => Some(HomeTabAction::UpdateMissingList(result.challenges)),
                                Some(StampChallenge::Challenge) => {
                                    Some(HomeTabAction::UpdateChallengeList(result.challenges))
                                },
                                None => {
                                    tracing::debug!(code = %result.data_code, "unknown stamp list code");
                                    None
                                },
                            },
                            Err(error) => {
                                tracing::warn!(%error, "missing list fetch failed");
                                Some(HomeTabAction::NetworkError)
                            },
                        }
                    }
                    .cancellable(MISSING, true)
                ]
            },

            HomeTabAction::UpdateMissingList(list) => {
                state.challenge_list.clear();
                state.missing_list = list;
                smallvec![Effect::None]
            },

            HomeTabAction::UpdateChallengeList(list) => {
                state.missing_list.clear();
                state.challenge_list = list;
                smallvec![Effect::None]
            },

            HomeTabAction::TappedStart(id) => {
                if !env.is_authenticated() {
                    return smallvec![Effect::send(HomeTabAction::ShowAlert(HomeAlert::Login))];
                }
                let client = Arc::clone(&env.clients.challenges);
                smallvec![async_effect! {
                    match client.put_status(id, ChallengeStatus::Progress).await {
                        Ok(response) if response.challenge_status == ChallengeStatus::Progress => {
                            Some(HomeTabAction::UpdateStartList(id))
                        },
                        Ok(response) => {
                            tracing::warn!(id, status = ?response.challenge_status, "start not confirmed");
                            Some(HomeTabAction::NetworkError)
                        },
                        Err(error) => {
                            tracing::warn!(id, %error, "start failed");
                            Some(HomeTabAction::NetworkError)
                        },
                    }
                }]
            },

            HomeTabAction::UpdateStartList(id) => {
                state.missing_list.retain(|challenge| challenge.id != id);
                state.challenge_list.retain(|challenge| challenge.id != id);
                smallvec![Effect::None]
            },

            // Similar
            HomeTabAction::FetchSimilarList => smallvec![Self::fetch_similar_list(env)],

            HomeTabAction::UpdateSimilarList(attraction, list) => {
                state.similar_attraction = attraction;
                state.similar_list = list;
                smallvec![Effect::None]
            },

            // Rank
            HomeTabAction::FetchRankList => {
                let lists = Arc::clone(&env.clients.challenge_lists);
                smallvec![
                    async_effect! {
                        match lists.fetch_rank_list().await {
                            Ok(list) => Some(HomeTabAction::UpdateRankList(list)),
                            Err(error) => {
                                tracing::warn!(%error, "rank list fetch failed");
                                Some(HomeTabAction::NetworkError)
                            },
                        }
                    }
                    .cancellable(RANK, true)
                ]
            },

            HomeTabAction::UpdateRankList(list) => {
                state.rank_list = list;
                smallvec![Effect::None]
            },

            HomeTabAction::TappedRankMore => smallvec![Effect::send(HomeTabAction::MoveToRank)],

            // Handled by the main tab
            HomeTabAction::ShowAlert(_)
            | HomeTabAction::TappedChallenge(_)
            | HomeTabAction::MoveToThemeChallenge(_)
            | HomeTabAction::MoveToRank => smallvec![Effect::None],
        }
    }
}
