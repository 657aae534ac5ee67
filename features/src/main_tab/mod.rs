//! Root feature: the three tabs, app-wide alerts and the navigation stack.
//!
//! The tabs are scoped children. Pushed screens live in
//! [`MainTabState::path`] and are driven by [`PathFeature`] through
//! [`for_each_stack`], so popping a frame cancels everything it started.
//! The core reducer below only routes: it turns delegate actions from tabs
//! and frames into tab switches, alerts, pushes and pops.

mod path;

pub use path::{PathAction, PathFeature, PathRoute, PathState};

use crate::common::OnAppearType;
use crate::detail_challenge::DetailChallengeState;
use crate::environment::AppEnvironment;
use crate::home_tab::{HomeAlert, HomeTabAction, HomeTabFeature, HomeTabState};
use crate::login::LoginState;
use crate::my_badge::MyBadgeState;
use crate::my_challenge_tab::{MyChallengeTabAction, MyChallengeTabFeature, MyChallengeTabState};
use crate::profile_tab::{ProfileAlert, ProfileTabAction, ProfileTabFeature, ProfileTabState};
use crate::rank_challenge::RankChallengeState;
use crate::theme_challenge::ThemeChallengeState;
use popseoul_core::composition::{BoxedReducer, CombinedReducer, combine_reducers, scope_reducer};
use popseoul_core::navigation::{ForEachStack, StackAction, StackElementId, StackState, for_each_stack};
use popseoul_core::{Effect, Reducer, SmallVec, async_effect, smallvec};
use std::sync::Arc;

/// Bottom tabs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Tab {
    /// Home
    #[default]
    Home,
    /// Challenges the user started or finished
    MyChallenge,
    /// Profile and settings
    Profile,
}

/// Prompts raised over the whole app
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MainAlert {
    /// Login required
    Login,
    /// Confirm logout
    Logout,
    /// Location access is off; offer settings
    OnLocation,
    /// Turning location off happens in settings
    OffLocation,
}

impl From<HomeAlert> for MainAlert {
    fn from(alert: HomeAlert) -> Self {
        match alert {
            HomeAlert::Login => Self::Login,
            HomeAlert::OnLocation => Self::OnLocation,
        }
    }
}

impl From<ProfileAlert> for MainAlert {
    fn from(alert: ProfileAlert) -> Self {
        match alert {
            ProfileAlert::Login => Self::Login,
            ProfileAlert::Logout => Self::Logout,
            ProfileAlert::OnLocation => Self::OnLocation,
            ProfileAlert::OffLocation => Self::OffLocation,
        }
    }
}

/// Root state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MainTabState {
    /// Tab on screen
    pub selected_tab: Tab,
    /// Home tab
    pub home: HomeTabState,
    /// My-challenge tab
    pub my_challenge: MyChallengeTabState,
    /// Profile tab
    pub profile: ProfileTabState,
    /// Prompt on screen
    pub alert: Option<MainAlert>,
    /// Pushed screens, bottom first
    pub path: StackState<PathState>,
}

/// Root actions
#[derive(Clone, Debug, PartialEq)]
pub enum MainTabAction {
    /// The user picked a tab
    SelectedTabChanged(Tab),
    /// Home tab
    Home(HomeTabAction),
    /// My-challenge tab
    MyChallenge(MyChallengeTabAction),
    /// Profile tab
    Profile(ProfileTabAction),
    /// The prompt was answered
    AlertAction {
        /// Prompt that was answered
        alert: MainAlert,
        /// The user chose the affirmative button
        confirmed: bool,
    },
    /// A login completed; every session-aware screen refreshes
    SuccessLogin {
        /// The account was created by this login
        is_new_user: bool,
    },
    /// Navigation stack
    Path(StackAction<PathState, PathAction>),
}

fn home_state(state: &mut MainTabState) -> &mut HomeTabState {
    &mut state.home
}

fn home_action(action: MainTabAction) -> Option<HomeTabAction> {
    match action {
        MainTabAction::Home(action) => Some(action),
        _ => None,
    }
}

fn my_challenge_state(state: &mut MainTabState) -> &mut MyChallengeTabState {
    &mut state.my_challenge
}

fn my_challenge_action(action: MainTabAction) -> Option<MyChallengeTabAction> {
    match action {
        MainTabAction::MyChallenge(action) => Some(action),
        _ => None,
    }
}

fn profile_state(state: &mut MainTabState) -> &mut ProfileTabState {
    &mut state.profile
}

fn profile_action(action: MainTabAction) -> Option<ProfileTabAction> {
    match action {
        MainTabAction::Profile(action) => Some(action),
        _ => None,
    }
}

fn path_state(state: &mut MainTabState) -> &mut StackState<PathState> {
    &mut state.path
}

fn path_action(action: &MainTabAction) -> Option<&StackAction<PathState, PathAction>> {
    match action {
        MainTabAction::Path(action) => Some(action),
        _ => None,
    }
}

const fn element(id: StackElementId, action: PathAction) -> MainTabAction {
    MainTabAction::Path(StackAction::Element { id, action })
}

/// Push `screen` and dispatch its appear action to the new frame
fn push(state: &mut MainTabState, screen: PathState) -> Effect<MainTabAction> {
    let appear = screen.on_appear();
    let id = state.path.push(screen);
    tracing::debug!(%id, depth = state.path.len(), "pushed screen");
    appear.map_or(Effect::None, |action| Effect::send(element(id, action)))
}

/// Routing reducer of the root feature; runs after the tabs
#[derive(Clone, Copy, Debug, Default)]
struct MainTabCore;

impl MainTabCore {
    fn select_tab(state: &mut MainTabState, tab: Tab, env: &AppEnvironment) -> Effect<MainTabAction> {
        match tab {
            Tab::Home => {
                if state.home.on_appear_type != OnAppearType::FirstTime {
                    state.home.on_appear_type = OnAppearType::TabReappeared;
                }
                state.selected_tab = tab;
                Effect::send(MainTabAction::Home(HomeTabAction::OnAppear))
            },
            Tab::MyChallenge => {
                if !env.is_authenticated() {
                    state.alert = Some(MainAlert::Login);
                    return Effect::None;
                }
                state.selected_tab = tab;
                Effect::send(MainTabAction::MyChallenge(MyChallengeTabAction::OnAppear))
            },
            Tab::Profile => {
                if state.profile.on_appear_type != OnAppearType::FirstTime {
                    state.profile.on_appear_type = OnAppearType::TabReappeared;
                }
                state.selected_tab = tab;
                Effect::send(MainTabAction::Profile(ProfileTabAction::OnAppear))
            },
        }
    }

    fn answer_alert(alert: MainAlert, state: &mut MainTabState, env: &AppEnvironment) -> Effect<MainTabAction> {
        match alert {
            MainAlert::Login => push(state, PathState::Login(LoginState::new(false))),
            MainAlert::Logout => Effect::send(MainTabAction::Profile(ProfileTabAction::ConfirmLogout)),
            MainAlert::OnLocation | MainAlert::OffLocation => {
                let location = Arc::clone(&env.clients.location);
                async_effect! {
                    location.open_settings().await;
                    None
                }
            },
        }
    }

    fn home_delegate(state: &mut MainTabState, action: &HomeTabAction) -> Effect<MainTabAction> {
        match action {
            HomeTabAction::ShowAlert(alert) => {
                state.alert = Some((*alert).into());
                Effect::None
            },
            HomeTabAction::TappedChallenge(id) => push(state, PathState::DetailChallenge(DetailChallengeState::new(*id))),
            HomeTabAction::MoveToThemeChallenge(theme) => {
                push(state, PathState::ThemeChallenge(ThemeChallengeState::new(*theme)))
            },
            HomeTabAction::MoveToRank => push(state, PathState::RankChallenge(RankChallengeState::default())),
            _ => Effect::None,
        }
    }

    fn my_challenge_delegate(state: &mut MainTabState, action: &MyChallengeTabAction) -> Effect<MainTabAction> {
        match action {
            MyChallengeTabAction::TappedItem(id) => {
                push(state, PathState::DetailChallenge(DetailChallengeState::new(*id)))
            },
            MyChallengeTabAction::MoveToHome => Effect::send(MainTabAction::SelectedTabChanged(Tab::Home)),
            _ => Effect::None,
        }
    }

    fn profile_delegate(state: &mut MainTabState, action: &ProfileTabAction) -> Effect<MainTabAction> {
        match action {
            ProfileTabAction::ShowAlert(alert) => {
                state.alert = Some((*alert).into());
                Effect::None
            },
            ProfileTabAction::LoggedOut => Effect::send(MainTabAction::Home(HomeTabAction::SessionRefreshed)),
            _ => Effect::None,
        }
    }

    fn route(
        state: &mut MainTabState,
        id: StackElementId,
        action: &PathAction,
        env: &AppEnvironment,
    ) -> Effect<MainTabAction> {
        if !state.path.get(id).is_some_and(|screen| screen.accepts(action)) {
            tracing::debug!(%id, ?action, "not routing an action for a missing frame");
            return Effect::None;
        }
        let Some(route) = action.route() else {
            return Effect::None;
        };
        match route {
            PathRoute::Push(screen) => push(state, screen),
            PathRoute::Dismiss => {
                state.path.pop_from(id);
                Effect::None
            },
            PathRoute::LoginSucceeded { is_new_user } => {
                state.path.pop_from(id);
                Effect::send(MainTabAction::SuccessLogin { is_new_user })
            },
            PathRoute::ShowBadges => {
                state.path.remove_all();
                let profile = Self::select_tab(state, Tab::Profile, env);
                Effect::merge(vec![profile, push(state, PathState::MyBadge(MyBadgeState))])
            },
        }
    }

    fn relay_login(state: &MainTabState) -> Effect<MainTabAction> {
        let mut sends = vec![
            Effect::send(MainTabAction::Home(HomeTabAction::SessionRefreshed)),
            Effect::send(MainTabAction::Profile(ProfileTabAction::SessionRefreshed)),
        ];
        sends.extend(
            state
                .path
                .iter()
                .filter_map(|(id, screen)| screen.session_refreshed().map(|action| Effect::send(element(id, action)))),
        );
        Effect::merge(sends)
    }
}

impl Reducer for MainTabCore {
    type State = MainTabState;
    type Action = MainTabAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let effect = match &action {
            MainTabAction::SelectedTabChanged(tab) => Self::select_tab(state, *tab, env),
            MainTabAction::AlertAction { alert, confirmed } => {
                state.alert = None;
                if *confirmed {
                    Self::answer_alert(*alert, state, env)
                } else {
                    Effect::None
                }
            },
            MainTabAction::Home(action) => Self::home_delegate(state, action),
            MainTabAction::MyChallenge(action) => Self::my_challenge_delegate(state, action),
            MainTabAction::Profile(action) => Self::profile_delegate(state, action),
            MainTabAction::SuccessLogin { is_new_user } => {
                tracing::info!(is_new_user, "login completed");
                Self::relay_login(state)
            },
            MainTabAction::Path(StackAction::Element { id, action }) => Self::route(state, *id, action, env),
            MainTabAction::Path(_) => Effect::None,
        };
        smallvec![effect]
    }
}

type Tabs = CombinedReducer<MainTabState, MainTabAction, AppEnvironment>;

/// Root reducer
pub struct MainTabFeature {
    inner: ForEachStack<Tabs, PathFeature>,
}

impl MainTabFeature {
    /// Tabs, routing and the navigation stack wired together
    #[must_use]
    pub fn new() -> Self {
        let reducers: Vec<BoxedReducer<MainTabState, MainTabAction, AppEnvironment>> = vec![
            Box::new(scope_reducer(
                HomeTabFeature::new(),
                home_state,
                home_action,
                MainTabAction::Home,
            )),
            Box::new(scope_reducer(
                MyChallengeTabFeature::new(),
                my_challenge_state,
                my_challenge_action,
                MainTabAction::MyChallenge,
            )),
            Box::new(scope_reducer(
                ProfileTabFeature::new(),
                profile_state,
                profile_action,
                MainTabAction::Profile,
            )),
            Box::new(MainTabCore),
        ];
        Self {
            inner: for_each_stack(
                "path",
                combine_reducers(reducers),
                PathFeature,
                path_state,
                path_action,
                MainTabAction::Path,
            ),
        }
    }
}

impl Default for MainTabFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MainTabFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainTabFeature").finish_non_exhaustive()
    }
}

impl Reducer for MainTabFeature {
    type State = MainTabState;
    type Action = MainTabAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        self.inner.reduce(state, action, env)
    }
}
