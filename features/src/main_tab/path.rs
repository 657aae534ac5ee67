//! Screens pushed on the main tab's navigation stack.
//!
//! [`PathFeature`] runs the reducer matching a frame's variant. The
//! main tab asks [`PathAction::route`] what an element action means for the
//! stack: a table with one entry per screen instead of one nested match.

use crate::attraction_map::{AttractionMapAction, AttractionMapFeature, AttractionMapState};
use crate::common::LoginAlertAction;
use crate::complete_challenge::{CompleteChallengeAction, CompleteChallengeFeature, CompleteChallengeState};
use crate::detail_attraction::{DetailAttractionAction, DetailAttractionFeature, DetailAttractionState};
use crate::detail_challenge::{DetailChallengeAction, DetailChallengeFeature, DetailChallengeState};
use crate::environment::AppEnvironment;
use crate::login::{LoginAction, LoginFeature, LoginState};
use crate::my_badge::{MyBadgeAction, MyBadgeFeature, MyBadgeState};
use crate::rank_challenge::{RankChallengeAction, RankChallengeFeature, RankChallengeState};
use crate::theme_challenge::{ThemeChallengeAction, ThemeChallengeFeature, ThemeChallengeState};
use popseoul_core::{Effect, Reducer, SmallVec};

/// State of one pushed screen
#[derive(Clone, Debug, PartialEq)]
pub enum PathState {
    /// Challenge detail
    DetailChallenge(DetailChallengeState),
    /// Attraction detail
    DetailAttraction(DetailAttractionState),
    /// Challenges of a theme
    ThemeChallenge(ThemeChallengeState),
    /// Popularity ranking
    RankChallenge(RankChallengeState),
    /// Map of a challenge's attractions
    AttractionMap(AttractionMapState),
    /// Challenge completed
    CompleteChallenge(CompleteChallengeState),
    /// Collected badges
    MyBadge(MyBadgeState),
    /// Login
    Login(LoginState),
}

impl PathState {
    /// Action dispatched to the frame right after it is pushed
    #[must_use]
    pub const fn on_appear(&self) -> Option<PathAction> {
        match self {
            Self::DetailChallenge(_) => Some(PathAction::DetailChallenge(DetailChallengeAction::OnAppear)),
            Self::DetailAttraction(_) => Some(PathAction::DetailAttraction(DetailAttractionAction::OnAppear)),
            Self::ThemeChallenge(_) => Some(PathAction::ThemeChallenge(ThemeChallengeAction::OnAppear)),
            Self::RankChallenge(_) => Some(PathAction::RankChallenge(RankChallengeAction::OnAppear)),
            Self::AttractionMap(_) => Some(PathAction::AttractionMap(AttractionMapAction::OnAppear)),
            Self::CompleteChallenge(_) | Self::MyBadge(_) | Self::Login(_) => None,
        }
    }

    /// Whether `action` is addressed to a screen of this kind
    #[must_use]
    pub const fn accepts(&self, action: &PathAction) -> bool {
        matches!(
            (self, action),
            (Self::DetailChallenge(_), PathAction::DetailChallenge(_))
                | (Self::DetailAttraction(_), PathAction::DetailAttraction(_))
                | (Self::ThemeChallenge(_), PathAction::ThemeChallenge(_))
                | (Self::RankChallenge(_), PathAction::RankChallenge(_))
                | (Self::AttractionMap(_), PathAction::AttractionMap(_))
                | (Self::CompleteChallenge(_), PathAction::CompleteChallenge(_))
                | (Self::MyBadge(_), PathAction::MyBadge(_))
                | (Self::Login(_), PathAction::Login(_))
        )
    }

    /// Action telling the frame the session changed, for screens that
    /// depend on it
    #[must_use]
    pub const fn session_refreshed(&self) -> Option<PathAction> {
        match self {
            Self::DetailChallenge(_) => Some(PathAction::DetailChallenge(DetailChallengeAction::SessionRefreshed)),
            Self::DetailAttraction(_) => Some(PathAction::DetailAttraction(DetailAttractionAction::SessionRefreshed)),
            Self::ThemeChallenge(_) => Some(PathAction::ThemeChallenge(ThemeChallengeAction::SessionRefreshed)),
            Self::AttractionMap(_) => Some(PathAction::AttractionMap(AttractionMapAction::SessionRefreshed)),
            Self::RankChallenge(_) | Self::CompleteChallenge(_) | Self::MyBadge(_) | Self::Login(_) => None,
        }
    }
}

/// Action of one pushed screen
#[derive(Clone, Debug, PartialEq)]
pub enum PathAction {
    /// Challenge detail
    DetailChallenge(DetailChallengeAction),
    /// Attraction detail
    DetailAttraction(DetailAttractionAction),
    /// Challenges of a theme
    ThemeChallenge(ThemeChallengeAction),
    /// Popularity ranking
    RankChallenge(RankChallengeAction),
    /// Map of a challenge's attractions
    AttractionMap(AttractionMapAction),
    /// Challenge completed
    CompleteChallenge(CompleteChallengeAction),
    /// Collected badges
    MyBadge(MyBadgeAction),
    /// Login
    Login(LoginAction),
}

/// What an element action asks of the stack
#[derive(Clone, Debug, PartialEq)]
pub enum PathRoute {
    /// Push a new screen
    Push(PathState),
    /// Pop the sending frame
    Dismiss,
    /// The login frame finished; pop it and relay the login
    LoginSucceeded {
        /// The account was created by this login
        is_new_user: bool,
    },
    /// Clear the stack, select the profile tab and show the badges
    ShowBadges,
}

impl PathAction {
    /// Stack consequence of this action, if any
    #[must_use]
    pub fn route(&self) -> Option<PathRoute> {
        match self {
            Self::DetailChallenge(action) => detail_challenge_route(action),
            Self::DetailAttraction(action) => detail_attraction_route(action),
            Self::ThemeChallenge(action) => theme_challenge_route(action),
            Self::RankChallenge(action) => rank_challenge_route(action),
            Self::AttractionMap(action) => attraction_map_route(action),
            Self::CompleteChallenge(action) => complete_challenge_route(*action),
            Self::MyBadge(MyBadgeAction::TappedBack) => Some(PathRoute::Dismiss),
            Self::Login(action) => login_route(action),
        }
    }
}

const fn push_login() -> Option<PathRoute> {
    Some(PathRoute::Push(PathState::Login(LoginState::new(false))))
}

const fn push_detail_challenge(id: i64) -> Option<PathRoute> {
    Some(PathRoute::Push(PathState::DetailChallenge(DetailChallengeState::new(id))))
}

const fn push_detail_attraction(id: i64) -> Option<PathRoute> {
    Some(PathRoute::Push(PathState::DetailAttraction(DetailAttractionState::new(id))))
}

fn detail_challenge_route(action: &DetailChallengeAction) -> Option<PathRoute> {
    match action {
        DetailChallengeAction::TappedAttraction(id) => push_detail_attraction(*id),
        DetailChallengeAction::MoveToMap(challenge) => Some(PathRoute::Push(PathState::AttractionMap(
            AttractionMapState::new(challenge.clone()),
        ))),
        DetailChallengeAction::ShowCompleteChallenge(theme) => Some(PathRoute::Push(PathState::CompleteChallenge(
            CompleteChallengeState::new(*theme),
        ))),
        DetailChallengeAction::LoginAlert(LoginAlertAction::LoginTapped) => push_login(),
        DetailChallengeAction::TappedBack => Some(PathRoute::Dismiss),
        _ => None,
    }
}

fn detail_attraction_route(action: &DetailAttractionAction) -> Option<PathRoute> {
    match action {
        DetailAttractionAction::LoginAlert(LoginAlertAction::LoginTapped) => push_login(),
        DetailAttractionAction::TappedBack => Some(PathRoute::Dismiss),
        _ => None,
    }
}

fn theme_challenge_route(action: &ThemeChallengeAction) -> Option<PathRoute> {
    match action {
        ThemeChallengeAction::TappedChallenge(id) => push_detail_challenge(*id),
        ThemeChallengeAction::LoginAlert(LoginAlertAction::LoginTapped) => push_login(),
        ThemeChallengeAction::TappedBack => Some(PathRoute::Dismiss),
        _ => None,
    }
}

fn rank_challenge_route(action: &RankChallengeAction) -> Option<PathRoute> {
    match action {
        RankChallengeAction::TappedChallenge(id) => push_detail_challenge(*id),
        RankChallengeAction::LoginAlert(LoginAlertAction::LoginTapped) => push_login(),
        RankChallengeAction::TappedBack => Some(PathRoute::Dismiss),
        _ => None,
    }
}

fn attraction_map_route(action: &AttractionMapAction) -> Option<PathRoute> {
    match action {
        AttractionMapAction::TappedDetail(id) => push_detail_attraction(*id),
        AttractionMapAction::LoginAlert(LoginAlertAction::LoginTapped) => push_login(),
        AttractionMapAction::TappedBack => Some(PathRoute::Dismiss),
        _ => None,
    }
}

const fn complete_challenge_route(action: CompleteChallengeAction) -> Option<PathRoute> {
    match action {
        CompleteChallengeAction::MoveToBadge => Some(PathRoute::ShowBadges),
        CompleteChallengeAction::TappedBack => Some(PathRoute::Dismiss),
    }
}

fn login_route(action: &LoginAction) -> Option<PathRoute> {
    match action {
        LoginAction::SuccessLogin { is_new_user } => Some(PathRoute::LoginSucceeded {
            is_new_user: *is_new_user,
        }),
        LoginAction::BackTapped | LoginAction::AroundTapped => Some(PathRoute::Dismiss),
        _ => None,
    }
}

/// Reducer of one frame: runs the feature matching the frame's variant
#[derive(Clone, Copy, Debug, Default)]
pub struct PathFeature;

fn lift<R>(
    reducer: &R,
    state: &mut R::State,
    action: R::Action,
    env: &AppEnvironment,
    embed: fn(R::Action) -> PathAction,
) -> SmallVec<[Effect<PathAction>; 4]>
where
    R: Reducer<Environment = AppEnvironment>,
    R::Action: Send + 'static,
{
    reducer
        .reduce(state, action, env)
        .into_iter()
        .map(|effect| effect.map(embed))
        .collect()
}

impl Reducer for PathFeature {
    type State = PathState;
    type Action = PathAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match (state, action) {
            (PathState::DetailChallenge(state), PathAction::DetailChallenge(action)) => {
                lift(&DetailChallengeFeature, state, action, env, PathAction::DetailChallenge)
            },
            (PathState::DetailAttraction(state), PathAction::DetailAttraction(action)) => {
                lift(&DetailAttractionFeature, state, action, env, PathAction::DetailAttraction)
            },
            (PathState::ThemeChallenge(state), PathAction::ThemeChallenge(action)) => {
                lift(&ThemeChallengeFeature, state, action, env, PathAction::ThemeChallenge)
            },
            (PathState::RankChallenge(state), PathAction::RankChallenge(action)) => {
                lift(&RankChallengeFeature, state, action, env, PathAction::RankChallenge)
            },
            (PathState::AttractionMap(state), PathAction::AttractionMap(action)) => {
                lift(&AttractionMapFeature, state, action, env, PathAction::AttractionMap)
            },
            (PathState::CompleteChallenge(state), PathAction::CompleteChallenge(action)) => {
                lift(&CompleteChallengeFeature, state, action, env, PathAction::CompleteChallenge)
            },
            (PathState::MyBadge(state), PathAction::MyBadge(action)) => {
                lift(&MyBadgeFeature, state, action, env, PathAction::MyBadge)
            },
            (PathState::Login(state), PathAction::Login(action)) => {
                lift(&LoginFeature, state, action, env, PathAction::Login)
            },
            (_, action) => {
                tracing::debug!(?action, "dropping action for a frame of another screen");
                SmallVec::new()
            },
        }
    }
}
