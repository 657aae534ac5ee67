//! Theme challenge screen: every challenge of one theme, with theme tabs.

use crate::common::{FetchType, LoginAlertAction};
use crate::config::DedupPolicy;
use crate::environment::AppEnvironment;
use crate::identity::replace_by_id;
use crate::optimistic::{Reconciled, predict_like, reconcile};
use popseoul_clients::{Challenge, ChallengeTheme};
use popseoul_core::{Effect, Reducer, SmallVec, async_effect, smallvec};
use std::sync::Arc;

/// Theme challenge state
#[derive(Clone, Debug, PartialEq)]
pub struct ThemeChallengeState {
    /// Why the list is being fetched
    pub fetch_type: FetchType,
    /// Session flag as last observed
    pub is_login: bool,
    /// Theme the screen was opened with
    pub init_theme: ChallengeTheme,
    /// Theme tab on screen
    pub selected_theme: ChallengeTheme,
    /// Challenges of the selected theme
    pub challenges: Vec<Challenge>,
    /// Theme with a fetch in flight
    pub loading: Option<ChallengeTheme>,
    /// Scroll the list back to the top
    pub should_scroll_to_top: bool,
    /// Login prompt on screen
    pub show_login_alert: bool,
    /// Failed requests while on screen
    pub network_errors: u32,
}

impl ThemeChallengeState {
    /// Screen opened on `theme`
    #[must_use]
    pub fn new(theme: ChallengeTheme) -> Self {
        Self {
            fetch_type: FetchType::Initial,
            is_login: false,
            init_theme: theme,
            selected_theme: theme,
            challenges: Vec::new(),
            loading: None,
            should_scroll_to_top: false,
            show_login_alert: false,
            network_errors: 0,
        }
    }
}

/// Theme challenge actions
#[derive(Clone, Debug, PartialEq)]
pub enum ThemeChallengeAction {
    /// The screen came on screen
    OnAppear,
    /// Select a theme tab
    ThemeChanged(ChallengeTheme),
    /// Fetch one theme
    FetchThemeList(ChallengeTheme),
    /// Challenges of a theme arrived
    UpdateThemeList(ChallengeTheme, Vec<Challenge>),
    /// Theme fetch failed
    FetchFailed(ChallengeTheme),
    /// The list finished scrolling
    SetShouldScrollToTop(bool),
    /// Like toggle on a row
    TappedLike(i64),
    /// Replace a challenge by identity
    Update(Challenge),
    /// Raise the login prompt
    ShowLoginAlert,
    /// Login prompt buttons
    LoginAlert(LoginAlertAction),
    /// The session changed
    SessionRefreshed,
    /// Delegate: open a challenge
    TappedChallenge(i64),
    /// Delegate: leave the screen
    TappedBack,
    /// A request failed
    NetworkError,
}

const FETCH: &str = "fetch";

/// Theme challenge reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct ThemeChallengeFeature;

impl ThemeChallengeFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fetch(state: &mut ThemeChallengeState, theme: ChallengeTheme, env: &AppEnvironment) -> Effect<ThemeChallengeAction> {
        let cancel_in_flight = match env.config.theme_screen_dedup {
            DedupPolicy::TrackInFlight if state.loading == Some(theme) => {
                tracing::debug!(%theme, "theme fetch already in flight");
                return Effect::None;
            },
            DedupPolicy::TrackInFlight => false,
            DedupPolicy::LatestWins => true,
        };
        state.loading = Some(theme);

        let lists = Arc::clone(&env.clients.challenge_lists);
        async_effect! {
            match lists.fetch_theme_list(theme).await {
                Ok(list) => Some(ThemeChallengeAction::UpdateThemeList(theme, list)),
                Err(error) => {
                    tracing::warn!(%theme, %error, "theme screen fetch failed");
                    Some(ThemeChallengeAction::FetchFailed(theme))
                },
            }
        }
        .cancellable(FETCH, cancel_in_flight)
    }

    fn tapped_like(state: &ThemeChallengeState, id: i64, env: &AppEnvironment) -> Effect<ThemeChallengeAction> {
        if !env.is_authenticated() {
            return Effect::send(ThemeChallengeAction::ShowLoginAlert);
        }
        let Some(current) = state.challenges.iter().find(|challenge| challenge.id == id) else {
            tracing::debug!(id, "like for a challenge no longer listed");
            return Effect::None;
        };
        let predicted = predict_like(current);
        let predicted_flag = predicted.is_liked;
        let client = Arc::clone(&env.clients.challenges);
        Effect::merge(vec![
            Effect::send(ThemeChallengeAction::Update(predicted)),
            async_effect! {
                match reconcile(
                    client.put_like(id),
                    |response| response.is_liked == predicted_flag,
                    |response| client.get(response.id),
                )
                .await
                {
                    Reconciled::Confirmed(_) => None,
                    Reconciled::Corrected { fresh, .. } => Some(ThemeChallengeAction::Update(fresh)),
                    Reconciled::Failed(error) => {
                        tracing::warn!(id, %error, "like failed");
                        Some(ThemeChallengeAction::NetworkError)
                    },
                }
            },
        ])
    }
}

impl Reducer for ThemeChallengeFeature {
    type State = ThemeChallengeState;
    type Action = ThemeChallengeAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ThemeChallengeAction::OnAppear => {
                state.is_login = env.is_authenticated();
                if state.fetch_type == FetchType::Initial {
                    smallvec![Effect::send(ThemeChallengeAction::ThemeChanged(state.init_theme))]
                } else {
                    state.fetch_type = FetchType::Resumed;
                    smallvec![Effect::send(ThemeChallengeAction::FetchThemeList(state.selected_theme))]
                }
            },

            ThemeChallengeAction::ThemeChanged(theme) => {
                state.selected_theme = theme;
                state.fetch_type = FetchType::TabChanged;
                smallvec![Effect::send(ThemeChallengeAction::FetchThemeList(theme))]
            },

            ThemeChallengeAction::FetchThemeList(theme) => smallvec![Self::fetch(state, theme, env)],

            ThemeChallengeAction::UpdateThemeList(theme, list) => {
                if state.loading == Some(theme) {
                    state.loading = None;
                }
                if theme != state.selected_theme {
                    tracing::debug!(%theme, "dropping list for a stale theme");
                    return smallvec![Effect::None];
                }
                state.challenges = list;
                if state.fetch_type == FetchType::TabChanged {
                    state.fetch_type = FetchType::Resumed;
                    return smallvec![Effect::send(ThemeChallengeAction::SetShouldScrollToTop(true))];
                }
                smallvec![Effect::None]
            },

            ThemeChallengeAction::FetchFailed(theme) => {
                if state.loading == Some(theme) {
                    state.loading = None;
                }
                smallvec![Effect::send(ThemeChallengeAction::NetworkError)]
            },

            ThemeChallengeAction::SetShouldScrollToTop(top) => {
                state.should_scroll_to_top = top;
                smallvec![Effect::None]
            },

            ThemeChallengeAction::TappedLike(id) => smallvec![Self::tapped_like(state, id, env)],

            ThemeChallengeAction::Update(challenge) => {
                replace_by_id(&mut state.challenges, &challenge);
                smallvec![Effect::None]
            },

            ThemeChallengeAction::ShowLoginAlert => {
                state.show_login_alert = true;
                smallvec![Effect::None]
            },

            ThemeChallengeAction::LoginAlert(_) => {
                state.show_login_alert = false;
                smallvec![Effect::None]
            },

            ThemeChallengeAction::SessionRefreshed => {
                state.is_login = env.is_authenticated();
                smallvec![Effect::send(ThemeChallengeAction::FetchThemeList(state.selected_theme))]
            },

            ThemeChallengeAction::NetworkError => {
                state.network_errors = state.network_errors.saturating_add(1);
                smallvec![Effect::None]
            },

            ThemeChallengeAction::TappedChallenge(_) | ThemeChallengeAction::TappedBack => smallvec![Effect::None],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{challenge, environment};
    use popseoul_clients::mocks::MockClients;
    use popseoul_testing::{ReducerTest, assertions, run_effects};

    #[test]
    fn first_appearance_selects_initial_theme() {
        let mocks = MockClients::new();
        ReducerTest::new(ThemeChallengeFeature::new())
            .with_env(environment(&mocks))
            .given_state(ThemeChallengeState::new(ChallengeTheme::KCulture))
            .when_action(ThemeChallengeAction::OnAppear)
            .then_effects(|effects| {
                assertions::assert_sends(effects, &[ThemeChallengeAction::ThemeChanged(ChallengeTheme::KCulture)]);
            })
            .run();
    }

    #[test]
    fn tab_change_scrolls_to_top_once_loaded() {
        let mocks = MockClients::new();
        ReducerTest::new(ThemeChallengeFeature::new())
            .with_env(environment(&mocks))
            .given_state(ThemeChallengeState::new(ChallengeTheme::KCulture))
            .when_action(ThemeChallengeAction::ThemeChanged(ChallengeTheme::LocalTour))
            .when_action(ThemeChallengeAction::UpdateThemeList(
                ChallengeTheme::LocalTour,
                vec![challenge(1)],
            ))
            .then_state(|state| {
                assert_eq!(state.fetch_type, FetchType::Resumed);
                assert_eq!(state.loading, None);
                assert_eq!(state.challenges, vec![challenge(1)]);
            })
            .then_effects(|effects| {
                assertions::assert_sends(effects, &[ThemeChallengeAction::SetShouldScrollToTop(true)]);
            })
            .run();
    }

    #[test]
    fn stale_theme_answer_is_dropped() {
        let mocks = MockClients::new();
        ReducerTest::new(ThemeChallengeFeature::new())
            .with_env(environment(&mocks))
            .given_state(ThemeChallengeState::new(ChallengeTheme::KCulture))
            .when_action(ThemeChallengeAction::ThemeChanged(ChallengeTheme::LocalTour))
            .when_action(ThemeChallengeAction::UpdateThemeList(
                ChallengeTheme::KCulture,
                vec![challenge(1)],
            ))
            .then_state(|state| assert!(state.challenges.is_empty()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn theme_switch_cancels_previous_fetch() {
        let mocks = MockClients::new();
        ReducerTest::new(ThemeChallengeFeature::new())
            .with_env(environment(&mocks))
            .given_state(ThemeChallengeState::new(ChallengeTheme::KCulture))
            .when_action(ThemeChallengeAction::FetchThemeList(ChallengeTheme::KCulture))
            .when_action(ThemeChallengeAction::FetchThemeList(ChallengeTheme::LocalTour))
            .then_state(|state| assert_eq!(state.loading, Some(ChallengeTheme::LocalTour)))
            .then_effects(|effects| {
                assert!(matches!(
                    &effects[0],
                    Effect::Cancellable { id, cancel_in_flight: true, .. } if id.as_str() == FETCH
                ));
            })
            .run();
    }

    #[test]
    fn signed_out_like_raises_login_alert() {
        let mocks = MockClients::new();
        ReducerTest::new(ThemeChallengeFeature::new())
            .with_env(environment(&mocks))
            .given_state(ThemeChallengeState {
                challenges: vec![challenge(1)],
                ..ThemeChallengeState::new(ChallengeTheme::KCulture)
            })
            .when_action(ThemeChallengeAction::TappedLike(1))
            .then_effects(|effects| assertions::assert_sends(effects, &[ThemeChallengeAction::ShowLoginAlert]))
            .run();
    }

    #[tokio::test]
    async fn like_prediction_is_sent_before_the_request_settles() {
        let mocks = MockClients::signed_in();
        mocks.server.insert_challenge(challenge(1));
        let env = environment(&mocks);
        let mut state = ThemeChallengeState {
            challenges: vec![challenge(1), challenge(2)],
            ..ThemeChallengeState::new(ChallengeTheme::KCulture)
        };

        let effects = ThemeChallengeFeature::new().reduce(&mut state, ThemeChallengeAction::TappedLike(1), &env);
        let predicted = Challenge {
            is_liked: true,
            likes: 1,
            ..challenge(1)
        };
        assert_eq!(
            assertions::sent_actions(&effects),
            vec![ThemeChallengeAction::Update(predicted.clone())]
        );

        let actions = run_effects(effects).await;
        assert_eq!(actions, vec![ThemeChallengeAction::Update(predicted)]);
        assert_eq!(mocks.behavior.call_count("challenge.get"), 0);
    }
}
