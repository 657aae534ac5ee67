//! Profile tab: the signed-in user, login and logout, location settings.

use crate::common::OnAppearType;
use crate::environment::AppEnvironment;
use popseoul_clients::User;
use popseoul_core::{Effect, Reducer, SmallVec, async_effect, smallvec};
use std::sync::Arc;

/// Prompts the profile tab asks the main tab to show
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileAlert {
    /// Log in to continue
    Login,
    /// Confirm logout
    Logout,
    /// Turn location access on in settings
    OnLocation,
    /// Turn location access off in settings
    OffLocation,
}

/// Profile tab state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileTabState {
    /// How the tab came on screen
    pub on_appear_type: OnAppearType,
    /// Session flag as last observed
    pub is_login: bool,
    /// Signed-in user
    pub user: Option<User>,
    /// Failed requests since launch
    pub network_errors: u32,
}

/// Profile tab actions
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileTabAction {
    /// The tab came on screen
    OnAppear,
    /// The user arrived
    UserFetched(User),
    /// The session changed
    SessionRefreshed,
    /// Login button
    LoginTapped,
    /// Logout button
    LogoutTapped,
    /// Location switch; `true` asks to turn it on
    LocationToggleTapped(bool),
    /// Delegate: ask the main tab for a prompt
    ShowAlert(ProfileAlert),
    /// The user confirmed logout
    ConfirmLogout,
    /// The session is gone
    LoggedOut,
    /// A request failed
    NetworkError,
}

const USER: &str = "profile/user";

/// Profile tab reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct ProfileTabFeature;

impl ProfileTabFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fetch_user(state: &mut ProfileTabState, env: &AppEnvironment) -> Effect<ProfileTabAction> {
        state.is_login = env.is_authenticated();
        if !state.is_login {
            state.user = None;
            return Effect::None;
        }
        let users = Arc::clone(&env.clients.users);
        async_effect! {
            match users.get_user().await {
                Ok(user) => Some(ProfileTabAction::UserFetched(user)),
                Err(error) => {
                    tracing::warn!(%error, "user fetch failed");
                    Some(ProfileTabAction::NetworkError)
                },
            }
        }
        .cancellable(USER, true)
    }
}

impl Reducer for ProfileTabFeature {
    type State = ProfileTabState;
    type Action = ProfileTabAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ProfileTabAction::OnAppear => {
                if state.on_appear_type == OnAppearType::Retained {
                    return smallvec![Effect::None];
                }
                state.on_appear_type = OnAppearType::Retained;
                smallvec![Self::fetch_user(state, env)]
            },

            ProfileTabAction::SessionRefreshed => smallvec![Self::fetch_user(state, env)],

            ProfileTabAction::UserFetched(user) => {
                state.user = Some(user);
                smallvec![Effect::None]
            },

            ProfileTabAction::LoginTapped => smallvec![Effect::send(ProfileTabAction::ShowAlert(ProfileAlert::Login))],

            ProfileTabAction::LogoutTapped => {
                smallvec![Effect::send(ProfileTabAction::ShowAlert(ProfileAlert::Logout))]
            },

            ProfileTabAction::LocationToggleTapped(on) => {
                let alert = if on {
                    ProfileAlert::OnLocation
                } else {
                    ProfileAlert::OffLocation
                };
                smallvec![Effect::send(ProfileTabAction::ShowAlert(alert))]
            },

            ProfileTabAction::ConfirmLogout => {
                let session = Arc::clone(&env.clients.session);
                smallvec![
                    Effect::cancel(USER),
                    async_effect! {
                        match session.logout().await {
                            Ok(()) => Some(ProfileTabAction::LoggedOut),
                            Err(error) => {
                                tracing::warn!(%error, "logout failed");
                                Some(ProfileTabAction::NetworkError)
                            },
                        }
                    },
                ]
            },

            ProfileTabAction::LoggedOut => {
                state.is_login = false;
                state.user = None;
                smallvec![Effect::None]
            },

            ProfileTabAction::NetworkError => {
                state.network_errors = state.network_errors.saturating_add(1);
                smallvec![Effect::None]
            },

            ProfileTabAction::ShowAlert(_) => smallvec![Effect::None],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::environment;
    use popseoul_clients::mocks::MockClients;
    use popseoul_core::EffectId;
    use popseoul_testing::{ReducerTest, assertions, run_effects};

    fn user() -> User {
        User {
            id: 7,
            nickname: "suni".to_string(),
            ..User::default()
        }
    }

    #[test]
    fn signed_out_appearance_skips_fetch() {
        let mocks = MockClients::new();
        ReducerTest::new(ProfileTabFeature::new())
            .with_env(environment(&mocks))
            .given_state(ProfileTabState {
                user: Some(user()),
                ..ProfileTabState::default()
            })
            .when_action(ProfileTabAction::OnAppear)
            .then_state(|state| {
                assert!(!state.is_login);
                assert_eq!(state.user, None);
                assert_eq!(state.on_appear_type, OnAppearType::Retained);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn location_toggle_raises_matching_alert() {
        let mocks = MockClients::new();
        ReducerTest::new(ProfileTabFeature::new())
            .with_env(environment(&mocks))
            .given_state(ProfileTabState::default())
            .when_action(ProfileTabAction::LocationToggleTapped(false))
            .then_effects(|effects| {
                assertions::assert_sends(effects, &[ProfileTabAction::ShowAlert(ProfileAlert::OffLocation)]);
            })
            .run();
    }

    #[tokio::test]
    async fn signed_in_appearance_fetches_user() {
        let mocks = MockClients::signed_in();
        mocks.server.set_user(user());
        let env = environment(&mocks);
        let mut state = ProfileTabState::default();

        let effects = ProfileTabFeature::new().reduce(&mut state, ProfileTabAction::OnAppear, &env);
        assert!(state.is_login);
        assertions::assert_cancellable(&effects, &EffectId::new(USER));

        let actions = run_effects(effects).await;
        assert_eq!(actions, vec![ProfileTabAction::UserFetched(user())]);
    }

    #[tokio::test]
    async fn confirmed_logout_ends_session_and_clears_user() {
        let mocks = MockClients::signed_in();
        let env = environment(&mocks);
        let mut state = ProfileTabState {
            is_login: true,
            user: Some(user()),
            ..ProfileTabState::default()
        };

        let effects = ProfileTabFeature::new().reduce(&mut state, ProfileTabAction::ConfirmLogout, &env);
        assertions::assert_cancels(&effects, &EffectId::new(USER));
        let actions = run_effects(effects).await;
        assert_eq!(actions, vec![ProfileTabAction::LoggedOut]);
        assert!(!env.is_authenticated());

        let _ = ProfileTabFeature::new().reduce(&mut state, ProfileTabAction::LoggedOut, &env);
        assert_eq!(state.user, None);
        assert!(!state.is_login);
    }
}
