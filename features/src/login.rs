//! Login screen: exchanges a provider credential for a session.

use crate::environment::AppEnvironment;
use popseoul_clients::AuthProvider;
use popseoul_core::{Effect, Reducer, SmallVec, async_effect, smallvec};
use std::sync::Arc;

/// Login state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoginState {
    /// Shown at launch rather than pushed from a screen
    pub is_init: bool,
    /// A login request is in flight
    pub is_loading: bool,
    /// The last attempt failed
    pub failed: bool,
}

impl LoginState {
    /// Login screen; `is_init` when shown at launch
    #[must_use]
    pub const fn new(is_init: bool) -> Self {
        Self {
            is_init,
            is_loading: false,
            failed: false,
        }
    }
}

/// Login actions
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginAction {
    /// Google sign-in produced an id token
    GoogleSignInCompleted(String),
    /// Apple sign-in produced an identity token
    AppleSignInCompleted(String),
    /// Facebook sign-in produced an email
    FacebookSignInCompleted(String),
    /// Exchange a credential for a session
    AuthLogin(AuthProvider),
    /// Delegate: a session exists
    SuccessLogin {
        /// The account was created by this login
        is_new_user: bool,
    },
    /// The login failed
    LoginError,
    /// Delegate: leave the screen
    BackTapped,
    /// Delegate: browse without logging in
    AroundTapped,
}

/// Login reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct LoginFeature;

impl LoginFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for LoginFeature {
    type State = LoginState;
    type Action = LoginAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            LoginAction::GoogleSignInCompleted(id_token) => {
                smallvec![Effect::send(LoginAction::AuthLogin(AuthProvider::Google { id_token }))]
            },
            LoginAction::AppleSignInCompleted(identity_token) => {
                smallvec![Effect::send(LoginAction::AuthLogin(AuthProvider::Apple { identity_token }))]
            },
            LoginAction::FacebookSignInCompleted(email) => {
                smallvec![Effect::send(LoginAction::AuthLogin(AuthProvider::Facebook { email }))]
            },

            LoginAction::AuthLogin(provider) => {
                if state.is_loading {
                    return smallvec![Effect::None];
                }
                state.is_loading = true;
                state.failed = false;
                let auth = Arc::clone(&env.clients.auth);
                smallvec![
                    async_effect! {
                        match auth.login(provider).await {
                            Ok(outcome) => Some(LoginAction::SuccessLogin {
                                is_new_user: outcome.is_new_user,
                            }),
                            Err(error) => {
                                tracing::error!(%error, "login failed");
                                Some(LoginAction::LoginError)
                            },
                        }
                    }
                    .cancellable("login", true)
                ]
            },

            LoginAction::SuccessLogin { .. } => {
                state.is_loading = false;
                smallvec![Effect::None]
            },

            LoginAction::LoginError => {
                state.is_loading = false;
                state.failed = true;
                smallvec![Effect::None]
            },

            LoginAction::BackTapped | LoginAction::AroundTapped => smallvec![Effect::None],
        }
    }
}
