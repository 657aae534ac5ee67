//! Session and login doubles.

use super::{Behavior, settle};
use crate::error::Result;
use crate::models::{AuthOutcome, AuthProvider};
use crate::{AuthClient, ClientFuture, SessionClient};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Session flag shared by every clone
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    authenticated: Arc<AtomicBool>,
    behavior: Behavior,
}

impl MockSession {
    /// Session with the given flag
    #[must_use]
    pub fn new(authenticated: bool) -> Self {
        Self::with_behavior(authenticated, Behavior::new())
    }

    /// Session with the given flag, recording into `behavior`
    #[must_use]
    pub fn with_behavior(authenticated: bool, behavior: Behavior) -> Self {
        Self {
            authenticated: Arc::new(AtomicBool::new(authenticated)),
            behavior,
        }
    }

    /// Sign in or out without a call
    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }
}

impl SessionClient for MockSession {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn logout(&self) -> ClientFuture<'_, Result<()>> {
        let (latency, failure) = self.behavior.begin("session.logout", "session.logout()".to_string());
        Box::pin(async move {
            settle(latency).await;
            if let Some(error) = failure {
                return Err(error);
            }
            self.set_authenticated(false);
            Ok(())
        })
    }
}

/// Login that signs the linked [`MockSession`] in on success
#[derive(Debug, Clone)]
pub struct MockAuth {
    session: MockSession,
    new_user: Arc<AtomicBool>,
    behavior: Behavior,
}

impl MockAuth {
    /// Login for `session` with its own call log
    #[must_use]
    pub fn new(session: MockSession) -> Self {
        Self::with_behavior(session, Behavior::new())
    }

    /// Login for `session`, recording into `behavior`
    #[must_use]
    pub fn with_behavior(session: MockSession, behavior: Behavior) -> Self {
        Self {
            session,
            new_user: Arc::new(AtomicBool::new(false)),
            behavior,
        }
    }

    /// Whether the next logins report a freshly created account
    pub fn set_new_user(&self, new_user: bool) {
        self.new_user.store(new_user, Ordering::SeqCst);
    }
}

impl AuthClient for MockAuth {
    fn login(&self, provider: AuthProvider) -> ClientFuture<'_, Result<AuthOutcome>> {
        let name = match provider {
            AuthProvider::Google { .. } => "google",
            AuthProvider::Apple { .. } => "apple",
            AuthProvider::Facebook { .. } => "facebook",
        };
        let (latency, failure) = self.behavior.begin("auth.login", format!("auth.login({name})"));
        Box::pin(async move {
            settle(latency).await;
            if let Some(error) = failure {
                return Err(error);
            }
            self.session.set_authenticated(true);
            Ok(AuthOutcome {
                is_new_user: self.new_user.load(Ordering::SeqCst),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[tokio::test]
    async fn login_signs_session_in() {
        let session = MockSession::new(false);
        let auth = MockAuth::new(session.clone());
        auth.set_new_user(true);

        let outcome = auth
            .login(AuthProvider::Google {
                id_token: "token".to_string(),
            })
            .await;
        assert_eq!(outcome, Ok(AuthOutcome { is_new_user: true }));
        assert!(session.is_authenticated());

        assert_eq!(session.logout().await, Ok(()));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn failed_login_keeps_session_signed_out() {
        let behavior = Behavior::new();
        let session = MockSession::with_behavior(false, behavior.clone());
        let auth = MockAuth::with_behavior(session.clone(), behavior.clone());
        behavior.fail_next("auth.login", ApiError::Unauthenticated);

        let outcome = auth
            .login(AuthProvider::Apple {
                identity_token: "token".to_string(),
            })
            .await;
        assert_eq!(outcome, Err(ApiError::Unauthenticated));
        assert!(!session.is_authenticated());
        assert_eq!(behavior.calls(), vec!["auth.login(apple)"]);
    }
}
