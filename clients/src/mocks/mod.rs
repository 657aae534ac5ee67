//! In-memory collaborators for tests and the demo binary.
//!
//! Every mock records the calls it receives in a shared [`Behavior`], which
//! also holds injected latency and scripted failures. [`MockClients`] wires
//! one of each mock to a single `Behavior` so a test can read the complete,
//! ordered call log.

pub mod device;
pub mod server;
pub mod session;

pub use device::{MockLocation, MockPreferences};
pub use server::{ListKey, MockServer};
pub use session::{MockAuth, MockSession};

use crate::error::ApiError;
use crate::Clients;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct CallLog {
    calls: Vec<String>,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
    latency: Duration,
}

/// Call log, latency and failure injection shared by mocks
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    log: Arc<Mutex<CallLog>>,
}

impl Behavior {
    /// Fresh behavior: no latency, no failures
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received so far, in order, e.g. `challenge.put_like(42)`
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Number of calls of operation `op`, e.g. `challenge.get`
    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        let prefix = format!("{op}(");
        self.lock().calls.iter().filter(|call| call.starts_with(&prefix)).count()
    }

    /// Make the next call of `op` fail with `error`
    ///
    /// Several failures queue up and are consumed in order.
    pub fn fail_next(&self, op: &'static str, error: ApiError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Delay every answer by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Record a call and take its scripted outcome
    pub(crate) fn begin(&self, op: &'static str, call: String) -> (Duration, Option<ApiError>) {
        let mut log = self.lock();
        log.calls.push(call);
        let failure = log.failures.get_mut(op).and_then(VecDeque::pop_front);
        (log.latency, failure)
    }

    fn lock(&self) -> MutexGuard<'_, CallLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) async fn settle(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

/// One of every mock, sharing a single [`Behavior`]
///
/// ```
/// use popseoul_clients::mocks::MockClients;
///
/// let mocks = MockClients::signed_in();
/// let clients = mocks.clients();
/// assert!(clients.session.is_authenticated());
/// assert!(mocks.behavior.calls().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct MockClients {
    /// Challenge, list, attraction and user endpoints
    pub server: MockServer,
    /// Session flag
    pub session: MockSession,
    /// Login
    pub auth: MockAuth,
    /// Location
    pub location: MockLocation,
    /// Preferences
    pub preferences: MockPreferences,
    /// Shared call log
    pub behavior: Behavior,
}

impl MockClients {
    /// Mocks with a signed-out session
    #[must_use]
    pub fn new() -> Self {
        let behavior = Behavior::new();
        let session = MockSession::with_behavior(false, behavior.clone());
        Self {
            server: MockServer::with_behavior(behavior.clone()),
            auth: MockAuth::with_behavior(session.clone(), behavior.clone()),
            session,
            location: MockLocation::with_behavior(behavior.clone()),
            preferences: MockPreferences::new(),
            behavior,
        }
    }

    /// Mocks with a signed-in session
    #[must_use]
    pub fn signed_in() -> Self {
        let mocks = Self::new();
        mocks.session.set_authenticated(true);
        mocks
    }

    /// The collaborator bundle backed by these mocks
    #[must_use]
    pub fn clients(&self) -> Clients {
        let server = Arc::new(self.server.clone());
        Clients {
            challenges: server.clone(),
            challenge_lists: server.clone(),
            attractions: server.clone(),
            users: server,
            auth: Arc::new(self.auth.clone()),
            session: Arc::new(self.session.clone()),
            location: Arc::new(self.location.clone()),
            preferences: Arc::new(self.preferences.clone()),
        }
    }
}

impl Default for MockClients {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_consumed_in_order() {
        let behavior = Behavior::new();
        behavior.fail_next("challenge.get", ApiError::Connectivity);
        behavior.fail_next("challenge.get", ApiError::ServerError(503));

        let (_, first) = behavior.begin("challenge.get", "challenge.get(1)".to_string());
        let (_, second) = behavior.begin("challenge.get", "challenge.get(1)".to_string());
        let (_, third) = behavior.begin("challenge.get", "challenge.get(1)".to_string());
        assert_eq!(first, Some(ApiError::Connectivity));
        assert_eq!(second, Some(ApiError::ServerError(503)));
        assert_eq!(third, None);
        assert_eq!(behavior.call_count("challenge.get"), 3);
    }

    #[test]
    fn call_count_matches_whole_operation_name() {
        let behavior = Behavior::new();
        let _ = behavior.begin("challenge.get", "challenge.get(1)".to_string());
        let _ = behavior.begin("challenge.get_all", "challenge.get_all()".to_string());
        assert_eq!(behavior.call_count("challenge.get"), 1);
    }
}
