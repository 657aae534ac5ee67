//! Location and preference doubles.

use super::{Behavior, settle};
use crate::models::{AuthorizationStatus, Coordinate, LocationResult, StampedAttraction};
use crate::{ClientFuture, ClientStream, LocationClient, Preferences};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug)]
struct LocationState {
    status: AuthorizationStatus,
    answer_on_request: Option<AuthorizationStatus>,
    current: LocationResult,
}

/// Scriptable location manager
///
/// Continuous updates are pushed by the test with
/// [`MockLocation::send_update`]; every stream returned by
/// `location_updates` receives them until it is dropped.
#[derive(Debug, Clone)]
pub struct MockLocation {
    state: Arc<Mutex<LocationState>>,
    updates: broadcast::Sender<LocationResult>,
    behavior: Behavior,
}

impl MockLocation {
    /// Undetermined permission, no fix
    #[must_use]
    pub fn new() -> Self {
        Self::with_behavior(Behavior::new())
    }

    /// Undetermined permission, recording into `behavior`
    #[must_use]
    pub fn with_behavior(behavior: Behavior) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            state: Arc::new(Mutex::new(LocationState {
                status: AuthorizationStatus::NotDetermined,
                answer_on_request: None,
                current: LocationResult::Fail,
            })),
            updates,
            behavior,
        }
    }

    /// Set the permission
    pub fn set_status(&self, status: AuthorizationStatus) {
        self.lock().status = status;
    }

    /// Permission the user grants when asked
    pub fn answer_request_with(&self, status: AuthorizationStatus) {
        self.lock().answer_on_request = Some(status);
    }

    /// Fix returned by `current_location` while authorized
    pub fn set_current(&self, result: LocationResult) {
        self.lock().current = result;
    }

    /// Deliver an update to every open stream; returns how many received it
    pub fn send_update(&self, result: LocationResult) -> usize {
        self.updates.send(result).unwrap_or(0)
    }

    /// Number of open update streams
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.updates.receiver_count()
    }

    fn record(&self, op: &'static str) -> std::time::Duration {
        self.behavior.begin(op, format!("{op}()")).0
    }

    fn lock(&self) -> MutexGuard<'_, LocationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationClient for MockLocation {
    fn request_authorization(&self) -> ClientFuture<'_, ()> {
        let latency = self.record("location.request_authorization");
        Box::pin(async move {
            settle(latency).await;
            let mut state = self.lock();
            if let (AuthorizationStatus::NotDetermined, Some(answer)) = (state.status, state.answer_on_request) {
                state.status = answer;
            }
        })
    }

    fn authorization_status(&self) -> ClientFuture<'_, AuthorizationStatus> {
        let latency = self.record("location.authorization_status");
        Box::pin(async move {
            settle(latency).await;
            self.lock().status
        })
    }

    fn current_location(&self) -> ClientFuture<'_, LocationResult> {
        let latency = self.record("location.current");
        Box::pin(async move {
            settle(latency).await;
            let state = self.lock();
            if state.status.is_authorized() {
                state.current
            } else {
                LocationResult::Fail
            }
        })
    }

    fn location_updates(&self) -> ClientStream<LocationResult> {
        let _ = self.record("location.updates");
        let receiver = self.updates.subscribe();
        Box::pin(futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(result) => return Some((result, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "location stream lagged");
                    },
                    Err(RecvError::Closed) => return None,
                }
            }
        }))
    }

    fn open_settings(&self) -> ClientFuture<'_, ()> {
        let latency = self.record("location.open_settings");
        Box::pin(settle(latency))
    }
}

#[derive(Debug, Default)]
struct Stored {
    last_stamped: Option<StampedAttraction>,
    coordinate: Option<Coordinate>,
}

/// In-memory preferences
#[derive(Debug, Clone, Default)]
pub struct MockPreferences {
    stored: Arc<Mutex<Stored>>,
}

impl MockPreferences {
    /// Empty preferences
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Stored> {
        self.stored.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Preferences for MockPreferences {
    fn last_stamped_attraction(&self) -> Option<StampedAttraction> {
        self.lock().last_stamped.clone()
    }

    fn set_last_stamped_attraction(&self, attraction: StampedAttraction) {
        self.lock().last_stamped = Some(attraction);
    }

    fn cached_coordinate(&self) -> Option<Coordinate> {
        self.lock().coordinate
    }

    fn set_cached_coordinate(&self, coordinate: Coordinate) {
        self.lock().coordinate = Some(coordinate);
    }
}
