//! # `PopSeoul` Clients
//!
//! Domain records and the collaborator interfaces feature reducers talk to.
//!
//! Features never reach a network, a location manager or a key-value store
//! directly. They hold a [`Clients`] bundle in their environment and call
//! these traits from inside effects. Production code plugs in real
//! implementations; tests plug in [`mocks::MockClients`].
//!
//! # Dyn Compatibility
//!
//! Every trait returns explicit `Pin<Box<dyn Future>>` values instead of
//! using `async fn`, so collaborators can be held as `Arc<dyn Trait>` and
//! cloned into effects.

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub mod error;
pub mod mocks;
pub mod models;

pub use error::{ApiError, Result};
pub use models::{
    Attraction, AuthOutcome, AuthProvider, AuthorizationStatus, Challenge, ChallengeStatus, ChallengeTheme,
    Coordinate, LikeResponse, LocationChallenges, LocationResult, StampChallenge, StampChallenges, StampResponse,
    StampedAttraction, StatusResponse, User,
};

/// Boxed future returned by collaborator calls
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed long-lived stream returned by collaborator subscriptions
pub type ClientStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Single-challenge operations
pub trait ChallengeClient: Send + Sync {
    /// Fetch a challenge by id
    fn get(&self, id: i64) -> ClientFuture<'_, Result<Challenge>>;

    /// Toggle the like flag; the answer carries the flag the server stored
    fn put_like(&self, id: i64) -> ClientFuture<'_, Result<LikeResponse>>;

    /// Change the user's progress on a challenge
    fn put_status(&self, id: i64, status: ChallengeStatus) -> ClientFuture<'_, Result<StatusResponse>>;

    /// Stamp an attraction of a challenge from the given position
    fn stamp(&self, challenge_id: i64, attraction_id: i64, at: Coordinate)
    -> ClientFuture<'_, Result<StampResponse>>;
}

/// Challenge list endpoints
pub trait ChallengeListClient: Send + Sync {
    /// "Seoul master" banner list
    fn fetch_seoul_list(&self) -> ClientFuture<'_, Result<Vec<Challenge>>>;

    /// Cultural event banner list
    fn fetch_cultural_list(&self) -> ClientFuture<'_, Result<Vec<Challenge>>>;

    /// Challenges within `radius` meters of `at`
    fn fetch_location_list(
        &self,
        at: Coordinate,
        radius: u32,
        limit: u32,
    ) -> ClientFuture<'_, Result<LocationChallenges>>;

    /// Challenges of one theme
    fn fetch_theme_list(&self, theme: ChallengeTheme) -> ClientFuture<'_, Result<Vec<Challenge>>>;

    /// Unfinished challenges, or suggestions when nothing is in progress
    fn fetch_missing_list(&self) -> ClientFuture<'_, Result<StampChallenges>>;

    /// Challenges containing the given attraction
    fn fetch_stamp_list(&self, attraction_id: i64) -> ClientFuture<'_, Result<StampChallenges>>;

    /// Most popular challenges
    fn fetch_rank_list(&self) -> ClientFuture<'_, Result<Vec<Challenge>>>;

    /// The user's challenges with the given status
    fn fetch_my_challenges(&self, status: ChallengeStatus) -> ClientFuture<'_, Result<Vec<Challenge>>>;
}

/// Attraction endpoints
pub trait AttractionClient: Send + Sync {
    /// Fetch an attraction by id
    fn get(&self, id: i64) -> ClientFuture<'_, Result<Attraction>>;

    /// Toggle the like flag
    fn put_like(&self, id: i64) -> ClientFuture<'_, Result<LikeResponse>>;

    /// Attractions that make up a challenge
    fn fetch_for_challenge(&self, challenge_id: i64) -> ClientFuture<'_, Result<Vec<Attraction>>>;
}

/// User profile endpoint
pub trait UserClient: Send + Sync {
    /// Profile of the signed-in user
    fn get_user(&self) -> ClientFuture<'_, Result<User>>;
}

/// Exchange of provider credentials for a session
pub trait AuthClient: Send + Sync {
    /// Log in with provider credentials
    fn login(&self, provider: AuthProvider) -> ClientFuture<'_, Result<AuthOutcome>>;
}

/// The current session
///
/// `is_authenticated` is a synchronous read: reducers consult it as ambient
/// input when deciding whether to short-circuit to a login prompt.
pub trait SessionClient: Send + Sync {
    /// Whether a session is present
    fn is_authenticated(&self) -> bool;

    /// End the session
    fn logout(&self) -> ClientFuture<'_, Result<()>>;
}

/// Device location
pub trait LocationClient: Send + Sync {
    /// Ask the user for permission, resolves once answered
    fn request_authorization(&self) -> ClientFuture<'_, ()>;

    /// Current permission
    fn authorization_status(&self) -> ClientFuture<'_, AuthorizationStatus>;

    /// One fix; [`LocationResult::Fail`] without permission
    fn current_location(&self) -> ClientFuture<'_, LocationResult>;

    /// Continuous updates until the stream is dropped
    fn location_updates(&self) -> ClientStream<LocationResult>;

    /// Open the system settings page of the app
    fn open_settings(&self) -> ClientFuture<'_, ()>;
}

/// Small persisted scalars
///
/// Reads and writes are synchronous. Features read them as ambient input and
/// write them from inside effects.
pub trait Preferences: Send + Sync {
    /// Last attraction the user stamped
    fn last_stamped_attraction(&self) -> Option<StampedAttraction>;

    /// Remember the last stamped attraction
    fn set_last_stamped_attraction(&self, attraction: StampedAttraction);

    /// Last known coordinate
    fn cached_coordinate(&self) -> Option<Coordinate>;

    /// Remember the last known coordinate
    fn set_cached_coordinate(&self, coordinate: Coordinate);
}

/// Every collaborator a feature may need
#[derive(Clone)]
pub struct Clients {
    /// Single-challenge operations
    pub challenges: Arc<dyn ChallengeClient>,
    /// Challenge lists
    pub challenge_lists: Arc<dyn ChallengeListClient>,
    /// Attractions
    pub attractions: Arc<dyn AttractionClient>,
    /// User profile
    pub users: Arc<dyn UserClient>,
    /// Login
    pub auth: Arc<dyn AuthClient>,
    /// Session
    pub session: Arc<dyn SessionClient>,
    /// Location
    pub location: Arc<dyn LocationClient>,
    /// Preferences
    pub preferences: Arc<dyn Preferences>,
}

impl std::fmt::Debug for Clients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clients")
            .field("authenticated", &self.session.is_authenticated())
            .finish_non_exhaustive()
    }
}
