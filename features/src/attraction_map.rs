//! Attraction map: a challenge's attractions ordered by distance, kept up to
//! date by the continuous location feed.

use crate::common::LoginAlertAction;
use crate::environment::AppEnvironment;
use crate::identity::replace_by_id;
use crate::optimistic::{Reconciled, predict_like, reconcile};
use futures::StreamExt;
use popseoul_clients::{Attraction, Challenge, Coordinate, LocationResult};
use popseoul_core::{Effect, Reducer, SmallVec, async_effect, smallvec};
use std::cmp::Ordering;
use std::sync::Arc;

/// Cancellation id of the location feed
pub const TRACKING: &str = "tracking";

/// Attraction map state
#[derive(Clone, Debug, PartialEq)]
pub struct AttractionMapState {
    /// Challenge whose attractions are shown
    pub challenge: Challenge,
    /// Attractions, nearest first once a fix is known
    pub attractions: Vec<Attraction>,
    /// Latest fix
    pub user_coordinate: Option<Coordinate>,
    /// The location feed is running
    pub is_tracking: bool,
    /// Login prompt on screen
    pub show_login_alert: bool,
    /// Failed requests while on screen
    pub network_errors: u32,
}

impl AttractionMapState {
    /// Map for `challenge`
    #[must_use]
    pub const fn new(challenge: Challenge) -> Self {
        Self {
            challenge,
            attractions: Vec::new(),
            user_coordinate: None,
            is_tracking: false,
            show_login_alert: false,
            network_errors: 0,
        }
    }
}

/// Attraction map actions
#[derive(Clone, Debug, PartialEq)]
pub enum AttractionMapAction {
    /// The screen came on screen
    OnAppear,
    /// Attractions arrived
    AttractionsFetched(Vec<Attraction>),
    /// Subscribe to the location feed
    StartTracking,
    /// Unsubscribe from the location feed
    StopTracking,
    /// The feed delivered a fix
    LocationUpdated(LocationResult),
    /// Like toggle on a pin
    TappedLike(i64),
    /// Replace an attraction by identity
    Update(Attraction),
    /// Delegate: open an attraction
    TappedDetail(i64),
    /// Raise the login prompt
    ShowLoginAlert,
    /// Login prompt buttons
    LoginAlert(LoginAlertAction),
    /// The session changed
    SessionRefreshed,
    /// Delegate: leave the screen
    TappedBack,
    /// A request failed
    NetworkError,
}

/// Attraction map reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct AttractionMapFeature;

impl AttractionMapFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fetch(state: &AttractionMapState, env: &AppEnvironment) -> Effect<AttractionMapAction> {
        let challenge_id = state.challenge.id;
        let client = Arc::clone(&env.clients.attractions);
        async_effect! {
            match client.fetch_for_challenge(challenge_id).await {
                Ok(list) => Some(AttractionMapAction::AttractionsFetched(list)),
                Err(error) => {
                    tracing::warn!(challenge_id, %error, "map attraction fetch failed");
                    Some(AttractionMapAction::NetworkError)
                },
            }
        }
        .cancellable("fetch", true)
    }

    fn tapped_like(state: &AttractionMapState, id: i64, env: &AppEnvironment) -> Effect<AttractionMapAction> {
        let Some(current) = state.attractions.iter().find(|attraction| attraction.id == id) else {
            return Effect::None;
        };
        let predicted = predict_like(current);
        let predicted_flag = predicted.is_liked;
        let client = Arc::clone(&env.clients.attractions);
        Effect::merge(vec![
            Effect::send(AttractionMapAction::Update(predicted)),
            async_effect! {
                match reconcile(
                    client.put_like(id),
                    |response| response.is_liked == predicted_flag,
                    |response| client.get(response.id),
                )
                .await
                {
                    Reconciled::Confirmed(_) => None,
                    Reconciled::Corrected { fresh, .. } => Some(AttractionMapAction::Update(fresh)),
                    Reconciled::Failed(error) => {
                        tracing::warn!(id, %error, "attraction like failed");
                        Some(AttractionMapAction::NetworkError)
                    },
                }
            },
        ])
    }
}

/// Order attractions by distance to `from`; attractions without a position
/// go last
pub fn sort_by_distance(attractions: &mut [Attraction], from: Coordinate) {
    let distance = |attraction: &Attraction| attraction.coordinate.map(|at| from.distance_to(&at));
    attractions.sort_by(|a, b| match (distance(a), distance(b)) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

impl Reducer for AttractionMapFeature {
    type State = AttractionMapState;
    type Action = AttractionMapAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AttractionMapAction::OnAppear => smallvec![
                Self::fetch(state, env),
                Effect::send(AttractionMapAction::StartTracking),
            ],

            AttractionMapAction::SessionRefreshed => smallvec![Self::fetch(state, env)],

            AttractionMapAction::AttractionsFetched(list) => {
                state.attractions = list;
                if let Some(from) = state.user_coordinate {
                    sort_by_distance(&mut state.attractions, from);
                }
                smallvec![Effect::None]
            },

            AttractionMapAction::StartTracking => {
                if state.is_tracking {
                    return smallvec![Effect::None];
                }
                state.is_tracking = true;
                let location = Arc::clone(&env.clients.location);
                let updates = futures::stream::once(async move { location.location_updates() })
                    .flatten()
                    .map(AttractionMapAction::LocationUpdated);
                smallvec![Effect::Stream(Box::pin(updates)).cancellable(TRACKING, true)]
            },

            AttractionMapAction::StopTracking => {
                state.is_tracking = false;
                smallvec![Effect::cancel(TRACKING)]
            },

            AttractionMapAction::LocationUpdated(LocationResult::Success(at)) => {
                state.user_coordinate = Some(at);
                sort_by_distance(&mut state.attractions, at);
                smallvec![Effect::None]
            },

            AttractionMapAction::LocationUpdated(LocationResult::Fail) => {
                tracing::debug!("location feed delivered no fix");
                smallvec![Effect::None]
            },

            AttractionMapAction::TappedLike(id) => {
                if !env.is_authenticated() {
                    return smallvec![Effect::send(AttractionMapAction::ShowLoginAlert)];
                }
                smallvec![Self::tapped_like(state, id, env)]
            },

            AttractionMapAction::Update(attraction) => {
                replace_by_id(&mut state.attractions, &attraction);
                smallvec![Effect::None]
            },

            AttractionMapAction::ShowLoginAlert => {
                state.show_login_alert = true;
                smallvec![Effect::None]
            },

            AttractionMapAction::LoginAlert(_) => {
                state.show_login_alert = false;
                smallvec![Effect::None]
            },

            AttractionMapAction::NetworkError => {
                state.network_errors = state.network_errors.saturating_add(1);
                smallvec![Effect::None]
            },

            AttractionMapAction::TappedDetail(_) | AttractionMapAction::TappedBack => smallvec![Effect::None],
        }
    }
}
