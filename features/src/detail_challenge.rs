//! Detail challenge screen: one challenge, its attractions, and the
//! like, start and stamp interactions.
//!
//! Stamping takes one location fix, predicts the new stamp count and
//! status, and reconciles the prediction with the server's answer. A
//! completed challenge asks the main tab to push the completion screen.

use crate::common::LoginAlertAction;
use crate::environment::AppEnvironment;
use crate::optimistic::{Reconciled, predict_like, reconcile};
use popseoul_clients::{
    Attraction, Challenge, ChallengeStatus, ChallengeTheme, LocationResult, StampResponse, StampedAttraction,
};
use popseoul_core::{Effect, Reducer, SmallVec, async_effect, smallvec};
use std::sync::Arc;

/// Detail challenge state
#[derive(Clone, Debug, PartialEq)]
pub struct DetailChallengeState {
    /// Challenge on screen
    pub id: i64,
    /// Session flag as last observed
    pub is_login: bool,
    /// Loaded record
    pub challenge: Option<Challenge>,
    /// Attractions of the challenge
    pub attractions: Vec<Attraction>,
    /// Login prompt on screen
    pub show_login_alert: bool,
    /// A stamp request is in flight
    pub is_stamping: bool,
    /// Failed requests while on screen
    pub network_errors: u32,
}

impl DetailChallengeState {
    /// Screen for challenge `id`
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self {
            id,
            is_login: false,
            challenge: None,
            attractions: Vec::new(),
            show_login_alert: false,
            is_stamping: false,
            network_errors: 0,
        }
    }
}

/// Detail challenge actions
#[derive(Clone, Debug, PartialEq)]
pub enum DetailChallengeAction {
    /// The screen came on screen
    OnAppear,
    /// The record arrived
    Fetched(Challenge),
    /// The attractions arrived
    AttractionsFetched(Vec<Attraction>),
    /// Like toggle
    TappedLike,
    /// Start the challenge
    TappedStart,
    /// Replace the record
    Update(Challenge),
    /// Stamp an attraction at the current position
    TappedStamp(i64),
    /// The location fix for a stamp arrived
    StampLocated {
        /// Attraction being stamped
        attraction_id: i64,
        /// The fix
        result: LocationResult,
    },
    /// The server answered a stamp
    Stamped {
        /// Server answer
        response: StampResponse,
        /// Authoritative record when the answer disagreed with the prediction
        fresh: Option<Challenge>,
    },
    /// The stamp could not be made
    StampFailed,
    /// Delegate: the challenge is complete
    ShowCompleteChallenge(ChallengeTheme),
    /// Delegate: open an attraction
    TappedAttraction(i64),
    /// Map button
    TappedMap,
    /// Delegate: open the map
    MoveToMap(Challenge),
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

/// Detail challenge reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct DetailChallengeFeature;

impl DetailChallengeFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fetch(state: &mut DetailChallengeState, env: &AppEnvironment) -> Effect<DetailChallengeAction> {
        state.is_login = env.is_authenticated();
        let id = state.id;
        let challenges = Arc::clone(&env.clients.challenges);
        Effect::merge(vec![
            async_effect! {
                match challenges.get(id).await {
                    Ok(challenge) => Some(DetailChallengeAction::Fetched(challenge)),
                    Err(error) => {
                        tracing::warn!(id, %error, "challenge fetch failed");
                        Some(DetailChallengeAction::NetworkError)
                    },
                }
            }
            .cancellable("fetch", true),
            Self::fetch_attractions(id, env),
        ])
    }

    fn fetch_attractions(id: i64, env: &AppEnvironment) -> Effect<DetailChallengeAction> {
        let attractions = Arc::clone(&env.clients.attractions);
        async_effect! {
            match attractions.fetch_for_challenge(id).await {
                Ok(list) => Some(DetailChallengeAction::AttractionsFetched(list)),
                Err(error) => {
                    tracing::warn!(id, %error, "attraction list fetch failed");
                    Some(DetailChallengeAction::NetworkError)
                },
            }
        }
        .cancellable("attractions", true)
    }

    fn tapped_like(challenge: &Challenge, env: &AppEnvironment) -> Effect<DetailChallengeAction> {
        let predicted = predict_like(challenge);
        let predicted_flag = predicted.is_liked;
        let id = predicted.id;
        let client = Arc::clone(&env.clients.challenges);
        Effect::merge(vec![
            Effect::send(DetailChallengeAction::Update(predicted)),
            async_effect! {
                match reconcile(
                    client.put_like(id),
                    |response| response.is_liked == predicted_flag,
                    |response| client.get(response.id),
                )
                .await
                {
                    Reconciled::Confirmed(_) => None,
                    Reconciled::Corrected { fresh, .. } => Some(DetailChallengeAction::Update(fresh)),
                    Reconciled::Failed(error) => {
                        tracing::warn!(id, %error, "like failed");
                        Some(DetailChallengeAction::NetworkError)
                    },
                }
            },
        ])
    }

    fn tapped_start(challenge: &Challenge, env: &AppEnvironment) -> Effect<DetailChallengeAction> {
        let predicted = Challenge {
            status: ChallengeStatus::Progress,
            ..challenge.clone()
        };
        let id = predicted.id;
        let client = Arc::clone(&env.clients.challenges);
        Effect::merge(vec![
            Effect::send(DetailChallengeAction::Update(predicted)),
            async_effect! {
                match reconcile(
                    client.put_status(id, ChallengeStatus::Progress),
                    |response| response.challenge_status == ChallengeStatus::Progress,
                    |response| client.get(response.id),
                )
                .await
                {
                    Reconciled::Confirmed(_) => None,
                    Reconciled::Corrected { fresh, .. } => Some(DetailChallengeAction::Update(fresh)),
                    Reconciled::Failed(error) => {
                        tracing::warn!(id, %error, "start failed");
                        Some(DetailChallengeAction::NetworkError)
                    },
                }
            },
        ])
    }

    fn stamp_located(
        state: &mut DetailChallengeState,
        attraction_id: i64,
        result: LocationResult,
        env: &AppEnvironment,
    ) -> Effect<DetailChallengeAction> {
        let (LocationResult::Success(at), Some(challenge)) = (result, state.challenge.as_mut()) else {
            tracing::debug!(attraction_id, "no fix or no record for stamp");
            return Effect::send(DetailChallengeAction::StampFailed);
        };

        let attraction = state.attractions.iter_mut().find(|attraction| attraction.id == attraction_id);
        let already_stamped = attraction.as_ref().is_some_and(|attraction| attraction.is_stamped);
        let name = attraction.as_ref().map(|attraction| attraction.name.clone()).unwrap_or_default();
        if let Some(attraction) = attraction {
            attraction.is_stamped = true;
        }
        if !already_stamped {
            challenge.my_stamp_count = challenge.my_stamp_count.saturating_add(1);
        }
        challenge.status = predicted_status(challenge);

        let (challenge_id, predicted_count, predicted_status) =
            (challenge.id, challenge.my_stamp_count, challenge.status);
        let client = Arc::clone(&env.clients.challenges);
        let preferences = Arc::clone(&env.clients.preferences);
        async_effect! {
            let outcome = reconcile(
                client.stamp(challenge_id, attraction_id, at),
                |response| response.my_stamp_count == predicted_count && response.challenge_status == predicted_status,
                |response| client.get(response.challenge_id),
            )
            .await;
            let (response, fresh) = match outcome {
                Reconciled::Confirmed(response) => (response, None),
                Reconciled::Corrected { response, fresh } => (response, Some(fresh)),
                Reconciled::Failed(error) => {
                    tracing::warn!(challenge_id, attraction_id, %error, "stamp failed");
                    return Some(DetailChallengeAction::StampFailed);
                },
            };
            preferences.set_last_stamped_attraction(StampedAttraction { id: attraction_id, name });
            Some(DetailChallengeAction::Stamped { response, fresh })
        }
        .cancellable("stamp", false)
    }
}

fn predicted_status(challenge: &Challenge) -> ChallengeStatus {
    if challenge.attraction_count > 0 && challenge.my_stamp_count >= challenge.attraction_count {
        ChallengeStatus::Completed
    } else {
        ChallengeStatus::Progress
    }
}

impl Reducer for DetailChallengeFeature {
    type State = DetailChallengeState;
    type Action = DetailChallengeAction;
    type Environment = AppEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            DetailChallengeAction::OnAppear | DetailChallengeAction::SessionRefreshed => {
                smallvec![Self::fetch(state, env)]
            },

            DetailChallengeAction::Fetched(challenge) | DetailChallengeAction::Update(challenge) => {
                if challenge.id == state.id {
                    state.challenge = Some(challenge);
                }
                smallvec![Effect::None]
            },

            DetailChallengeAction::AttractionsFetched(list) => {
                state.attractions = list;
                smallvec![Effect::None]
            },

            DetailChallengeAction::TappedLike | DetailChallengeAction::TappedStart if !env.is_authenticated() => {
                smallvec![Effect::send(DetailChallengeAction::ShowLoginAlert)]
            },

            DetailChallengeAction::TappedLike => match &state.challenge {
                Some(challenge) => smallvec![Self::tapped_like(challenge, env)],
                None => smallvec![Effect::None],
            },

            DetailChallengeAction::TappedStart => match &state.challenge {
                Some(challenge) if challenge.status == ChallengeStatus::None => {
                    smallvec![Self::tapped_start(challenge, env)]
                },
                _ => smallvec![Effect::None],
            },

            DetailChallengeAction::TappedStamp(attraction_id) => {
                if !env.is_authenticated() {
                    return smallvec![Effect::send(DetailChallengeAction::ShowLoginAlert)];
                }
                if state.is_stamping {
                    tracing::debug!(attraction_id, "stamp already in flight");
                    return smallvec![Effect::None];
                }
                state.is_stamping = true;
                let location = Arc::clone(&env.clients.location);
                smallvec![
                    async_effect! {
                        let result = location.current_location().await;
                        Some(DetailChallengeAction::StampLocated { attraction_id, result })
                    }
                    .cancellable("stamp", false)
                ]
            },

            DetailChallengeAction::StampLocated { attraction_id, result } => {
                smallvec![Self::stamp_located(state, attraction_id, result, env)]
            },

            DetailChallengeAction::Stamped { response, fresh } => {
                state.is_stamping = false;
                let resync = if let Some(fresh) = fresh {
                    state.challenge = Some(fresh);
                    Self::fetch_attractions(state.id, env)
                } else {
                    if let Some(challenge) = state.challenge.as_mut() {
                        challenge.my_stamp_count = response.my_stamp_count;
                        challenge.status = response.challenge_status;
                    }
                    Effect::None
                };
                let completed = match (&state.challenge, response.challenge_status) {
                    (Some(challenge), ChallengeStatus::Completed) => Effect::send(
                        DetailChallengeAction::ShowCompleteChallenge(challenge.theme.unwrap_or_default()),
                    ),
                    _ => Effect::None,
                };
                smallvec![resync, completed]
            },

            DetailChallengeAction::StampFailed => {
                state.is_stamping = false;
                smallvec![Effect::send(DetailChallengeAction::NetworkError)]
            },

            DetailChallengeAction::TappedMap => match &state.challenge {
                Some(challenge) => smallvec![Effect::send(DetailChallengeAction::MoveToMap(challenge.clone()))],
                None => smallvec![Effect::None],
            },

            DetailChallengeAction::ShowLoginAlert => {
                state.show_login_alert = true;
                smallvec![Effect::None]
            },

            DetailChallengeAction::LoginAlert(_) => {
                state.show_login_alert = false;
                smallvec![Effect::None]
            },

            DetailChallengeAction::NetworkError => {
                state.network_errors = state.network_errors.saturating_add(1);
                smallvec![Effect::None]
            },

            DetailChallengeAction::ShowCompleteChallenge(_)
            | DetailChallengeAction::TappedAttraction(_)
            | DetailChallengeAction::MoveToMap(_)
            | DetailChallengeAction::TappedBack => smallvec![Effect::None],
        }
    }
}
