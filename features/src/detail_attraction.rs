//! Detail attraction screen.

use crate::common::LoginAlertAction;
use crate::environment::AppEnvironment;
use crate::optimistic::{Reconciled, predict_like, reconcile};
use popseoul_clients::Attraction;
use popseoul_core::{Effect, Reducer, SmallVec, async_effect, delay, smallvec};
use std::sync::Arc;
use std::time::Duration;

/// How long the "address copied" toast stays up
pub const TOAST_DURATION: Duration = Duration::from_secs(2);

/// Detail attraction state
#[derive(Clone, Debug, PartialEq)]
pub struct DetailAttractionState {
    /// Attraction on screen
    pub id: i64,
    /// Session flag as last observed
    pub is_login: bool,
    /// Loaded record
    pub attraction: Option<Attraction>,
    /// Address copied toast on screen
    pub show_toast: bool,
    /// Login prompt on screen
    pub show_login_alert: bool,
    /// Failed requests while on screen
    pub network_errors: u32,
}

impl DetailAttractionState {
    /// Screen for attraction `id`
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self {
            id,
            is_login: false,
            attraction: None,
            show_toast: false,
            show_login_alert: false,
            network_errors: 0,
        }
    }
}

/// Detail attraction actions
#[derive(Clone, Debug, PartialEq)]
pub enum DetailAttractionAction {
    /// The screen came on screen
    OnAppear,
    /// The record arrived
    Fetched(Attraction),
    /// Like toggle
    TappedLike,
    /// Replace the record
    Update(Attraction),
    /// Copy the address to the clipboard
    TappedCopyAddress,
    /// Hide the toast
    HideToast,
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

/// Detail attraction reducer
#[derive(Clone, Copy, Debug, Default)]
pub struct DetailAttractionFeature;

impl DetailAttractionFeature {
    /// New reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fetch(state: &mut DetailAttractionState, env: &AppEnvironment) -> Effect<DetailAttractionAction> {
        state.is_login = env.is_authenticated();
        let id = state.id;
        let client = Arc::clone(&env.clients.attractions);
        async_effect! {
            match client.get(id).await {
                Ok(attraction) => Some(DetailAttractionAction::Fetched(attraction)),
                Err(error) => {
                    tracing::warn!(id, %error, "attraction fetch failed");
                    Some(DetailAttractionAction::NetworkError)
                },
            }
        }
        .cancellable("fetch", true)
    }
}

impl Reducer for DetailAttractionFeature {
    type State = DetailAttractionState;
    type Action = DetailAttractionAction;
    type Environment = AppEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            DetailAttractionAction::OnAppear | DetailAttractionAction::SessionRefreshed => {
                smallvec![Self::fetch(state, env)]
            },

            DetailAttractionAction::Fetched(attraction) | DetailAttractionAction::Update(attraction) => {
                if attraction.id == state.id {
                    state.attraction = Some(attraction);
                }
                smallvec![Effect::None]
            },

            DetailAttractionAction::TappedLike => {
                if !env.is_authenticated() {
                    return smallvec![Effect::send(DetailAttractionAction::ShowLoginAlert)];
                }
                let Some(current) = &state.attraction else {
                    return smallvec![Effect::None];
                };
                let predicted = predict_like(current);
                let predicted_flag = predicted.is_liked;
                let id = predicted.id;
                let client = Arc::clone(&env.clients.attractions);
                smallvec![
                    Effect::send(DetailAttractionAction::Update(predicted)),
                    async_effect! {
                        match reconcile(
                            client.put_like(id),
                            |response| response.is_liked == predicted_flag,
                            |response| client.get(response.id),
                        )
                        .await
                        {
                            Reconciled::Confirmed(_) => None,
                            Reconciled::Corrected { fresh, .. } => Some(DetailAttractionAction::Update(fresh)),
                            Reconciled::Failed(error) => {
                                tracing::warn!(id, %error, "attraction like failed");
                                Some(DetailAttractionAction::NetworkError)
                            },
                        }
                    },
                ]
            },

            DetailAttractionAction::TappedCopyAddress => {
                state.show_toast = true;
                smallvec![
                    delay! {
                        duration: TOAST_DURATION,
                        action: DetailAttractionAction::HideToast
                    }
                    .cancellable("toast", true)
                ]
            },

            DetailAttractionAction::HideToast => {
                state.show_toast = false;
                smallvec![Effect::None]
            },

            DetailAttractionAction::ShowLoginAlert => {
                state.show_login_alert = true;
                smallvec![Effect::None]
            },

            DetailAttractionAction::LoginAlert(_) => {
                state.show_login_alert = false;
                smallvec![Effect::None]
            },

            DetailAttractionAction::NetworkError => {
                state.network_errors = state.network_errors.saturating_add(1);
                smallvec![Effect::None]
            },

            DetailAttractionAction::TappedBack => smallvec![Effect::None],
        }
    }
}
