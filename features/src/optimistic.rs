//! Optimistic updates and their reconciliation with the server.
//!
//! A feature that can predict the outcome of a request (a like toggle, a
//! status change, one more stamp) applies the prediction immediately, sends
//! the request, and reconciles afterwards:
//!
//! 1. server agrees with the prediction → nothing else happens,
//! 2. server disagrees → one fetch by id, and the fetched record replaces
//!    the prediction,
//! 3. request fails → the feature reports a network error. The prediction
//!    stays in state; it is not rolled back.

use popseoul_clients::{ApiError, Attraction, Challenge, Result};
use std::future::Future;

/// A record with a like flag and a like counter
pub trait Likeable {
    /// Current flag
    fn is_liked(&self) -> bool;
    /// Current counter
    fn likes(&self) -> u32;
    /// Overwrite flag and counter
    fn set_like(&mut self, is_liked: bool, likes: u32);
}

impl Likeable for Challenge {
    fn is_liked(&self) -> bool {
        self.is_liked
    }

    fn likes(&self) -> u32 {
        self.likes
    }

    fn set_like(&mut self, is_liked: bool, likes: u32) {
        self.is_liked = is_liked;
        self.likes = likes;
    }
}

impl Likeable for Attraction {
    fn is_liked(&self) -> bool {
        self.is_liked
    }

    fn likes(&self) -> u32 {
        self.likes
    }

    fn set_like(&mut self, is_liked: bool, likes: u32) {
        self.is_liked = is_liked;
        self.likes = likes;
    }
}

/// Move a counter one step, never below zero
#[must_use]
pub const fn step_counter(count: u32, up: bool) -> u32 {
    if up {
        count.saturating_add(1)
    } else {
        count.saturating_sub(1)
    }
}

/// The record as it will look once the like toggle succeeds
#[must_use]
pub fn predict_like<T: Likeable + Clone>(record: &T) -> T {
    let mut predicted = record.clone();
    let is_liked = !record.is_liked();
    predicted.set_like(is_liked, step_counter(record.likes(), is_liked));
    predicted
}

/// Outcome of confirming a prediction with the server
#[derive(Clone, Debug, PartialEq)]
pub enum Reconciled<R, T> {
    /// The server agreed
    Confirmed(R),
    /// The server disagreed; `fresh` is its authoritative record
    Corrected {
        /// Server answer to the request
        response: R,
        /// Record fetched after the disagreement
        fresh: T,
    },
    /// The request or the corrective fetch failed
    Failed(ApiError),
}

/// Send `request`, and when `agrees` rejects the answer fetch the
/// authoritative record with `refetch`.
pub async fn reconcile<R, T, Req, Fetch, FetchFut>(
    request: Req,
    agrees: impl FnOnce(&R) -> bool,
    refetch: Fetch,
) -> Reconciled<R, T>
where
    Req: Future<Output = Result<R>>,
    Fetch: FnOnce(&R) -> FetchFut,
    FetchFut: Future<Output = Result<T>>,
{
    let response = match request.await {
        Ok(response) => response,
        Err(error) => return Reconciled::Failed(error),
    };
    if agrees(&response) {
        return Reconciled::Confirmed(response);
    }
    tracing::debug!("server disagreed with prediction, fetching authoritative record");
    match refetch(&response).await {
        Ok(fresh) => Reconciled::Corrected { response, fresh },
        Err(error) => Reconciled::Failed(error),
    }
}
