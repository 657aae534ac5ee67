//! Error classification for collaborator calls.
//!
//! Features never inspect transport details. They see one of these classes
//! and, in every case, translate it into their generic network error action.

use serde::Deserialize;
use thiserror::Error;

/// Result type alias for collaborator calls.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Transport-level codes that mean "no connection" rather than "bad answer".
pub const CONNECTION_FAILURE_CODES: [i32; 5] = [-1003, -1004, -1005, -1009, -1200];

/// Failure of a collaborator call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 400
    #[error("Bad request")]
    BadRequest,

    /// 401: the session is missing or expired.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Any other 4xx status.
    #[error("Client error: HTTP {0}")]
    ClientError(u16),

    /// 5xx status.
    #[error("Server error: HTTP {0}")]
    ServerError(u16),

    /// Structured error body returned by the server.
    #[error("API error {code}: {message}")]
    Api {
        /// Server error code
        code: String,
        /// Human readable message
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("Decoding failed: {0}")]
    Decode(String),

    /// The device could not reach the server.
    #[error("Connection lost")]
    Connectivity,

    /// Response was not HTTP or carried an unknown status.
    #[error("Unknown error")]
    Unknown,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl ApiError {
    /// Classify an HTTP status code. `None` for 2xx.
    #[must_use]
    pub const fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            400 => Some(Self::BadRequest),
            401 => Some(Self::Unauthenticated),
            402..=499 => Some(Self::ClientError(status)),
            500..=599 => Some(Self::ServerError(status)),
            _ => Some(Self::Unknown),
        }
    }

    /// Classify a failed response, preferring the server's error body.
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Option<Self> {
        let error = Self::from_status(status)?;
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(ErrorBody { code, message }) => Some(Self::Api { code, message }),
            Err(_) => Some(error),
        }
    }

    /// Classify a transport error code.
    #[must_use]
    pub fn from_transport_code(code: i32) -> Self {
        if CONNECTION_FAILURE_CODES.contains(&code) {
            Self::Connectivity
        } else {
            Self::Unknown
        }
    }

    /// Whether retrying later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity | Self::ServerError(_))
    }
}

/// Decode a JSON response body.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] when the body does not match `T`.
pub fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Challenge;

    #[test]
    fn status_classes() {
        assert_eq!(ApiError::from_status(204), None);
        assert_eq!(ApiError::from_status(400), Some(ApiError::BadRequest));
        assert_eq!(ApiError::from_status(401), Some(ApiError::Unauthenticated));
        assert_eq!(ApiError::from_status(404), Some(ApiError::ClientError(404)));
        assert_eq!(ApiError::from_status(500), Some(ApiError::ServerError(500)));
        assert_eq!(ApiError::from_status(503), Some(ApiError::ServerError(503)));
        assert_eq!(ApiError::from_status(302), Some(ApiError::Unknown));
    }

    #[test]
    fn error_body_wins_over_status() {
        let body = br#"{"code":"C001","message":"challenge not found"}"#;
        assert_eq!(
            ApiError::from_response(404, body),
            Some(ApiError::Api {
                code: "C001".to_string(),
                message: "challenge not found".to_string(),
            })
        );
        assert_eq!(ApiError::from_response(502, b"<html>"), Some(ApiError::ServerError(502)));
        assert_eq!(ApiError::from_response(200, body), None);
    }

    #[test]
    fn transport_codes() {
        assert_eq!(ApiError::from_transport_code(-1009), ApiError::Connectivity);
        assert_eq!(ApiError::from_transport_code(-1), ApiError::Unknown);
        assert!(ApiError::Connectivity.is_transient());
        assert!(!ApiError::Unauthenticated.is_transient());
    }

    #[test]
    fn decode_shape_mismatch_is_decode_error() {
        let ok: Result<Challenge> = decode(br#"{"id":7,"name":"Palaces","likes":3,"isLiked":true}"#);
        let challenge = ok.unwrap_or_default();
        assert_eq!(challenge.id, 7);
        assert_eq!(challenge.likes, 3);
        assert!(challenge.is_liked);

        let bad: Result<Challenge> = decode(br#"{"id":"seven"}"#);
        assert!(matches!(bad, Err(ApiError::Decode(_))));
    }
}
