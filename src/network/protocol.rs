//! Protocol Messages
//!
//! JSON bodies exchanged on the leaderboard API.

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::leaderboard::{ScoreEntry, ScoreSubmission};

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

/// Body of `POST /api/leaderboard`.
///
/// Every field may be missing or `null`. A field of the wrong JSON type
/// (e.g. a string score) fails to decode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmitRequest {
    /// Player name.
    #[serde(default)]
    pub name: Option<String>,
    /// Quiz topic.
    #[serde(default)]
    pub topic: Option<String>,
    /// Quiz difficulty.
    #[serde(default)]
    pub difficulty: Option<String>,
    /// Score achieved.
    #[serde(default)]
    pub score: Option<Number>,
}

impl SubmitRequest {
    /// Deserialize from a request body.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

impl From<SubmitRequest> for ScoreSubmission {
    fn from(request: SubmitRequest) -> Self {
        ScoreSubmission {
            name: request.name,
            topic: request.topic,
            difficulty: request.difficulty,
            score: request.score,
        }
    }
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

/// Outcome body: `{"status":"success"}` or `{"status":"error","message":...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusResponse {
    /// Request was applied.
    Success,
    /// Request was rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl StatusResponse {
    /// Error body with a message.
    pub fn error(message: impl Into<String>) -> Self {
        StatusResponse::Error {
            message: message.into(),
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Build a JSON response from any serializable body.
///
/// Serialization failure becomes a bare 500.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Vec<u8>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(bytes);
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            tracing::error!("Failed to serialize response: {}", e);
            let mut response = Response::new(Vec::new());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

/// `GET /api/leaderboard` response.
pub fn leaderboard_response(entries: &[ScoreEntry]) -> Response<Vec<u8>> {
    json_response(StatusCode::OK, &entries)
}

/// Error response with a JSON status body.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response<Vec<u8>> {
    json_response(status, &StatusResponse::error(message))
}
