//! Request Router
//!
//! Maps decoded HTTP requests onto the score board and builds responses.
//! Every response leaving the router carries the CORS headers.

use std::sync::Arc;

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ALLOW,
};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::leaderboard::ScoreBoard;
use crate::network::page::index_response;
use crate::network::protocol::{
    error_response, json_response, leaderboard_response, StatusResponse, SubmitRequest,
};

/// Landing page path.
pub const INDEX_PATH: &str = "/";

/// Leaderboard API path.
pub const LEADERBOARD_PATH: &str = "/api/leaderboard";

const INDEX_METHODS: &str = "GET, OPTIONS";
const LEADERBOARD_METHODS: &str = "GET, POST, OPTIONS";

/// Errors produced while routing a request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// POST body didn't decode as a score submission.
    #[error("invalid score submission: {0}")]
    InvalidSubmission(#[from] serde_json::Error),

    /// No route for the path.
    #[error("no route for {0}")]
    NotFound(String),

    /// Route exists but not for this method.
    #[error("method {method} not allowed")]
    MethodNotAllowed {
        /// Method that was used.
        method: Method,
        /// Methods the route accepts.
        allow: &'static str,
    },
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidSubmission(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn into_response(self) -> Response<Vec<u8>> {
        let mut response = error_response(self.status(), self.to_string());
        if let ApiError::MethodNotAllowed { allow, .. } = self {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

/// Routes requests for one score board.
pub struct Router {
    board: Arc<ScoreBoard>,
    top_n: usize,
    cors_origin: HeaderValue,
}

impl Router {
    /// Create a router serving the `top_n` best entries of `board`.
    pub fn new(board: Arc<ScoreBoard>, top_n: usize, cors_origin: HeaderValue) -> Self {
        Self {
            board,
            top_n,
            cors_origin,
        }
    }

    /// The board this router serves.
    pub fn board(&self) -> &Arc<ScoreBoard> {
        &self.board
    }

    /// Handle one request.
    pub async fn handle(&self, request: &Request<Vec<u8>>) -> Response<Vec<u8>> {
        let method = request.method();
        let path = request.uri().path();
        debug!("{} {}", method, path);

        let result = match path {
            LEADERBOARD_PATH => self.route_leaderboard(method, request.body()).await,
            INDEX_PATH => route_index(method),
            _ => Err(ApiError::NotFound(path.to_string())),
        };

        let response = result.unwrap_or_else(|e| {
            warn!("Rejected {} {}: {}", method, path, e);
            e.into_response()
        });
        self.with_cors(response)
    }

    /// Error response for a request that couldn't be decoded.
    pub fn reject(&self, status: StatusCode, message: impl Into<String>) -> Response<Vec<u8>> {
        self.with_cors(error_response(status, message))
    }

    async fn route_leaderboard(
        &self,
        method: &Method,
        body: &[u8],
    ) -> Result<Response<Vec<u8>>, ApiError> {
        match *method {
            Method::GET => {
                let entries = self.board.top(self.top_n).await;
                Ok(leaderboard_response(&entries))
            }
            Method::POST => {
                let request = SubmitRequest::from_json(body)?;
                let entry = self.board.submit(request.into()).await;
                info!(
                    name = %entry.name,
                    score = ?entry.score,
                    topic = ?entry.topic,
                    difficulty = ?entry.difficulty,
                    "Score submitted"
                );
                Ok(json_response(StatusCode::OK, &StatusResponse::Success))
            }
            Method::OPTIONS => Ok(preflight_response(LEADERBOARD_METHODS)),
            _ => Err(ApiError::MethodNotAllowed {
                method: method.clone(),
                allow: LEADERBOARD_METHODS,
            }),
        }
    }

    fn with_cors(&self, mut response: Response<Vec<u8>>) -> Response<Vec<u8>> {
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.cors_origin.clone());
        response
    }
}

fn route_index(method: &Method) -> Result<Response<Vec<u8>>, ApiError> {
    match *method {
        Method::GET => Ok(index_response()),
        Method::OPTIONS => Ok(preflight_response(INDEX_METHODS)),
        _ => Err(ApiError::MethodNotAllowed {
            method: method.clone(),
            allow: INDEX_METHODS,
        }),
    }
}

fn preflight_response(methods: &'static str) -> Response<Vec<u8>> {
    let mut response = Response::new(Vec::new());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(methods));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
