//! Landing page served at `/`.

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response};

/// Static landing page: renders the leaderboard and a submission form.
pub const INDEX_HTML: &str = include_str!("../../static/index.html");

/// `GET /` response.
pub fn index_response() -> Response<Vec<u8>> {
    let mut response = Response::new(INDEX_HTML.as_bytes().to_vec());
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_index_response() {
        let response = index_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        assert!(INDEX_HTML.contains("/api/leaderboard"));
    }
}
