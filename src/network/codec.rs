//! HTTP/1.1 Codec
//!
//! Minimal request reader and response writer over any tokio byte stream.
//! Requests are parsed with `httparse` and surfaced as `http::Request`;
//! bodies are delimited by `Content-Length` only.

use http::header::{CONNECTION, CONTENT_LENGTH};
use http::{HeaderValue, Request, Response, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted request head (request line + headers).
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Most headers accepted on one request.
const MAX_HEADERS: usize = 32;

/// Largest single socket read.
const READ_CHUNK: usize = 4096;

/// Request decoding / response encoding errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request line or headers are not valid HTTP.
    #[error("malformed request: {0}")]
    Parse(#[from] httparse::Error),

    /// Parsed parts were rejected by `http` (bad method, URI or header).
    #[error("invalid request: {0}")]
    Invalid(#[from] http::Error),

    /// Request head exceeded [`MAX_HEADER_BYTES`].
    #[error("request headers exceed {0} bytes")]
    HeadersTooLarge(usize),

    /// Declared body exceeded the configured limit.
    #[error("request body of {actual} bytes exceeds limit of {limit}")]
    BodyTooLarge {
        /// Declared length.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },

    /// `Content-Length` was not a plain decimal number.
    #[error("invalid Content-Length header")]
    InvalidContentLength,

    /// Chunked or otherwise encoded bodies.
    #[error("Transfer-Encoding is not supported")]
    UnsupportedTransferEncoding,

    /// Peer closed the connection partway through a request.
    #[error("connection closed mid-request")]
    UnexpectedEof,
}

impl HttpError {
    /// Status to answer with, or `None` when the peer can't be answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Io(_) | HttpError::UnexpectedEof => None,
            HttpError::Parse(_) | HttpError::Invalid(_) | HttpError::InvalidContentLength => {
                Some(StatusCode::BAD_REQUEST)
            }
            HttpError::HeadersTooLarge(_) => Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
            HttpError::BodyTooLarge { .. } => Some(StatusCode::PAYLOAD_TOO_LARGE),
            HttpError::UnsupportedTransferEncoding => Some(StatusCode::NOT_IMPLEMENTED),
        }
    }
}

/// Parsed request head, detached from the read buffer.
struct Head {
    len: usize,
    builder: http::request::Builder,
    content_length: usize,
}

/// An HTTP/1.1 connection: buffered request reader plus response writer.
///
/// Bytes past the end of one request stay buffered for the next, so
/// pipelined requests are served in order.
pub struct HttpConnection<S> {
    stream: S,
    buffer: Vec<u8>,
    max_body_bytes: usize,
}

impl<S> HttpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a stream.
    pub fn new(stream: S, max_body_bytes: usize) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(1024),
            max_body_bytes,
        }
    }

    /// Read the next request.
    ///
    /// Returns `Ok(None)` when the peer closes cleanly between requests.
    pub async fn read_request(&mut self) -> Result<Option<Request<Vec<u8>>>, HttpError> {
        let head = loop {
            if let Some(head) = parse_head(&self.buffer)? {
                break head;
            }
            let room = (MAX_HEADER_BYTES + 1).saturating_sub(self.buffer.len());
            if room == 0 {
                return Err(HttpError::HeadersTooLarge(MAX_HEADER_BYTES));
            }
            if self.fill(room).await? == 0 {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(HttpError::UnexpectedEof)
                };
            }
        };

        if head.len > MAX_HEADER_BYTES {
            return Err(HttpError::HeadersTooLarge(MAX_HEADER_BYTES));
        }

        if head.content_length > self.max_body_bytes {
            return Err(HttpError::BodyTooLarge {
                actual: head.content_length,
                limit: self.max_body_bytes,
            });
        }

        let end = head.len + head.content_length;
        while self.buffer.len() < end {
            if self.fill(end - self.buffer.len()).await? == 0 {
                return Err(HttpError::UnexpectedEof);
            }
        }

        let body = self.buffer[head.len..end].to_vec();
        self.buffer.drain(..end);

        Ok(Some(head.builder.body(body)?))
    }

    /// Write a response. `Content-Length` is always set from the body.
    pub async fn write_response(&mut self, response: &Response<Vec<u8>>) -> Result<(), HttpError> {
        let status = response.status();
        let body = response.body();

        let mut out = Vec::with_capacity(256 + body.len());
        out.extend_from_slice(
            format!(
                "HTTP/1.1 {} {}\r\n",
                status.as_str(),
                status.canonical_reason().unwrap_or("")
            )
            .as_bytes(),
        );
        for (name, value) in response.headers() {
            if *name == CONTENT_LENGTH {
                continue;
            }
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("content-length: {}\r\n\r\n", body.len()).as_bytes());
        out.extend_from_slice(body);

        self.stream.write_all(&out).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read at most `limit` more bytes into the buffer.
    async fn fill(&mut self, limit: usize) -> Result<usize, HttpError> {
        let limit = limit.min(READ_CHUNK);
        self.buffer.reserve(limit);
        let mut stream = (&mut self.stream).take(limit as u64);
        Ok(stream.read_buf(&mut self.buffer).await?)
    }
}

fn parse_head(buffer: &[u8]) -> Result<Option<Head>, HttpError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);

    let len = match parsed.parse(buffer)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };

    let mut builder = Request::builder()
        .method(parsed.method.unwrap_or("GET"))
        .uri(parsed.path.unwrap_or("/"))
        .version(version);

    let mut content_length: Option<usize> = None;
    for header in parsed.headers.iter() {
        if header.name.eq_ignore_ascii_case("transfer-encoding") {
            return Err(HttpError::UnsupportedTransferEncoding);
        }
        if header.name.eq_ignore_ascii_case("content-length") {
            let value = std::str::from_utf8(header.value)
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or(HttpError::InvalidContentLength)?;
            // Repeated lengths must agree or the body can't be framed.
            if content_length.is_some_and(|seen| seen != value) {
                return Err(HttpError::InvalidContentLength);
            }
            content_length = Some(value);
        }
        builder = builder.header(header.name, header.value);
    }
    let content_length = content_length.unwrap_or(0);

    Ok(Some(Head {
        len,
        builder,
        content_length,
    }))
}

/// Whether the client wants the connection kept open after this request.
pub fn wants_keep_alive<B>(request: &Request<B>) -> bool {
    let connection = request
        .headers()
        .get(CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);

    match request.version() {
        Version::HTTP_10 => connection.as_deref() == Some("keep-alive"),
        _ => connection.as_deref() != Some("close"),
    }
}

/// `Connection` header value matching a keep-alive decision.
pub fn connection_header(keep_alive: bool) -> HeaderValue {
    if keep_alive {
        HeaderValue::from_static("keep-alive")
    } else {
        HeaderValue::from_static("close")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    const LIMIT: usize = 1024;

    async fn read_one(raw: &[u8]) -> Result<Option<Request<Vec<u8>>>, HttpError> {
        let (mut client, server) = duplex(64 * 1024);
        client.write_all(raw).await.unwrap();
        drop(client);
        HttpConnection::new(server, LIMIT).read_request().await
    }

    #[tokio::test]
    async fn test_read_get() {
        let request = read_one(b"GET /api/leaderboard?x=1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().path(), "/api/leaderboard");
        assert_eq!(request.uri().query(), Some("x=1"));
        assert_eq!(request.version(), Version::HTTP_11);
        assert!(request.body().is_empty());
    }

    #[tokio::test]
    async fn test_read_post_body() {
        let body = br#"{"name":"Ann","score":50}"#;
        let raw = format!(
            "POST /api/leaderboard HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        let mut bytes = raw.into_bytes();
        bytes.extend_from_slice(body);

        let request = read_one(&bytes).await.unwrap().unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.body().as_slice(), body);
    }

    #[tokio::test]
    async fn test_pipelined_requests() {
        let (mut client, server) = duplex(64 * 1024);
        client
            .write_all(b"POST /a HTTP/1.1\r\nContent-Length: 2\r\n\r\nhiGET /b HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        drop(client);

        let mut conn = HttpConnection::new(server, LIMIT);
        let first = conn.read_request().await.unwrap().unwrap();
        assert_eq!(first.uri().path(), "/a");
        assert_eq!(first.body().as_slice(), b"hi");

        let second = conn.read_request().await.unwrap().unwrap();
        assert_eq!(second.uri().path(), "/b");

        assert!(conn.read_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_request_split_across_reads() {
        let (mut client, server) = duplex(64 * 1024);
        let reader = tokio::spawn(async move {
            HttpConnection::new(server, LIMIT).read_request().await
        });

        client.write_all(b"POST /api/leader").await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(b"board HTTP/1.1\r\nContent-Length: 4\r\n\r\nab").await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(b"cd").await.unwrap();

        let request = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(request.uri().path(), "/api/leaderboard");
        assert_eq!(request.body().as_slice(), b"abcd");
    }

    #[tokio::test]
    async fn test_clean_close() {
        assert!(read_one(b"").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_body() {
        let err = read_one(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc")
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::UnexpectedEof));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let raw = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", LIMIT + 1);
        let err = read_one(raw.as_bytes()).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::PAYLOAD_TOO_LARGE));
    }

    #[tokio::test]
    async fn test_headers_too_large() {
        let mut raw = b"GET / HTTP/1.1\r\nX-Filler: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(MAX_HEADER_BYTES + 10));
        let err = read_one(&raw).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE));
    }

    #[tokio::test]
    async fn test_oversized_head_in_one_write() {
        let mut raw = b"GET / HTTP/1.1\r\nX-Filler: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(12_000));
        raw.extend_from_slice(b"\r\n\r\n");

        let err = read_one(&raw).await.unwrap_err();
        assert!(matches!(err, HttpError::HeadersTooLarge(MAX_HEADER_BYTES)));
        assert_eq!(err.status(), Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE));
    }

    #[tokio::test]
    async fn test_head_at_limit_accepted() {
        let prefix = b"GET / HTTP/1.1\r\nX-Filler: ";
        let filler = MAX_HEADER_BYTES - prefix.len() - 4;
        let mut raw = prefix.to_vec();
        raw.extend(std::iter::repeat(b'a').take(filler));
        raw.extend_from_slice(b"\r\n\r\n");
        assert_eq!(raw.len(), MAX_HEADER_BYTES);

        let request = read_one(&raw).await.unwrap().unwrap();
        assert_eq!(request.headers()["x-filler"].len(), filler);
    }

    #[tokio::test]
    async fn test_conflicting_content_lengths() {
        let err = read_one(b"POST / HTTP/1.1\r\nContent-Length: 100\r\nContent-Length: 2\r\n\r\nhi")
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidContentLength));
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_repeated_equal_content_lengths() {
        let request = read_one(b"POST / HTTP/1.1\r\nContent-Length: 2\r\nContent-Length: 2\r\n\r\nhi")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.body().as_slice(), b"hi");
    }

    #[tokio::test]
    async fn test_chunked_rejected() {
        let err = read_one(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_IMPLEMENTED));
    }

    #[tokio::test]
    async fn test_bad_content_length() {
        let err = read_one(b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n")
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidContentLength));
    }

    #[tokio::test]
    async fn test_garbage_request_line() {
        let err = read_one(b"\x01\x02 nonsense\r\n\r\n").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_write_response() {
        let (client, mut server) = duplex(64 * 1024);
        let mut response = Response::new(b"[]".to_vec());
        response
            .headers_mut()
            .insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut conn = HttpConnection::new(client, LIMIT);
        conn.write_response(&response).await.unwrap();
        drop(conn);

        let mut written = String::new();
        server.read_to_string(&mut written).await.unwrap();
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.contains("content-type: application/json\r\n"));
        assert!(written.contains("content-length: 2\r\n"));
        assert!(written.ends_with("\r\n\r\n[]"));
    }

    #[test]
    fn test_keep_alive_rules() {
        let default_11 = Request::builder().body(()).unwrap();
        assert!(wants_keep_alive(&default_11));

        let close_11 = Request::builder().header("Connection", "close").body(()).unwrap();
        assert!(!wants_keep_alive(&close_11));

        let default_10 = Request::builder().version(Version::HTTP_10).body(()).unwrap();
        assert!(!wants_keep_alive(&default_10));

        let keep_10 = Request::builder()
            .version(Version::HTTP_10)
            .header("Connection", "Keep-Alive")
            .body(())
            .unwrap();
        assert!(wants_keep_alive(&keep_10));
    }
}
