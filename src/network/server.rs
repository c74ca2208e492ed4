//! Leaderboard HTTP Server
//!
//! Async TCP server speaking HTTP/1.1 with keep-alive.
//! Handles connection limits, idle timeouts and graceful shutdown.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::header::CONNECTION;
use http::{HeaderValue, StatusCode};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::leaderboard::ScoreBoard;
use crate::network::codec::{connection_header, wants_keep_alive, HttpConnection};
use crate::network::router::Router;
use crate::{DEFAULT_PORT, DEFAULT_TOP_N};

/// Response header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// How long a connection over the limit may take to send its request.
const REJECT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after a failed accept (e.g. out of file descriptors).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Entries returned by `GET /api/leaderboard`.
    pub top_n: usize,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// How long an idle keep-alive connection is held open.
    pub idle_timeout: Duration,
    /// `Access-Control-Allow-Origin` value.
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            top_n: DEFAULT_TOP_N,
            max_body_bytes: 16 * 1024,
            max_connections: 1024,
            idle_timeout: Duration::from_secs(30),
            cors_origin: "*".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host: IpAddr = parse_var(&lookup, "LEADERBOARD_HOST")?.unwrap_or(defaults.bind_addr.ip());
        let port: u16 = parse_var(&lookup, "LEADERBOARD_PORT")?.unwrap_or(defaults.bind_addr.port());
        let idle_secs: u64 = parse_var(&lookup, "LEADERBOARD_IDLE_TIMEOUT_SECS")?
            .unwrap_or(defaults.idle_timeout.as_secs());

        let config = Self {
            bind_addr: SocketAddr::new(host, port),
            top_n: parse_var(&lookup, "LEADERBOARD_TOP_N")?.unwrap_or(defaults.top_n),
            max_body_bytes: parse_var(&lookup, "LEADERBOARD_MAX_BODY_BYTES")?
                .unwrap_or(defaults.max_body_bytes),
            max_connections: parse_var(&lookup, "LEADERBOARD_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            idle_timeout: Duration::from_secs(idle_secs),
            cors_origin: lookup("LEADERBOARD_CORS_ORIGIN").unwrap_or(defaults.cors_origin),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but can't be served with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("LEADERBOARD_TOP_N", self.top_n),
            ("LEADERBOARD_MAX_CONNECTIONS", self.max_connections),
            ("LEADERBOARD_MAX_BODY_BYTES", self.max_body_bytes),
        ];
        for (var, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    var,
                    value: value.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if self.idle_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                var: "LEADERBOARD_IDLE_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        self.cors_header()?;
        Ok(())
    }

    fn cors_header(&self) -> Result<HeaderValue, ConfigError> {
        HeaderValue::from_str(&self.cors_origin).map_err(|e| ConfigError::InvalidValue {
            var: "LEADERBOARD_CORS_ORIGIN",
            value: self.cors_origin.clone(),
            reason: e.to_string(),
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                var,
                reason: e.to_string(),
                value,
            }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set to something unusable.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Listener I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Log a failed accept and pause before the next one.
///
/// Accept errors such as `EMFILE` repeat immediately until a descriptor frees up.
async fn back_off_after_accept_error(e: &std::io::Error) {
    error!("Accept error: {}", e);
    sleep(ACCEPT_BACKOFF).await;
}

/// Decrements the live connection count when a connection task ends.
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The leaderboard server.
pub struct LeaderboardServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shared routing state (owns the board).
    router: Arc<Router>,
    /// Live connection count.
    connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: watch::Sender<bool>,
}

impl LeaderboardServer {
    /// Create a server with a fresh, empty board.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_board(config, Arc::new(ScoreBoard::new()))
    }

    /// Create a server around an existing board.
    pub fn with_board(config: ServerConfig, board: Arc<ScoreBoard>) -> Result<Self, ServerError> {
        config.validate()?;
        let cors_origin = config.cors_header()?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            router: Arc::new(Router::new(board, config.top_n, cors_origin)),
            config,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        })
    }

    /// The board being served.
    pub fn board(&self) -> &Arc<ScoreBoard> {
        self.router.board()
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(ServerError::BindFailed)?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    #[instrument(skip_all, fields(addr = ?listener.local_addr().ok()))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!("Leaderboard server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let live = self.connections.fetch_add(1, Ordering::SeqCst);
                            let guard = ConnectionGuard(self.connections.clone());

                            if live >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                self.reject_connection(stream, guard);
                                continue;
                            }

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr, guard);
                        }
                        Err(e) => back_off_after_accept_error(&e).await,
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Answer 503 and close.
    fn reject_connection(&self, stream: TcpStream, guard: ConnectionGuard) {
        let mut response = self
            .router
            .reject(StatusCode::SERVICE_UNAVAILABLE, "too many connections");
        response
            .headers_mut()
            .insert(CONNECTION, connection_header(false));
        let max_body_bytes = self.config.max_body_bytes;

        tokio::spawn(async move {
            let _guard = guard;
            let mut conn = HttpConnection::new(stream, max_body_bytes);
            // Drain the request so closing doesn't reset the socket under the reply.
            let _ = timeout(REJECT_DRAIN_TIMEOUT, conn.read_request()).await;
            let _ = conn.write_response(&response).await;
        });
    }

    /// Serve requests on one connection until it closes.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, guard: ConnectionGuard) {
        let router = self.router.clone();
        let idle_timeout = self.config.idle_timeout;
        let max_body_bytes = self.config.max_body_bytes;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let _guard = guard;
            let mut conn = HttpConnection::new(stream, max_body_bytes);

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                let read = tokio::select! {
                    result = timeout(idle_timeout, conn.read_request()) => result,
                    _ = shutdown_rx.changed() => break,
                };

                let request = match read {
                    Err(_) => {
                        debug!("Connection {} idle, closing", addr);
                        break;
                    }
                    Ok(Ok(Some(request))) => request,
                    Ok(Ok(None)) => break,
                    Ok(Err(e)) => {
                        match e.status() {
                            Some(status) => {
                                warn!("Bad request from {}: {}", addr, e);
                                let mut response = router.reject(status, e.to_string());
                                response
                                    .headers_mut()
                                    .insert(CONNECTION, connection_header(false));
                                let _ = conn.write_response(&response).await;
                            }
                            None => debug!("Connection {} dropped: {}", addr, e),
                        }
                        break;
                    }
                };

                let keep_alive = wants_keep_alive(&request) && !*shutdown_rx.borrow();
                let request_id = Uuid::new_v4();
                let span = info_span!(
                    "request",
                    %request_id,
                    method = %request.method(),
                    path = request.uri().path(),
                );

                let mut response = router.handle(&request).instrument(span).await;
                let headers = response.headers_mut();
                headers.insert(CONNECTION, connection_header(keep_alive));
                if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                    headers.insert(REQUEST_ID_HEADER, value);
                }

                if let Err(e) = conn.write_response(&response).await {
                    error!("Failed to write response to {}: {}", addr, e);
                    break;
                }
                if !keep_alive {
                    break;
                }
            }

            debug!("Connection {} closed", addr);
        });
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Get active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}
