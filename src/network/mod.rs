//! Network Layer
//!
//! HTTP/1.1 server exposing the leaderboard as a JSON API.
//! All ranking logic lives in `leaderboard/`.

pub mod codec;
pub mod page;
pub mod protocol;
pub mod router;
pub mod server;

pub use codec::{HttpConnection, HttpError};
pub use protocol::{StatusResponse, SubmitRequest};
pub use router::{ApiError, Router, LEADERBOARD_PATH};
pub use server::{ConfigError, LeaderboardServer, ServerConfig, ServerError};
