//! # Quiz Leaderboard Server
//!
//! In-memory leaderboard for quiz scores, served over HTTP.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  QUIZ LEADERBOARD SERVER                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  leaderboard/    - Ranked score storage                      │
//! │  ├── entry.rs    - Submissions and stored entries            │
//! │  └── board.rs    - Append / top-N over a shared collection   │
//! │                                                              │
//! │  network/        - HTTP surface                              │
//! │  ├── codec.rs    - HTTP/1.1 codec                            │
//! │  ├── protocol.rs - JSON bodies                               │
//! │  ├── router.rs   - Routes and CORS                           │
//! │  ├── page.rs     - Landing page                              │
//! │  └── server.rs   - Accept loop, limits, shutdown             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ranking
//!
//! `top(n)` returns at most `n` entries, highest score first. Equal scores
//! keep submission order and entries without a score sort last. Reads
//! sort a snapshot, never the stored collection.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod leaderboard;
pub mod network;

// Re-export commonly used types
pub use leaderboard::{ScoreBoard, ScoreEntry, ScoreSubmission};
pub use network::{LeaderboardServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entries returned by a leaderboard read unless configured otherwise.
pub const DEFAULT_TOP_N: usize = 10;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5000;
