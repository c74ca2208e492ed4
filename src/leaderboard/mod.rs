//! Leaderboard
//!
//! Append-only score storage with ranked top-N reads.

pub mod board;
pub mod entry;

pub use board::ScoreBoard;
pub use entry::{ScoreEntry, ScoreSubmission, ANONYMOUS_NAME};
