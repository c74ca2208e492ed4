//! Score Board
//!
//! Shared in-memory collection of score entries.
//!
//! Storage is append-only and kept in insertion order. Ranked reads copy a
//! snapshot under the read lock and sort it outside the lock, so readers never
//! reorder storage and never block writers for longer than the copy.

use std::cmp::Ordering;

use chrono::{Local, NaiveDateTime, SubsecRound};
use tokio::sync::RwLock;
use tracing::debug;

use crate::leaderboard::entry::{ScoreEntry, ScoreSubmission};

/// Append-only leaderboard with top-N retrieval.
#[derive(Debug, Default)]
pub struct ScoreBoard {
    entries: RwLock<Vec<ScoreEntry>>,
}

impl ScoreBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a submission, timestamped with the local clock.
    pub async fn submit(&self, submission: ScoreSubmission) -> ScoreEntry {
        let now = Local::now().naive_local().trunc_subsecs(6);
        self.submit_at(submission, now).await
    }

    /// Store a submission with an explicit insertion time.
    pub(crate) async fn submit_at(&self, submission: ScoreSubmission, timestamp: NaiveDateTime) -> ScoreEntry {
        let entry = ScoreEntry::from_submission(submission, timestamp);

        let mut entries = self.entries.write().await;
        entries.push(entry.clone());
        debug!(total = entries.len(), "score stored");

        entry
    }

    /// The `n` highest-scoring entries, best first.
    ///
    /// Equal scores keep submission order. Entries without a score come last.
    pub async fn top(&self, n: usize) -> Vec<ScoreEntry> {
        if n == 0 {
            return Vec::new();
        }

        let mut snapshot = self.entries.read().await.clone();

        // Stable: ties stay in insertion order.
        snapshot.sort_by(|a, b| {
            b.rank_key()
                .partial_cmp(&a.rank_key())
                .unwrap_or(Ordering::Equal)
        });
        snapshot.truncate(n);
        snapshot
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing has been submitted yet.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
