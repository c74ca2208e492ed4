//! Score Entries
//!
//! The stored leaderboard record and the caller-supplied submission it is
//! built from.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Name stored when a submission carries no usable player name.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// A score submission as handed to the board.
///
/// Every field is optional; defaults are applied when the entry is stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreSubmission {
    /// Player name. Missing or empty becomes [`ANONYMOUS_NAME`].
    pub name: Option<String>,
    /// Quiz topic.
    pub topic: Option<String>,
    /// Quiz difficulty.
    pub difficulty: Option<String>,
    /// Score, kept exactly as submitted.
    pub score: Option<Number>,
}

impl ScoreSubmission {
    /// Submission with only a score set.
    pub fn with_score(score: impl Into<Number>) -> Self {
        Self {
            score: Some(score.into()),
            ..Default::default()
        }
    }

    /// Set the player name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the quiz topic.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the quiz difficulty.
    pub fn difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }
}

/// A stored leaderboard record. Never modified after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Player name.
    pub name: String,
    /// Quiz topic.
    pub topic: Option<String>,
    /// Quiz difficulty.
    pub difficulty: Option<String>,
    /// Submitted score, `null` when none was given.
    pub score: Option<Number>,
    /// Local time of insertion, `YYYY-MM-DDTHH:MM:SS.ffffff`.
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
}

impl ScoreEntry {
    /// Build a stored entry from a submission, applying the name default.
    pub fn from_submission(submission: ScoreSubmission, timestamp: NaiveDateTime) -> Self {
        let name = submission
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ANONYMOUS_NAME.to_string());

        Self {
            name,
            topic: submission.topic,
            difficulty: submission.difficulty,
            score: submission.score,
            timestamp,
        }
    }

    /// Key used for ranking. Entries without a score rank below all others.
    pub fn rank_key(&self) -> f64 {
        self.score
            .as_ref()
            .and_then(Number::as_f64)
            .unwrap_or(f64::NEG_INFINITY)
    }
}

/// Fixed-width ISO-8601 timestamps: always six fraction digits.
mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub fn serialize<S: Serializer>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&timestamp.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}
