//! High score leaderboard
//!
//! Tracks the top 10 final scores, persisted as JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::persistence::{self, PersistenceError};

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// A single high score entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    /// Final (time-penalized) score
    pub score: i64,
    /// Level reached
    pub level: u32,
    /// Unix timestamp (s) when achieved
    pub timestamp: u64,
}

/// High score leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HighScores {
    pub entries: Vec<HighScoreEntry>,
}

impl HighScores {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Check if a score qualifies for the leaderboard
    pub fn qualifies(&self, score: i64) -> bool {
        if score <= 0 {
            return false;
        }
        if self.entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        self.entries.last().is_none_or(|e| score > e.score)
    }

    /// Add a new score to the leaderboard (if it qualifies)
    /// Returns the rank achieved (1-indexed) or None if didn't qualify
    pub fn add_score(&mut self, score: i64, level: u32, timestamp: u64) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }

        let entry = HighScoreEntry {
            score,
            level,
            timestamp,
        };

        // Sorted descending; equal scores keep arrival order
        let pos = self.entries.iter().position(|e| score > e.score);
        let rank = match pos {
            Some(i) => {
                self.entries.insert(i, entry);
                i + 1
            }
            None => {
                self.entries.push(entry);
                self.entries.len()
            }
        };

        self.entries.truncate(MAX_HIGH_SCORES);

        Some(rank)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top_score(&self) -> Option<i64> {
        self.entries.first().map(|e| e.score)
    }

    /// Load high scores, starting fresh if the file is missing or unreadable
    pub fn load(path: &Path) -> Self {
        match persistence::load_json::<HighScores>(path) {
            Ok(scores) => {
                log::info!("Loaded {} high scores", scores.entries.len());
                scores
            }
            Err(PersistenceError::NotFound(_)) => {
                log::info!("No high scores found, starting fresh");
                Self::new()
            }
            Err(err) => {
                log::warn!("Discarding high scores: {err}");
                Self::new()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        persistence::save_json(path, self)?;
        log::info!("High scores saved ({} entries)", self.entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_and_cap() {
        let mut scores = HighScores::new();
        assert_eq!(scores.add_score(0, 1, 0), None);
        assert_eq!(scores.add_score(100, 1, 0), Some(1));
        assert_eq!(scores.add_score(300, 2, 0), Some(1));
        assert_eq!(scores.add_score(200, 2, 0), Some(2));
        assert_eq!(scores.top_score(), Some(300));

        for i in 0..20 {
            scores.add_score(1_000 + i, 3, 0);
        }
        assert_eq!(scores.entries.len(), MAX_HIGH_SCORES);
        assert!(!scores.qualifies(100));
        assert_eq!(scores.top_score(), Some(1_019));
    }
}
