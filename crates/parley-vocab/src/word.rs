use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Common,
    Business,
    Academic,
    Casual,
    Advanced,
}

/// Heuristic part-of-speech guess.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    #[default]
    Unknown,
}

/// Coarse learner-facing difficulty. Ordered `Easy < Medium < Hard`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyBucket {
    Easy,
    Medium,
    Hard,
}

impl DifficultyBucket {
    /// Bucket for a word first seen at `difficulty` (1–5).
    pub fn from_difficulty(difficulty: u8) -> Self {
        match difficulty {
            0..=2 => Self::Easy,
            3 => Self::Medium,
            _ => Self::Hard,
        }
    }

    pub fn harder(self) -> Self {
        match self {
            Self::Easy => Self::Medium,
            Self::Medium | Self::Hard => Self::Hard,
        }
    }

    pub fn easier(self) -> Self {
        match self {
            Self::Hard => Self::Medium,
            Self::Medium | Self::Easy => Self::Easy,
        }
    }

    /// Representative numeric difficulty, for words with no pool entry.
    pub fn nominal_difficulty(self) -> u8 {
        match self {
            Self::Easy => 2,
            Self::Medium => 3,
            Self::Hard => 4,
        }
    }
}

/// One vocabulary item known to the session, keyed by normalized `word`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordEntry {
    pub word: String,
    pub language: String,
    /// 1 (easiest) to 5.
    pub difficulty: u8,
    /// Relative rank, higher is more common.
    pub frequency: u32,
    pub category: Category,
    pub part_of_speech: PartOfSpeech,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Practice record for one word. This is the snapshot handed to persistence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordStatus {
    pub word: String,
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
    /// Consecutive successes at the current bucket.
    pub level_successes: u32,
    pub last_seen: DateTime<Utc>,
    pub difficulty: DifficultyBucket,
    /// Monotonic within a session.
    pub mastered: bool,
    pub created_at: DateTime<Utc>,
}

impl WordStatus {
    pub fn new(word: impl Into<String>, difficulty: DifficultyBucket, now: DateTime<Utc>) -> Self {
        Self {
            word: word.into(),
            attempts: 0,
            successes: 0,
            failures: 0,
            level_successes: 0,
            last_seen: now,
            difficulty,
            mastered: false,
            created_at: now,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            f64::from(self.successes) / f64::from(self.attempts)
        }
    }
}

/// Normalized key for a word: trimmed and lowercased.
pub fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_ladder_moves() {
        assert_eq!(DifficultyBucket::Easy.harder(), DifficultyBucket::Medium);
        assert_eq!(DifficultyBucket::Hard.harder(), DifficultyBucket::Hard);
        assert_eq!(DifficultyBucket::Hard.easier(), DifficultyBucket::Medium);
        assert_eq!(DifficultyBucket::Easy.easier(), DifficultyBucket::Easy);
        assert!(DifficultyBucket::Hard > DifficultyBucket::Easy);
    }

    #[test]
    fn first_use_bucket_from_difficulty() {
        assert_eq!(DifficultyBucket::from_difficulty(1), DifficultyBucket::Easy);
        assert_eq!(DifficultyBucket::from_difficulty(2), DifficultyBucket::Easy);
        assert_eq!(DifficultyBucket::from_difficulty(3), DifficultyBucket::Medium);
        assert_eq!(DifficultyBucket::from_difficulty(5), DifficultyBucket::Hard);
    }

    #[test]
    fn success_rate_handles_zero_attempts() {
        let mut status = WordStatus::new("merci", DifficultyBucket::Easy, Utc::now());
        assert_eq!(status.success_rate(), 0.0);
        status.attempts = 4;
        status.successes = 3;
        assert!((status.success_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn status_serializes_camel_case() {
        let status = WordStatus::new("marché", DifficultyBucket::Hard, Utc::now());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["levelSuccesses"], 0);
        assert_eq!(json["difficulty"], "hard");
        assert!(json.get("lastSeen").is_some());
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Système "), "système");
    }
}
