use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parley_settings::MasteryRule;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::heuristics::{DefaultHeuristics, VocabHeuristics};
use crate::seed::seed_words;
use crate::word::{normalize, DifficultyBucket, WordEntry, WordStatus};

/// Successes at `Hard` before stepping down to `Medium`.
pub const HARD_TO_MEDIUM: u32 = 3;
/// Successes at `Medium` before stepping down to `Easy`.
pub const MEDIUM_TO_EASY: u32 = 5;
/// Successes at `Easy` before the word is mastered.
pub const EASY_TO_MASTERED: u32 = 7;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub total: usize,
    pub practiced: usize,
    pub mastered: usize,
    pub remaining: usize,
}

/// Every vocabulary item known to a session plus its practice history.
///
/// Entries and statuses share the normalized-word key space but are separate
/// maps: a word can sit in the pool without ever having been practiced, and a
/// status can exist for a word the pool never introduced.
pub struct WordPool {
    language: String,
    entries: HashMap<String, WordEntry>,
    statuses: HashMap<String, WordStatus>,
    heuristics: Box<dyn VocabHeuristics>,
    mastery: MasteryRule,
}

impl std::fmt::Debug for WordPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WordPool")
            .field("language", &self.language)
            .field("entries", &self.entries.len())
            .field("statuses", &self.statuses.len())
            .field("mastery", &self.mastery)
            .finish()
    }
}

impl WordPool {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: normalize(&language.into()),
            entries: HashMap::new(),
            statuses: HashMap::new(),
            heuristics: Box::new(DefaultHeuristics::default()),
            mastery: MasteryRule::DifficultyLadder,
        }
    }

    pub fn with_heuristics(mut self, heuristics: Box<dyn VocabHeuristics>) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn with_mastery(mut self, mastery: MasteryRule) -> Self {
        self.mastery = mastery;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn heuristics(&self) -> &dyn VocabHeuristics {
        self.heuristics.as_ref()
    }

    pub fn mastery(&self) -> &MasteryRule {
        &self.mastery
    }

    /// Populate from the curated frequency list for `language`. Returns how
    /// many entries were added; words already present are left alone.
    pub fn seed(&mut self, language: &str) -> usize {
        let language = normalize(language);
        let now = Utc::now();
        let words = seed_words(&language);
        if words.is_empty() {
            info!(language = %language, "no seed list for language");
            return 0;
        }
        let mut added = 0;
        for seed in words {
            if self.contains(seed.word) {
                continue;
            }
            let entry = WordEntry {
                word: seed.word.to_string(),
                language: language.clone(),
                difficulty: seed.difficulty,
                frequency: seed.frequency,
                category: seed.category,
                part_of_speech: self.heuristics.part_of_speech(seed.word),
                source_text: None,
                created_at: now,
            };
            self.entries.insert(entry.word.clone(), entry);
            added += 1;
        }
        debug!(language = %language, added, "seeded word pool");
        added
    }

    /// Insert explicit words at a fixed difficulty. Returns the new entries.
    pub fn insert_words<I, S>(&mut self, language: &str, words: I, difficulty: u8) -> Vec<WordEntry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let language = normalize(language);
        let now = Utc::now();
        let mut created = Vec::new();
        for raw in words {
            let word = normalize(raw.as_ref());
            if word.is_empty() || self.contains(&word) {
                continue;
            }
            let entry = WordEntry {
                category: self.heuristics.category(&word, ""),
                part_of_speech: self.heuristics.part_of_speech(&word),
                word: word.clone(),
                language: language.clone(),
                difficulty: difficulty.clamp(1, 5),
                frequency: 0,
                source_text: None,
                created_at: now,
            };
            self.entries.insert(word, entry.clone());
            created.push(entry);
        }
        created
    }

    /// Extract candidate words from `text` and add the unknown ones.
    ///
    /// When `is_source_of_new_vocabulary` is set, each entry records `text` as
    /// the place it was introduced.
    pub fn ingest(&mut self, text: &str, is_source_of_new_vocabulary: bool) -> Vec<WordEntry> {
        let tokens = self.heuristics.tokenize(text);
        let source = is_source_of_new_vocabulary.then(|| text.to_string());
        self.add_tokens(tokens, text, source)
    }

    /// Add words that arrived already split (e.g. a `vocabulary_update`
    /// frame). Unknown words only; returns the new entries.
    pub fn add_candidates<I, S>(&mut self, words: I) -> Vec<WordEntry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens: Vec<String> = words
            .into_iter()
            .map(|w| normalize(w.as_ref()))
            .filter(|w| !w.is_empty())
            .collect();
        self.add_tokens(tokens, "", None)
    }

    fn add_tokens(
        &mut self,
        tokens: Vec<String>,
        context: &str,
        source: Option<String>,
    ) -> Vec<WordEntry> {
        let now = Utc::now();
        let mut created = Vec::new();
        for word in tokens {
            if self.contains(&word) {
                continue;
            }
            let entry = WordEntry {
                language: self.language.clone(),
                difficulty: self.heuristics.difficulty(&word),
                frequency: 1,
                category: self.heuristics.category(&word, context),
                part_of_speech: self.heuristics.part_of_speech(&word),
                source_text: source.clone(),
                created_at: now,
                word: word.clone(),
            };
            self.entries.insert(word, entry.clone());
            created.push(entry);
        }
        created
    }

    /// Record a practice attempt for each word. Returns the words that became
    /// mastered during this call.
    pub fn mark_used<I, S>(&mut self, words: I, was_successful: bool) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.mark_used_at(words, was_successful, Utc::now())
    }

    pub fn mark_used_at<I, S>(
        &mut self,
        words: I,
        was_successful: bool,
        now: DateTime<Utc>,
    ) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut newly_mastered = Vec::new();
        for raw in words {
            let word = normalize(raw.as_ref());
            if word.is_empty() || !seen.insert(word.clone()) {
                continue;
            }
            let initial = self
                .entries
                .get(&word)
                .map(|e| DifficultyBucket::from_difficulty(e.difficulty))
                .unwrap_or(DifficultyBucket::Medium);
            let status = self
                .statuses
                .entry(word.clone())
                .or_insert_with(|| WordStatus::new(word.clone(), initial, now));
            let was_mastered = status.mastered;
            apply_attempt(status, was_successful, now, &self.mastery);
            if status.mastered && !was_mastered {
                info!(word = %word, attempts = status.attempts, "word mastered");
                newly_mastered.push(word);
            }
        }
        newly_mastered
    }

    /// Counts cover pool entries only; statuses of words used outside the
    /// pool are tracked but not counted.
    pub fn stats(&self) -> PoolStats {
        let in_pool = || {
            self.statuses
                .iter()
                .filter(|(word, _)| self.entries.contains_key(*word))
                .map(|(_, status)| status)
        };
        let practiced = in_pool().filter(|s| s.attempts > 0).count();
        let mastered = in_pool().filter(|s| s.mastered).count();
        let total = self.entries.len();
        PoolStats {
            total,
            practiced,
            mastered,
            remaining: total.saturating_sub(mastered),
        }
    }

    pub fn entry(&self, word: &str) -> Option<&WordEntry> {
        self.entries.get(word)
    }

    pub fn status(&self, word: &str) -> Option<&WordStatus> {
        self.statuses.get(word)
    }

    pub fn entries(&self) -> impl Iterator<Item = &WordEntry> {
        self.entries.values()
    }

    pub fn status_iter(&self) -> impl Iterator<Item = &WordStatus> {
        self.statuses.values()
    }

    /// Snapshot of every status, sorted by word.
    pub fn statuses(&self) -> Vec<WordStatus> {
        let mut all: Vec<WordStatus> = self.statuses.values().cloned().collect();
        all.sort_by(|a, b| a.word.cmp(&b.word));
        all
    }

    /// Load statuses from an earlier snapshot. A word already mastered here
    /// stays mastered.
    pub fn restore_statuses(&mut self, statuses: Vec<WordStatus>) {
        for mut status in statuses {
            status.word = normalize(&status.word);
            if status.word.is_empty() {
                continue;
            }
            if let Some(existing) = self.statuses.get(&status.word) {
                status.mastered |= existing.mastered;
            }
            self.statuses.insert(status.word.clone(), status);
        }
    }

    /// Known to either the pool or the status store.
    pub fn contains(&self, word: &str) -> bool {
        self.entries.contains_key(word) || self.statuses.contains_key(word)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn apply_attempt(status: &mut WordStatus, success: bool, now: DateTime<Utc>, rule: &MasteryRule) {
    status.attempts += 1;
    status.last_seen = now;

    if success {
        status.successes += 1;
        status.level_successes += 1;
        match status.difficulty {
            DifficultyBucket::Hard if status.level_successes >= HARD_TO_MEDIUM => {
                status.difficulty = DifficultyBucket::Medium;
                status.level_successes = 0;
            }
            DifficultyBucket::Medium if status.level_successes >= MEDIUM_TO_EASY => {
                status.difficulty = DifficultyBucket::Easy;
                status.level_successes = 0;
            }
            DifficultyBucket::Easy
                if status.level_successes >= EASY_TO_MASTERED
                    && *rule == MasteryRule::DifficultyLadder =>
            {
                status.mastered = true;
            }
            _ => {}
        }
    } else {
        status.failures += 1;
        status.level_successes = 0;
        status.difficulty = status.difficulty.harder();
    }

    if let MasteryRule::SuccessRate {
        min_attempts,
        threshold,
    } = *rule
    {
        if status.attempts >= min_attempts && status.success_rate() >= threshold {
            status.mastered = true;
        }
    }
}
