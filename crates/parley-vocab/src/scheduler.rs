//! Proposal scheduling: which words the learner should practice next.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parley_settings::{LearnerSettings, RepetitionMode, SchedulerSettings};
use tracing::debug;

use crate::pool::WordPool;
use crate::word::{normalize, DifficultyBucket};

#[derive(Clone, Debug)]
struct Candidate<'a> {
    word: &'a str,
    difficulty: u8,
    frequency: u32,
    success_rate: f64,
    bucket: Option<DifficultyBucket>,
    last_seen: Option<DateTime<Utc>>,
}

/// Equal-priority ordering: closeness to the preferred difficulty, weaker
/// success rate first, more common first, then alphabetical.
fn tie_break(a: &Candidate<'_>, b: &Candidate<'_>, midpoint: f64) -> Ordering {
    let distance = |c: &Candidate<'_>| (f64::from(c.difficulty) - midpoint).abs();
    distance(a)
        .total_cmp(&distance(b))
        .then(a.success_rate.total_cmp(&b.success_rate))
        .then(b.frequency.cmp(&a.frequency))
        .then(a.word.cmp(b.word))
}

/// Review priority: hardest bucket first, most recently seen first.
fn review_order(a: &Candidate<'_>, b: &Candidate<'_>, midpoint: f64) -> Ordering {
    b.bucket
        .cmp(&a.bucket)
        .then(b.last_seen.cmp(&a.last_seen))
        .then_with(|| tie_break(a, b, midpoint))
}

/// Stateful wrapper around the selection policy for one session.
///
/// Keeps the last proposal and the words consumed (marked used) so far.
/// Repeated calls without consuming anything return the same words.
#[derive(Clone, Debug, Default)]
pub struct ProposalScheduler {
    settings: SchedulerSettings,
    current: Vec<String>,
    consumed: HashSet<String>,
}

impl ProposalScheduler {
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            settings,
            current: Vec::new(),
            consumed: HashSet::new(),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SchedulerSettings) {
        self.settings = settings;
    }

    /// Last proposal returned by [`generate`](Self::generate).
    pub fn current(&self) -> &[String] {
        &self.current
    }

    pub fn is_consumed(&self, word: &str) -> bool {
        self.consumed.contains(word)
    }

    /// Produce the next proposal: carried-over unused words first, then fresh
    /// candidates for the learner's mode, de-duplicated and capped at
    /// `max_words_per_session`.
    pub fn generate(&mut self, pool: &WordPool, learner: &LearnerSettings) -> Vec<String> {
        let cap = learner.max_words_per_session;
        let fresh = self.fresh_candidates(pool, learner);

        let mut seen = HashSet::new();
        let proposal: Vec<String> = self
            .current
            .iter()
            .filter(|w| !self.consumed.contains(*w))
            .cloned()
            .chain(fresh)
            .filter(|w| seen.insert(w.clone()))
            .take(cap)
            .collect();

        debug!(
            mode = ?learner.mode,
            cap,
            proposed = proposal.len(),
            consumed = self.consumed.len(),
            "generated proposals"
        );
        self.current = proposal.clone();
        proposal
    }

    /// Exclude `words` from future proposals this session.
    pub fn consume<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            let word = normalize(word.as_ref());
            if !word.is_empty() {
                self.consumed.insert(word);
            }
        }
        let consumed = &self.consumed;
        self.current.retain(|w| !consumed.contains(w));
    }

    /// Forget the carried-over proposal and the consumed set.
    pub fn reset(&mut self) {
        self.current.clear();
        self.consumed.clear();
    }

    fn fresh_candidates(&self, pool: &WordPool, learner: &LearnerSettings) -> Vec<String> {
        let cap = learner.max_words_per_session;
        let midpoint = learner.difficulty.midpoint();

        let mut new_words: Vec<Candidate<'_>> = pool
            .entries()
            .filter(|e| !self.consumed.contains(&e.word))
            .filter(|e| pool.status(&e.word).is_none_or(|s| s.attempts == 0))
            .map(|e| Candidate {
                word: &e.word,
                difficulty: e.difficulty,
                frequency: e.frequency,
                success_rate: 0.0,
                bucket: None,
                last_seen: None,
            })
            .collect();
        new_words.sort_by(|a, b| tie_break(a, b, midpoint));

        let mut review: Vec<Candidate<'_>> = pool
            .status_iter()
            .filter(|s| s.attempts > 0 && !s.mastered)
            .filter(|s| !self.consumed.contains(&s.word))
            .map(|s| {
                let entry = pool.entry(&s.word);
                Candidate {
                    word: &s.word,
                    difficulty: entry
                        .map(|e| e.difficulty)
                        .unwrap_or_else(|| s.difficulty.nominal_difficulty()),
                    frequency: entry.map(|e| e.frequency).unwrap_or(0),
                    success_rate: s.success_rate(),
                    bucket: Some(s.difficulty),
                    last_seen: Some(s.last_seen),
                }
            })
            .collect();

        match learner.mode {
            RepetitionMode::NewWords => words(&new_words).into_iter().take(cap).collect(),
            RepetitionMode::HeavyRepetition => {
                review.sort_by(|a, b| review_order(a, b, midpoint));
                let review_quota = quota(cap, self.settings.heavy_review_ratio);
                let (first, second) =
                    fill(words(&review), review_quota, words(&new_words), cap - review_quota);
                first.into_iter().chain(second).collect()
            }
            RepetitionMode::Mixed => {
                review.sort_by(|a, b| tie_break(a, b, midpoint));
                let new_quota = quota(cap, self.settings.mixed_new_ratio);
                let (first, second) =
                    fill(words(&new_words), new_quota, words(&review), cap - new_quota);
                first.into_iter().chain(second).collect()
            }
        }
    }
}

fn words(list: &[Candidate<'_>]) -> Vec<String> {
    list.iter().map(|c| c.word.to_string()).collect()
}

fn quota(cap: usize, ratio: f64) -> usize {
    ((cap as f64 * ratio).round() as usize).min(cap)
}

/// Take `quota_a` from `a` and `quota_b` from `b`, back-filling either
/// side's shortfall from the other.
fn fill(a: Vec<String>, quota_a: usize, b: Vec<String>, quota_b: usize) -> (Vec<String>, Vec<String>) {
    let take_a = quota_a.min(a.len());
    let take_b = quota_b.min(b.len());
    let spare_a = quota_a - take_a;
    let spare_b = quota_b - take_b;
    let take_a = (take_a + spare_b).min(a.len());
    let take_b = (take_b + spare_a).min(b.len());
    (
        a.into_iter().take(take_a).collect(),
        b.into_iter().take(take_b).collect(),
    )
}
