use parley_core::wire::{Author, TranscriptLine};
use parley_settings::{LearnerSettings, ParleySettings, SchedulerSettings};
use serde::Serialize;
use tracing::debug;

use crate::pool::{PoolStats, WordPool};
use crate::scheduler::ProposalScheduler;
use crate::word::{WordEntry, WordStatus};

/// One learner utterance and the assistant reply that followed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub proposals: Vec<String>,
    pub statuses: Vec<WordStatus>,
    /// Entries introduced by the assistant reply.
    pub new_words: Vec<WordEntry>,
    /// Words the learner produced, marked used-successfully.
    pub practiced: Vec<String>,
    /// Words that reached mastery during this turn.
    pub mastered: Vec<String>,
}

/// Feeds conversation turns into the pool and re-runs the scheduler.
///
/// Owned by a single session task; turns must be processed in order.
#[derive(Debug)]
pub struct TurnProcessor {
    pool: WordPool,
    scheduler: ProposalScheduler,
    learner: LearnerSettings,
}

impl TurnProcessor {
    pub fn new(pool: WordPool, scheduler: ProposalScheduler, learner: LearnerSettings) -> Self {
        Self {
            pool,
            scheduler,
            learner,
        }
    }

    /// Processor with a pool seeded for the configured language.
    pub fn from_settings(settings: &ParleySettings) -> Self {
        let mut pool = WordPool::new(&settings.learner.language)
            .with_mastery(settings.scheduler.mastery.clone());
        pool.seed(&settings.learner.language);
        Self::new(
            pool,
            ProposalScheduler::new(settings.scheduler.clone()),
            settings.learner.clone(),
        )
    }

    pub fn process(&mut self, turn: &Turn) -> TurnOutcome {
        let practiced = self.pool.heuristics().tokenize(&turn.user);
        let mastered = self.pool.mark_used(&practiced, true);
        self.scheduler.consume(&practiced);

        let new_words = self.pool.ingest(&turn.assistant, true);
        let proposals = self.scheduler.generate(&self.pool, &self.learner);

        debug!(
            practiced = practiced.len(),
            new_words = new_words.len(),
            mastered = mastered.len(),
            proposals = proposals.len(),
            "turn processed"
        );
        TurnOutcome {
            proposals,
            statuses: self.pool.statuses(),
            new_words,
            practiced,
            mastered,
        }
    }

    /// Explicit practice feedback from the host. Returns newly mastered words.
    pub fn mark_words<I, S>(&mut self, words: I, was_successful: bool) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: Vec<String> = words.into_iter().map(|w| w.as_ref().to_string()).collect();
        let mastered = self.pool.mark_used(&words, was_successful);
        self.scheduler.consume(&words);
        mastered
    }

    pub fn add_candidates<I, S>(&mut self, words: I) -> Vec<WordEntry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.pool.add_candidates(words)
    }

    /// Recompute proposals without a new turn.
    pub fn proposals(&mut self) -> Vec<String> {
        self.scheduler.generate(&self.pool, &self.learner)
    }

    pub fn current_proposals(&self) -> &[String] {
        self.scheduler.current()
    }

    /// Replace learner settings. Takes effect on the next generation.
    pub fn update_learner(&mut self, learner: LearnerSettings) {
        self.learner = learner;
    }

    pub fn update_scheduler(&mut self, settings: SchedulerSettings) {
        self.scheduler.set_settings(settings);
    }

    /// Start a new session over the same pool: clears consumed words and the
    /// carried-over proposal.
    pub fn reset_session(&mut self) {
        self.scheduler.reset();
    }

    pub fn learner(&self) -> &LearnerSettings {
        &self.learner
    }

    pub fn pool(&self) -> &WordPool {
        &self.pool
    }

    pub fn statuses(&self) -> Vec<WordStatus> {
        self.pool.statuses()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

/// Watermark over a growing transcript.
///
/// Yields each complete user → assistant pair exactly once. Consecutive user
/// lines before a reply are joined; assistant lines with no pending user line
/// and system lines are skipped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnCursor {
    watermark: usize,
}

impl TurnCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the first transcript line not yet consumed.
    pub fn watermark(&self) -> usize {
        self.watermark
    }

    pub fn take_pairs(&mut self, transcript: &[TranscriptLine]) -> Vec<Turn> {
        let mut turns = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        let start = self.watermark.min(transcript.len());

        for (offset, line) in transcript[start..].iter().enumerate() {
            let index = start + offset;
            match line.author {
                Author::User => pending.push(&line.text),
                Author::Assistant if pending.is_empty() => self.watermark = index + 1,
                Author::Assistant => {
                    turns.push(Turn::new(pending.join(" "), line.text.clone()));
                    pending.clear();
                    self.watermark = index + 1;
                }
                Author::System if pending.is_empty() => self.watermark = index + 1,
                Author::System => {}
            }
        }
        turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(author: Author, text: &str) -> TranscriptLine {
        TranscriptLine {
            author,
            text: text.to_string(),
        }
    }

    fn processor(words: &[&str]) -> TurnProcessor {
        let mut pool = WordPool::new("fr");
        pool.insert_words("fr", words, 2);
        TurnProcessor::new(pool, ProposalScheduler::default(), LearnerSettings::default())
    }

    #[test]
    fn user_words_practiced_assistant_words_introduced() {
        let mut processor = processor(&[]);
        let outcome = processor.process(&Turn::new(
            "Je comprends le problème",
            "Le marché est difficile mais le système fonctionne",
        ));

        assert!(outcome.practiced.contains(&"problème".to_string()));
        let status = processor.pool().status("problème").unwrap();
        assert_eq!((status.attempts, status.successes), (1, 1));

        let introduced: Vec<&str> = outcome.new_words.iter().map(|e| e.word.as_str()).collect();
        assert_eq!(introduced, vec!["marché", "difficile", "système", "fonctionne"]);
        assert!(outcome.statuses.iter().any(|s| s.word == "problème"));
        assert!(!outcome.proposals.contains(&"problème".to_string()));
        for word in &introduced {
            assert!(outcome.proposals.contains(&word.to_string()));
        }
    }

    #[test]
    fn known_words_are_not_reintroduced() {
        let mut processor = processor(&["système"]);
        processor.process(&Turn::new("le marché", "bonjour"));
        let outcome = processor.process(&Turn::new(
            "oui",
            "Le marché est difficile mais le système fonctionne",
        ));
        let introduced: Vec<&str> = outcome.new_words.iter().map(|e| e.word.as_str()).collect();
        assert_eq!(introduced, vec!["difficile", "fonctionne"]);
    }

    #[test]
    fn practiced_words_leave_the_proposal() {
        let mut processor = processor(&["bonjour", "merci", "voyage"]);
        let before = processor.proposals();
        assert!(before.contains(&"merci".to_string()));
        let outcome = processor.process(&Turn::new("merci beaucoup", "De rien"));
        assert!(!outcome.proposals.contains(&"merci".to_string()));
    }

    #[test]
    fn host_feedback_marks_and_consumes() {
        let mut processor = processor(&["merci"]);
        processor.update_learner(LearnerSettings {
            difficulty: parley_settings::DifficultyPreference::Beginner,
            ..LearnerSettings::default()
        });
        let mut mastered = Vec::new();
        for _ in 0..7 {
            mastered.extend(processor.mark_words(["merci"], true));
        }
        assert_eq!(mastered, vec!["merci"]);
        assert!(!processor.proposals().contains(&"merci".to_string()));
        assert_eq!(processor.stats().mastered, 1);
    }

    #[test]
    fn reset_session_allows_words_again() {
        let mut processor = processor(&["merci", "voyage"]);
        processor.add_candidates(["Gare"]);
        processor.mark_words(["gare"], false);
        assert!(!processor.proposals().contains(&"gare".to_string()));
        processor.reset_session();
        assert!(processor.proposals().contains(&"gare".to_string()));
    }

    #[test]
    fn from_settings_seeds_language() {
        let processor = TurnProcessor::from_settings(&ParleySettings::default());
        assert!(processor.pool().len() > 20);
        assert_eq!(processor.pool().language(), "fr");
    }

    #[test]
    fn cursor_yields_each_pair_once() {
        let mut cursor = TurnCursor::new();
        let mut transcript = vec![
            line(Author::Assistant, "Bonjour ! Comment ça va ?"),
            line(Author::User, "Ça va bien"),
        ];
        assert!(cursor.take_pairs(&transcript).is_empty());
        assert_eq!(cursor.watermark(), 1);

        transcript.push(line(Author::Assistant, "Super, et le travail ?"));
        assert_eq!(
            cursor.take_pairs(&transcript),
            vec![Turn::new("Ça va bien", "Super, et le travail ?")]
        );
        assert!(cursor.take_pairs(&transcript).is_empty());
        assert_eq!(cursor.watermark(), 3);
    }

    #[test]
    fn cursor_joins_consecutive_user_lines() {
        let mut cursor = TurnCursor::new();
        let transcript = vec![
            line(Author::User, "Je voudrais"),
            line(Author::System, "typing"),
            line(Author::User, "un café"),
            line(Author::Assistant, "Tout de suite"),
            line(Author::User, "Merci"),
            line(Author::Assistant, "De rien"),
        ];
        let turns = cursor.take_pairs(&transcript);
        assert_eq!(
            turns,
            vec![
                Turn::new("Je voudrais un café", "Tout de suite"),
                Turn::new("Merci", "De rien"),
            ]
        );
        assert_eq!(cursor.watermark(), 6);
    }
}
