//! # parley-vocab
//!
//! Adaptive vocabulary for a conversation session.
//!
//! - [`WordPool`] holds candidate words and per-word practice status, and
//!   moves each word along the Hard → Medium → Easy → mastered ladder.
//! - [`ProposalScheduler`] picks the next set of words to suggest, honoring
//!   the learner's repetition mode and difficulty preference.
//! - [`TurnProcessor`] ties the two to a running transcript.
//! - [`TranslationService`] is the client side of the external
//!   translation/analysis collaborator, with a static fallback.

#![deny(unsafe_code)]

pub mod error;
pub mod heuristics;
pub mod pool;
pub mod scheduler;
pub mod seed;
pub mod translate;
pub mod turn;
pub mod word;

pub use error::{Result, TranslationError};
pub use heuristics::{DefaultHeuristics, VocabHeuristics};
pub use pool::{PoolStats, WordPool};
pub use scheduler::ProposalScheduler;
pub use translate::{
    FallbackTranslator, HttpTranslationService, StaticLookup, Translation, TranslationService,
};
pub use turn::{Turn, TurnCursor, TurnOutcome, TurnProcessor};
pub use word::{normalize, Category, DifficultyBucket, PartOfSpeech, WordEntry, WordStatus};
