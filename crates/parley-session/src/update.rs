use parley_core::wire::{SessionSummary, TranscriptLine};
use parley_core::{ConnectionState, SessionId};
use parley_settings::LearnerSettings;
use parley_vocab::{PoolStats, WordStatus};
use serde::Serialize;

/// Pushed to every subscriber of a [`LearningSession`](crate::LearningSession).
#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    /// Proposal recomputed. `mastered` lists words that reached mastery in
    /// the step that triggered it.
    Proposals {
        words: Vec<String>,
        mastered: Vec<String>,
    },
    Typing(bool),
    Xp {
        gained: f64,
        total: f64,
    },
    Summary(SessionSummary),
    Connection(ConnectionState),
}

/// Point-in-time copy of session state, suitable for handing to persistence.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub connection: ConnectionState,
    pub proposals: Vec<String>,
    pub statuses: Vec<WordStatus>,
    pub stats: PoolStats,
    pub transcript: Vec<TranscriptLine>,
    pub xp: f64,
    pub summary: Option<SessionSummary>,
    pub learner: LearnerSettings,
}
