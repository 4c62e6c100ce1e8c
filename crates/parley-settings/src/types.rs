use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings document (`~/.parley/settings.json`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParleySettings {
    pub channel: ChannelSettings,
    pub learner: LearnerSettings,
    pub scheduler: SchedulerSettings,
    pub session: SessionSettings,
    pub translation: TranslationSettings,
    pub telemetry: TelemetrySettings,
}

impl ParleySettings {
    pub fn validate(&self) -> Result<()> {
        self.channel.validate()?;
        self.learner.validate()?;
        self.scheduler.validate()
    }
}

/// Transport channel tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelSettings {
    pub url: String,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub heartbeat_interval_ms: u64,
    pub offline_queue_limit: usize,
    pub connect_timeout_ms: u64,
    /// Longest a single frame write may take before the connection is
    /// treated as lost.
    pub write_timeout_ms: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080/session".to_string(),
            max_retries: 5,
            base_delay_ms: 1000,
            backoff_multiplier: 1.8,
            heartbeat_interval_ms: 30_000,
            offline_queue_limit: 50,
            connect_timeout_ms: 10_000,
            write_timeout_ms: 10_000,
        }
    }
}

impl ChannelSettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(SettingsError::InvalidValue("channel.url is empty".into()));
        }
        if !(self.backoff_multiplier >= 1.0) {
            return Err(SettingsError::InvalidValue(format!(
                "channel.backoffMultiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.offline_queue_limit == 0 {
            return Err(SettingsError::InvalidValue(
                "channel.offlineQueueLimit must be positive".into(),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "channel.heartbeatIntervalMs must be positive".into(),
            ));
        }
        if self.write_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "channel.writeTimeoutMs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// How the scheduler balances new vocabulary against review.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepetitionMode {
    NewWords,
    #[default]
    Mixed,
    HeavyRepetition,
}

impl std::str::FromStr for RepetitionMode {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "new_words" => Ok(Self::NewWords),
            "mixed" => Ok(Self::Mixed),
            "heavy_repetition" => Ok(Self::HeavyRepetition),
            other => Err(format!("unknown repetition mode: {other}")),
        }
    }
}

/// Learner's preferred difficulty band on the 1–5 word difficulty scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyPreference {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl DifficultyPreference {
    /// Inclusive difficulty range.
    pub fn range(&self) -> (u8, u8) {
        match self {
            Self::Beginner => (1, 2),
            Self::Intermediate => (2, 4),
            Self::Advanced => (3, 5),
        }
    }

    pub fn midpoint(&self) -> f64 {
        let (lo, hi) = self.range();
        (lo as f64 + hi as f64) / 2.0
    }
}

/// Per-learner configuration. Replaced wholesale between sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LearnerSettings {
    pub mode: RepetitionMode,
    pub max_words_per_session: usize,
    pub difficulty: DifficultyPreference,
    /// Target language code, e.g. `fr`.
    pub language: String,
}

impl Default for LearnerSettings {
    fn default() -> Self {
        Self {
            mode: RepetitionMode::Mixed,
            max_words_per_session: 10,
            difficulty: DifficultyPreference::Intermediate,
            language: "fr".to_string(),
        }
    }
}

impl LearnerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_words_per_session == 0 {
            return Err(SettingsError::InvalidValue(
                "learner.maxWordsPerSession must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// When a word counts as mastered.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MasteryRule {
    /// 7 consecutive successes while in the easy bucket.
    #[default]
    DifficultyLadder,
    /// Success rate at or above `threshold` over at least `min_attempts`.
    #[serde(rename_all = "camelCase")]
    SuccessRate { min_attempts: u32, threshold: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerSettings {
    /// Share of new words in `mixed` mode.
    pub mixed_new_ratio: f64,
    /// Share of review words in `heavy_repetition` mode.
    pub heavy_review_ratio: f64,
    pub mastery: MasteryRule,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            mixed_new_ratio: 0.7,
            heavy_review_ratio: 0.8,
            mastery: MasteryRule::DifficultyLadder,
        }
    }
}

impl SchedulerSettings {
    fn validate(&self) -> Result<()> {
        for (name, ratio) in [
            ("mixedNewRatio", self.mixed_new_ratio),
            ("heavyReviewRatio", self.heavy_review_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(SettingsError::InvalidValue(format!(
                    "scheduler.{name} must be within [0, 1], got {ratio}"
                )));
            }
        }
        if let MasteryRule::SuccessRate { threshold, .. } = self.mastery {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(SettingsError::InvalidValue(format!(
                    "scheduler.mastery.threshold must be within [0, 1], got {threshold}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSettings {
    /// Echo proposal and mastery changes over the channel as `word_interaction` frames.
    pub echo_proposals: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TranslationSettings {
    /// Base URL of the analysis service. Static lookup only when unset.
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    /// Learner's native language, the translation target.
    pub native_language: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 5_000,
            native_language: "en".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetrySettings {
    pub level: String,
    pub json: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}
