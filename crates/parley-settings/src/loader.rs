//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ParleySettings::default()`]
//! 2. If `~/.parley/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `PARLEY_*` environment variable overrides (highest priority)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{ParleySettings, RepetitionMode};

/// Resolve the path to the settings file (`~/.parley/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".parley").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ParleySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a value that fails
/// validation is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ParleySettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.validate()?;
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<ParleySettings> {
    let defaults = serde_json::to_value(ParleySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `PARLEY_*` overrides read through `lookup`.
///
/// Out-of-range or unparseable values are logged and ignored.
pub fn apply_env_overrides(settings: &mut ParleySettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    if let Some(v) = env.string("PARLEY_URL") {
        settings.channel.url = v;
    }
    if let Some(v) = env.ranged("PARLEY_MAX_RETRIES", 0u32, 100) {
        settings.channel.max_retries = v;
    }
    if let Some(v) = env.ranged("PARLEY_BASE_DELAY_MS", 1u64, 600_000) {
        settings.channel.base_delay_ms = v;
    }
    if let Some(v) = env.ranged("PARLEY_QUEUE_LIMIT", 1usize, 10_000) {
        settings.channel.offline_queue_limit = v;
    }
    if let Some(v) = env.ranged("PARLEY_HEARTBEAT_MS", 1000u64, 600_000) {
        settings.channel.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.string("PARLEY_MODE") {
        match v.parse::<RepetitionMode>() {
            Ok(mode) => settings.learner.mode = mode,
            Err(e) => warn!(key = "PARLEY_MODE", error = %e, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = env.ranged("PARLEY_MAX_WORDS", 1usize, 500) {
        settings.learner.max_words_per_session = v;
    }
    if let Some(v) = env.string("PARLEY_LANGUAGE") {
        settings.learner.language = v.to_lowercase();
    }
    if let Some(v) = env.string("PARLEY_TRANSLATION_URL") {
        settings.translation.endpoint = Some(v);
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn ranged<T>(&self, key: &str, min: T, max: T) -> Option<T>
    where
        T: std::str::FromStr + PartialOrd + Copy,
    {
        let raw = self.string(key)?;
        match raw.trim().parse::<T>() {
            Ok(v) if v >= min && v <= max => Some(v),
            _ => {
                warn!(key, value = %raw, "invalid numeric env var, ignoring");
                None
            }
        }
    }
}
