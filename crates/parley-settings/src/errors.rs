//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON, or does not fit the schema.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value parsed but is out of range, e.g. a zero word cap.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_keeps_cause() {
        let err = SettingsError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "settings.json locked",
        ));
        let shown = err.to_string();
        assert!(shown.starts_with("failed to read settings file"));
        assert!(shown.contains("settings.json locked"));
    }

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::InvalidValue("maxWordsPerSession must be positive".into());
        assert_eq!(
            err.to_string(),
            "invalid settings value: maxWordsPerSession must be positive"
        );
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err: SettingsError = json_err.into();
        assert!(matches!(err, SettingsError::Json(_)));
        assert!(err.to_string().contains("parse settings JSON"));
    }
}
