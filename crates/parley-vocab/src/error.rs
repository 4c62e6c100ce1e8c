/// Failures talking to the translation/analysis collaborator.
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("translation service unavailable: {0}")]
    Unavailable(String),
    #[error("translation service returned HTTP {status}")]
    Http { status: u16 },
    #[error("undecodable translation response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TranslationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Http {
                status: status.as_u16(),
            }
        } else {
            Self::Unavailable(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslationError>;
